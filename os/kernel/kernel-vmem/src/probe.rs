//! # Translation Probe
//!
//! Result of asking "does this virtual address translate, and to what?",
//! either from the MMU itself (`AT S1E1R`, see
//! [`MmuMaintenance::translate_probe`](crate::MmuMaintenance::translate_probe))
//! or from a software walk of an [`AddressSpace`](crate::AddressSpace).
//! Both paths produce the same `PAR_EL1` encoding so results are comparable.

use crate::attributes::MemoryAttributes;
use crate::table::Level;
use core::fmt;
use kernel_memory_addresses::{PhysicalAddress, Size4K, VirtualAddress};
use kernel_registers::par_el1::ParEl1;

/// Fault status code of a translation fault at `level` (`0b0001LL`).
#[inline]
#[must_use]
pub const fn translation_fault_status(level: Level) -> u8 {
    0b00_0100 | level.as_u8()
}

/// Outcome of a stage-1 translation of one virtual address.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TranslationProbe {
    /// The address translates to `phys`.
    Mapped { phys: PhysicalAddress, par: ParEl1 },
    /// The lookup aborted with fault status code `status`.
    Fault { status: u8, par: ParEl1 },
}

impl TranslationProbe {
    /// Interpret a `PAR_EL1` value obtained for `va`.
    #[must_use]
    pub const fn from_par(va: VirtualAddress, par: ParEl1) -> Self {
        if par.f() {
            Self::Fault {
                status: par.fst(),
                par,
            }
        } else {
            let page = par.physical_address();
            Self::Mapped {
                phys: PhysicalAddress::new(page.as_u64() | va.offset::<Size4K>()),
                par,
            }
        }
    }

    /// A successful translation of `va` through a leaf with `attrs`.
    #[must_use]
    pub const fn mapped(va: VirtualAddress, phys: PhysicalAddress, attrs: MemoryAttributes) -> Self {
        let par = ParEl1::from_output(
            phys,
            attrs.shareability.into_bits(),
            attrs.memory_type.mair_encoding(),
        );
        Self::from_par(va, par)
    }

    /// A translation fault detected at `level`.
    #[must_use]
    pub const fn translation_fault(level: Level) -> Self {
        let status = translation_fault_status(level);
        Self::Fault {
            status,
            par: ParEl1::from_fault(status),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped { .. })
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> Option<PhysicalAddress> {
        match self {
            Self::Mapped { phys, .. } => Some(*phys),
            Self::Fault { .. } => None,
        }
    }

    /// Raw `PAR_EL1` value.
    #[inline]
    #[must_use]
    pub const fn par(&self) -> ParEl1 {
        match self {
            Self::Mapped { par, .. } | Self::Fault { par, .. } => *par,
        }
    }

    /// `true` for a fault whose status names a translation fault.
    #[inline]
    #[must_use]
    pub const fn is_translation_fault(&self) -> bool {
        self.par().is_translation_fault()
    }
}

impl fmt::Display for TranslationProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mapped { phys, par } => {
                write!(f, "{phys} MAPPED (PAR_EL1={:#018x})", par.into_bits())
            }
            Self::Fault { status, par } => write!(
                f,
                "UNMAPPED (FST={status:#04x}, PAR_EL1={:#018x})",
                par.into_bits()
            ),
        }
    }
}
