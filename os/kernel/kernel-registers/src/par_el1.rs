#[cfg(all(feature = "asm", target_arch = "aarch64"))]
use crate::LoadRegisterUnsafe;
use bitfield_struct::bitfield;
use kernel_memory_addresses::PhysicalAddress;

/// `PAR_EL1` — Physical Address Register, written by the `AT` address
/// translation instructions.
///
/// The register has two layouts selected by bit 0 (`F`):
///
/// - `F = 0`: the translation succeeded; `PA[47:12]`, `SH`, `NS` and the
///   resolved MAIR attribute byte (`ATTR`) are valid.
/// - `F = 1`: the translation aborted; `FST[6:1]` holds the fault status
///   code. All other fields are to be ignored.
///
/// Both layouts are overlaid on the same storage; check [`f`](Self::f)
/// before interpreting the remaining fields.
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct ParEl1 {
    /// Bit 0 — F: translation aborted.
    pub f: bool,

    /// Bits 1–6 — FST: fault status code (only meaningful when `F = 1`).
    #[bits(6)]
    pub fst: u8,

    /// Bits 7–8 — SH: shareability of the resolved output address.
    #[bits(2)]
    pub sh: u8,

    /// Bit 9 — NS: non-secure output address.
    pub ns: bool,

    /// Bits 10–11 — implementation defined / RES1.
    #[bits(2)]
    __res10_11: u8,

    /// Bits 12–47 — PA: output address >> 12.
    #[bits(36)]
    pa_47_12: u64,

    /// Bits 48–55 — RES0.
    #[bits(8)]
    __res48_55: u8,

    /// Bits 56–63 — ATTR: MAIR attribute byte of the final descriptor.
    #[bits(8)]
    pub attr: u8,
}

const PA_MASK: u64 = 0x0000_FFFF_FFFF_F000;

/// Fault status codes `0b0001LL`: translation fault at lookup level `LL`.
const FST_TRANSLATION_FAULT_MASK: u8 = 0b11_1100;
const FST_TRANSLATION_FAULT: u8 = 0b00_0100;

impl ParEl1 {
    /// A successful translation result; `pa` is truncated to `PA[47:12]`.
    #[inline]
    #[must_use]
    pub const fn from_output(pa: PhysicalAddress, sh: u8, attr: u8) -> Self {
        Self::new()
            .with_pa_47_12((pa.as_u64() & PA_MASK) >> 12)
            .with_sh(sh & 0b11)
            .with_attr(attr)
    }

    /// An aborted translation result with the given fault status code.
    #[inline]
    #[must_use]
    pub const fn from_fault(fst: u8) -> Self {
        Self::new().with_f(true).with_fst(fst & 0b11_1111)
    }

    /// Page-aligned output address (`PA[47:12] << 12`).
    #[inline]
    #[must_use]
    pub const fn physical_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.pa_47_12() << 12)
    }

    /// `true` if the translation aborted with a translation fault (as opposed
    /// to an access flag, permission or external abort).
    #[inline]
    #[must_use]
    pub const fn is_translation_fault(self) -> bool {
        self.f() && (self.fst() & FST_TRANSLATION_FAULT_MASK) == FST_TRANSLATION_FAULT
    }

    /// Lookup level encoded in a translation fault status code.
    #[inline]
    #[must_use]
    pub const fn fault_level(self) -> Option<u8> {
        if self.is_translation_fault() {
            Some(self.fst() & 0b11)
        } else {
            None
        }
    }
}

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
impl LoadRegisterUnsafe for ParEl1 {
    unsafe fn load_unsafe() -> Self {
        let par: u64;
        unsafe {
            core::arch::asm!("mrs {}, par_el1", out(reg) par, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(par)
    }
}
