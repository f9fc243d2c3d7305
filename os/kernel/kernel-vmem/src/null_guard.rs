//! # Null-Pointer Protection
//!
//! The boot map keeps page 0 mapped because the secondary cores' spin-table
//! mailboxes live there. Once every core has left its mailbox, the page is
//! retracted so that dereferencing a null pointer faults.
//!
//! Retraction edits a live table, so it is followed by the full maintenance
//! sequence (through [`MmuMaintenance`]):
//!
//! ```text
//! DC CIVAC <slot>   clean the rewritten descriptor to the point of coherency
//! DSB SY
//! TLBI VMALLE1IS    drop cached translations on all cores
//! DSB SY
//! ISB
//! ```

use crate::MmuMaintenance;
use crate::address_space::{AddressSpace, TableId};
use crate::descriptor::{Descriptor, RawDescriptor, decode};
use crate::table::{Level, TableIndex};
use core::fmt;
use core::ops::Range;
use kernel_info::boot::SecondaryRelease;
use kernel_info::memory::NULL_PAGE_BYTES;
use kernel_memory_addresses::VirtualAddress;
use log::{debug, info, warn};

impl<const PMD_TABLES: usize, const PTE_TABLES: usize> AddressSpace<PMD_TABLES, PTE_TABLES> {
    /// Invalidate the PTE slot for virtual page 0 and make the change
    /// visible to every core.
    ///
    /// Returns the descriptor that was replaced, or `None` if the low PMD's
    /// first slot does not lead to a PTE table (nothing is changed then).
    pub fn enable_null_pointer_protection<M: MmuMaintenance + ?Sized>(
        &mut self,
        ops: &M,
    ) -> Option<Descriptor> {
        let first = TableIndex::new(0);
        let Descriptor::Table(pte_pa) = decode(self.pmd_low.get(first), Level::Pmd) else {
            warn!(
                "null protection unavailable: low PMD[0] = {:#018x} is not a table",
                self.pmd_low.get(first).into_bits()
            );
            return None;
        };
        let Some(TableId::Pte(index)) = self.locate(pte_pa, Level::Pte) else {
            warn!("null protection unavailable: low PMD[0] points to unknown table {pte_pa}");
            return None;
        };

        let slot: *mut RawDescriptor = self.pte_pool.get_mut(index)?.slot_mut(first);
        // SAFETY: `slot` points into a table owned by `self`, which is
        // borrowed mutably. The volatile access keeps the store ordered
        // before the cache maintenance below.
        let before = unsafe {
            let before = slot.read_volatile();
            slot.write_volatile(RawDescriptor::new());
            before
        };

        ops.flush_cache_line(VirtualAddress::from_ptr(slot.cast_const()));
        ops.data_sync_barrier();
        ops.invalidate_tlb_all_inner_shareable();
        ops.data_sync_barrier();
        ops.instruction_sync_barrier();

        info!(
            "null page retracted: PTE[0] {:#018x} -> {:#018x}",
            before.into_bits(),
            // SAFETY: as above.
            unsafe { slot.read_volatile() }.into_bits()
        );
        Some(decode(before, Level::Pte))
    }
}

/// Whether page 0 is currently trapping.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ProtectionState {
    #[default]
    Unprotected,
    Protected,
}

impl fmt::Display for ProtectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unprotected => "Unprotected",
            Self::Protected => "Protected",
        })
    }
}

/// Tracks and performs the one-time null-page retraction.
///
/// ### Examples
/// ```rust
/// # use kernel_vmem::{NullGuard, ProtectionState};
/// let guard = NullGuard::new();
/// assert_eq!(guard.state(), ProtectionState::Unprotected);
/// assert_eq!(NullGuard::GUARDED, 0..0x1000);
/// ```
#[derive(Debug, Default)]
pub struct NullGuard {
    state: ProtectionState,
}

impl NullGuard {
    /// Virtual range that faults once protection is enabled.
    pub const GUARDED: Range<u64> = 0..NULL_PAGE_BYTES;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ProtectionState::Unprotected,
        }
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> ProtectionState {
        self.state
    }

    /// Retract page 0 now. Does nothing if already protected.
    pub fn enable<M, const PMD_TABLES: usize, const PTE_TABLES: usize>(
        &mut self,
        aspace: &mut AddressSpace<PMD_TABLES, PTE_TABLES>,
        ops: &M,
    ) -> ProtectionState
    where
        M: MmuMaintenance + ?Sized,
    {
        if self.state == ProtectionState::Protected {
            debug!("null protection already enabled");
            return self.state;
        }
        if aspace.enable_null_pointer_protection(ops).is_some() {
            self.state = ProtectionState::Protected;
        }
        self.state
    }

    /// Retract page 0 if `release` says no core will touch the spin-table
    /// mailboxes again; otherwise leave everything as is.
    pub fn enable_when_released<M, const PMD_TABLES: usize, const PTE_TABLES: usize>(
        &mut self,
        aspace: &mut AddressSpace<PMD_TABLES, PTE_TABLES>,
        release: &SecondaryRelease,
        ops: &M,
    ) -> ProtectionState
    where
        M: MmuMaintenance + ?Sized,
    {
        if !release.is_released() {
            debug!("null protection deferred: secondary cores not yet released");
            return self.state;
        }
        self.enable(aspace, ops)
    }
}

impl fmt::Display for NullGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Null pointer protection: {}", self.state)?;
        writeln!(
            f,
            "  Guarded range: {:#06x}..{:#06x} (page 0)",
            Self::GUARDED.start,
            Self::GUARDED.end
        )?;
        write!(f, "  Activation: delayed until after core boot")
    }
}
