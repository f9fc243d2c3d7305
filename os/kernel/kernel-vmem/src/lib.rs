//! # Virtual Memory Support
//!
//! Stage-1 translation tables for a bare-metal `AArch64` kernel (4 KiB
//! granule, 48-bit virtual addresses, EL1&0 regime), the routines that build
//! them at boot, and the delayed null-pointer trap.
//!
//! ## What you get
//! - An [`AddressSpace`] owning the four wired tables (PGD, PUD, low PMD,
//!   device PMD) and two bounded [`TablePool`]s for additional PMD and PTE
//!   tables.
//! - A descriptor codec ([`encode_table`], [`encode_block`], [`encode_page`],
//!   [`decode`]) over the bit-exact [`RawDescriptor`].
//! - [`MemoryAttributes`] and the board's default attribute
//!   [classifier](MemoryAttributes::classify).
//! - Mapping of single 2 MiB blocks / 4 KiB pages and greedy range mapping.
//! - The boot-time builder ([`AddressSpace::create_page_tables`],
//!   [`AddressSpace::patch_page_tables`]).
//! - The [`NullGuard`], which retracts page 0 once all cores have left their
//!   spin-table mailboxes.
//! - Diagnostics: [`TranslationProbe`] and [`PoolUsage`].
//!
//! ## `AArch64` Virtual Address → Physical Address Walk
//!
//! ```text
//! | 63‒48 | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  0000 |  PGD  |  PUD  |  PMD  |  PTE  | Offset |
//! ```
//!
//! ```text
//!  PGD  →  PUD  →  PMD  →  PTE  →  Physical Page
//!   │       │       │       │
//!   │       │       │       └───► Page descriptor  → maps 4 KiB
//!   │       │       └───────────► Block descriptor → maps 2 MiB
//!   │       └───────────────────► (1 GiB blocks are not used)
//!   └───────────────────────────► Table descriptor only
//! ```
//!
//! ### Wiring
//!
//! Only PGD slot 0 is populated (the low 512 GiB). Within it, PUD slot 0
//! leads to the static low PMD (`0x0000_0000..0x4000_0000`), PUD slot 1 to
//! the static device PMD (`0x4000_0000..0x8000_0000`); every other PUD slot
//! gets a PMD from the pool on first use. PTE tables always come from the
//! pool.
//!
//! ### Block/Table exclusivity
//!
//! A PMD slot is a 2 MiB block *or* a pointer to a PTE table, never both.
//! Requests that would convert one into the other fail with
//! [`MapError::MappingConflict`] and leave the slot untouched.
//!
//! ## Concurrency
//!
//! All mutation takes `&mut AddressSpace`. Building happens on one core before
//! translation is enabled; the only mutation of live tables is the null-page
//! retraction, which goes through [`MmuMaintenance`] for the required cache,
//! TLB and barrier sequence.

#![cfg_attr(not(test), no_std)]
#![allow(unsafe_code)]

pub mod address_space;
mod attributes;
mod bootstrap;
mod descriptor;
mod error;
mod null_guard;
mod pool;
mod probe;
mod table;

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
pub mod arch;

pub use crate::address_space::{AddressSpace, Granule, TableId};
pub use crate::attributes::{AccessPermission, MemoryAttributes, MemoryType, Shareability};
pub use crate::descriptor::{
    DEVICE_LOWER_ATTRIBUTES, Descriptor, RawDescriptor, decode, encode_block, encode_page,
    encode_table,
};
pub use crate::error::{MapError, PoolKind};
pub use crate::null_guard::{NullGuard, ProtectionState};
pub use crate::pool::{PoolStats, PoolUsage, TablePool};
pub use crate::probe::{TranslationProbe, translation_fault_status};
pub use crate::table::{ENTRIES, Level, TableIndex, TranslationTable, split_indices};

/// Re-export constants as info module.
pub use kernel_info::memory as info;

use kernel_memory_addresses::VirtualAddress;

/// Cache, TLB and barrier operations needed to change a live translation
/// table, plus a hardware translation probe.
///
/// The real implementation issues the corresponding `AArch64` instructions
/// (see `arch::HardwareMmu`); tests substitute a recording double.
pub trait MmuMaintenance {
    /// Clean and invalidate the data cache line holding `va` to the point of
    /// coherency (`DC CIVAC`).
    fn flush_cache_line(&self, va: VirtualAddress);

    /// Full-system data synchronization barrier (`DSB SY`).
    fn data_sync_barrier(&self);

    /// Invalidate all EL1&0 stage-1 TLB entries on every core of the inner
    /// shareable domain (`TLBI VMALLE1IS`).
    fn invalidate_tlb_all_inner_shareable(&self);

    /// Instruction synchronization barrier (`ISB`).
    fn instruction_sync_barrier(&self);

    /// Translate `va` with the live MMU configuration (`AT S1E1R`).
    fn translate_probe(&self, va: VirtualAddress) -> TranslationProbe;
}
