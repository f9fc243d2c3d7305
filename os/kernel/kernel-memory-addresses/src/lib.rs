//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses and page bases used by the
//! AArch64 translation-table code.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address as issued by the CPU, translated by the MMU. |
//! | [`PhysicalAddress`] | An address on the bus: RAM, MMIO, or a translation table. |
//! | [`PhysicalPage<S>`] | A physical base aligned to the page size `S`. |
//!
//! ## Page Sizes
//!
//! Only the two granules used by a 4 KiB-granule, 48-bit AArch64 stage 1
//! translation are modelled, as marker types implementing [`PageSize`]:
//!
//! - [`Size4K`] — a level 3 page
//! - [`Size2M`] — a level 2 block
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` wrappers around `u64` and implement
//!   `Copy`, `Eq`, `Ord` and `Hash`.
//! - Alignment arithmetic is `const fn` and assumes power-of-two sizes.
//! - No canonicality checks are performed; the translation code decides which
//!   addresses it accepts.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;

pub use page_size::{PageSize, Size2M, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;

/// Align `x` down to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0,        4096), 0);
/// assert_eq!(align_down(4095,     4096), 0);
/// assert_eq!(align_down(0x20_1234, 0x20_0000), 0x20_0000);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// `a` must be a non-zero power of two and `x + (a - 1)` must not overflow.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(0,    4096), 0);
/// assert_eq!(align_up(1,    4096), 4096);
/// assert_eq!(align_up(4097, 4096), 8192);
/// ```
#[inline(always)]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> u64 {
    (x + a - 1) & !(a - 1)
}

/// Whether `x` is a multiple of `a` (a non-zero power of two).
#[inline(always)]
#[must_use]
pub const fn is_aligned(x: u64, a: u64) -> bool {
    x & (a - 1) == 0
}
