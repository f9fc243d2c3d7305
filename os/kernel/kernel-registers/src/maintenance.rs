//! # Cache, TLB and Barrier Instructions
//!
//! Thin wrappers around the AArch64 system instructions needed when
//! modifying live translation tables:
//!
//! - `DC CIVAC`: clean and invalidate a data cache line by VA to PoC.
//! - `DSB SY`: full-system data synchronization barrier.
//! - `TLBI VMALLE1IS`: invalidate all EL1&0 stage-1 TLB entries, inner shareable.
//! - `ISB`: instruction synchronization barrier.
//! - `AT S1E1R`: stage-1 EL1 read translation of a VA into `PAR_EL1`.

use crate::LoadRegisterUnsafe;
use crate::par_el1::ParEl1;
use core::arch::asm;

/// Clean and invalidate the data cache line holding `va` to the point of coherency.
///
/// # Safety
/// Must run at EL1 with `va` mapped (or translation disabled).
#[inline]
pub unsafe fn dc_civac(va: u64) {
    unsafe {
        asm!("dc civac, {}", in(reg) va, options(nostack, preserves_flags));
    }
}

/// Data synchronization barrier, full system.
#[inline]
pub fn dsb_sy() {
    // SAFETY: barriers have no operands and no memory side effects.
    unsafe {
        asm!("dsb sy", options(nostack, preserves_flags));
    }
}

/// Instruction synchronization barrier.
#[inline]
pub fn isb() {
    // SAFETY: see `dsb_sy`.
    unsafe {
        asm!("isb", options(nostack, preserves_flags));
    }
}

/// Invalidate all stage-1 EL1&0 TLB entries on every core in the inner
/// shareable domain.
///
/// # Safety
/// Must run at EL1.
#[inline]
pub unsafe fn tlbi_vmalle1is() {
    unsafe {
        asm!("tlbi vmalle1is", options(nostack, preserves_flags));
    }
}

/// Stage-1 EL1 read translation of `va`; the result is read back from
/// `PAR_EL1` after an `ISB`.
///
/// # Safety
/// Must run at EL1. Clobbers `PAR_EL1`.
#[inline]
#[must_use]
pub unsafe fn at_s1e1r(va: u64) -> ParEl1 {
    unsafe {
        asm!("at s1e1r, {}", in(reg) va, options(nostack, preserves_flags));
    }
    isb();
    unsafe { ParEl1::load_unsafe() }
}
