//! # Typed `AArch64` System Registers

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "mair_el1")]
pub mod mair_el1;

#[cfg(feature = "par_el1")]
pub mod par_el1;

#[cfg(all(feature = "asm", feature = "par_el1", target_arch = "aarch64"))]
pub mod maintenance;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require EL1.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require EL1.
    unsafe fn store_unsafe(self);
}
