//! # Boot Handshake
//!
//! Secondary cores parked by the firmware poll their spin-table mailbox in
//! low memory until the primary core writes an entry point there. Until all
//! of them have left that loop, the page holding the mailboxes must stay
//! mapped. The boot path owns the [`SecondaryRelease`] flag and raises it
//! once the last core has checked in; the memory subsystem only reads it.

use core::sync::atomic::{AtomicBool, Ordering};

/// Cross-core "all secondaries released" flag.
///
/// ### Examples
/// ```rust
/// # use kernel_info::boot::SecondaryRelease;
/// static RELEASED: SecondaryRelease = SecondaryRelease::new();
/// assert!(!RELEASED.is_released());
/// RELEASED.mark_released();
/// assert!(RELEASED.is_released());
/// ```
#[derive(Debug, Default)]
pub struct SecondaryRelease {
    released: AtomicBool,
}

impl SecondaryRelease {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            released: AtomicBool::new(false),
        }
    }

    /// Publishes that no core will read the spin-table mailboxes again.
    ///
    /// Writes performed by the releasing core before this call are visible
    /// to any core that subsequently observes [`is_released`](Self::is_released).
    pub fn mark_released(&self) {
        self.released.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}
