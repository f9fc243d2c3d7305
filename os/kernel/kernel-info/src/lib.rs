//! # Board Configuration and Boot Interface
//!
//! Compile-time description of the physical address map of the target board
//! (a Raspberry Pi 3 class BCM2837 system) and the small pieces of state the
//! boot path shares with the memory subsystem.
//!
//! ## Overview
//!
//! The translation tables built at boot identity-map the low gigabyte of the
//! bus and a device window above it. Which attributes a range receives, where
//! the device window starts, and which low-memory words the secondary cores
//! still read while waking up are all fixed properties of the board. This
//! crate is the single source of truth for them.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! Physical region boundaries consumed by the attribute classifier and the
//! bootstrap builder:
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │ Spin-table mailboxes (0xE0..)   │  NULL_GUARD_BOUNDARY = 0x80
//! 0x0008_0000 ├─────────────────────────────────┤  KERNEL_RAM_START
//!             │   Kernel image and general RAM  │
//! 0x3C00_0000 ├─────────────────────────────────┤  FRAMEBUFFER_START
//!             │          Framebuffer            │
//! 0x3F00_0000 ├─────────────────────────────────┤  PERIPHERAL_BASE
//!             │      SoC peripherals (MMIO)     │
//! 0x4000_0000 ├─────────────────────────────────┤  DEVICE_WINDOW_START
//!             │ Local peripherals / core mailbox│
//!             │        (device window)          │
//! 0x8000_0000 └─────────────────────────────────┘  DEVICE_WINDOW_END
//! ```
//!
//! ### Boot Handshake ([`boot`])
//! The flag through which the boot path announces that every secondary core
//! has consumed its spin-table mailbox, after which low memory may be
//! unmapped.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
