//! # QEMU Development and Debug Support
//!
//! Early debug output for kernels running on QEMU's `raspi3b` machine. Bytes
//! are written straight into the data register of the PL011 UART, which QEMU
//! forwards to the host (`-serial stdio`). No interrupts, no buffering, no
//! allocation; usable before the MMU is on and from any core.
//!
//! ## Output Mechanism
//! ```text
//! log::info!() / qemu_trace!()
//!     ↓
//! QemuSink (fmt::Write)
//!     ↓
//! dbg_putc() → PL011 DR at 0x3F20_1000
//!     ↓
//! Host terminal
//! ```
//!
//! ## Components
//!
//! - [`QemuLogger`]: `log::Log` implementation, one line per record in the
//!   form `[LEVEL] target: message`.
//! - [`qemu_trace!`]: `format!`-style output that bypasses `log`.
//! - [`qemu_fmt::QemuSink`]: the `core::fmt::Write` sink behind both.
//!
//! ## `enabled` Feature (default)
//!
//! With the feature off, or on any target other than bare-metal `aarch64`,
//! every write is a no-op, so the logger can be installed in host tests.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::{LevelFilter, info};
//!
//! static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Debug);
//!
//! LOGGER.init().expect("logger initialization");
//! info!("page tables ready");
//! ```
//!
//! ```bash
//! qemu-system-aarch64 -M raspi3b -kernel kernel8.img -serial stdio
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::{QemuLogger, write_record};

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// Write a single byte to the UART.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        #[cfg(all(target_arch = "aarch64", target_os = "none"))]
        pl011::putc(c);
        #[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
        let _ = c;
    }

    #[cfg(all(target_arch = "aarch64", target_os = "none"))]
    mod pl011 {
        use kernel_info::memory::PL011_UART_BASE;

        /// Data register.
        const DR: usize = 0x00;
        /// Flag register.
        const FR: usize = 0x18;
        /// FR: transmit FIFO full.
        const FR_TXFF: u32 = 1 << 5;

        #[allow(clippy::inline_always)]
        #[inline(always)]
        pub fn putc(c: u8) {
            let base = PL011_UART_BASE as usize;
            // SAFETY: the PL011 register block is identity-mapped (or
            // translation is off) and only ever written byte-wise here.
            unsafe {
                let fr = (base + FR) as *const u32;
                while fr.read_volatile() & FR_TXFF != 0 {
                    core::hint::spin_loop();
                }
                ((base + DR) as *mut u32).write_volatile(u32::from(c));
            }
        }
    }

    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                dbg_putc(b);
            }
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best effort; nothing to report a failure to.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, _: &str) -> fmt::Result {
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(_: fmt::Arguments) {
        // no-op when feature disabled
    }
}

#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        // No allocation: `format_args!` builds a lightweight `Arguments`.
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
