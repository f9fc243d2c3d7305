use crate::qemu_fmt::QemuSink;
use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

pub struct QemuLogger {
    max_level: LevelFilter,
}

impl QemuLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Install as the global logger. Call once during early init.
    ///
    /// # Errors
    /// If another logger was installed first.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

/// Format one record as `"[LEVEL] target: message\n"`.
///
/// # Errors
/// Whatever `out` reports.
pub fn write_record<W: fmt::Write>(out: &mut W, record: &Record) -> fmt::Result {
    writeln!(out, "[{}] {}: {}", record.level(), record.target(), record.args())
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = write_record(&mut QemuSink, record);
    }

    fn flush(&self) {
        // the UART drains on its own
    }
}
