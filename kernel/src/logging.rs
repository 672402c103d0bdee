//! Kernel logging facility
//!
//! Routes the `log` facade to COM1. Host test builds print to stderr
//! instead so the captured output shows up next to the failing test.

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Global logger instance available throughout the kernel
pub static LOGGER: Logger = Logger::new();

/// Serializes whole records so lines from different contexts never interleave
pub struct Logger {
    inner: Mutex<()>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    pub const fn new() -> Logger {
        Logger {
            inner: Mutex::new(()),
        }
    }

    fn emit(&self, record: &Record) {
        #[cfg(test)]
        std::eprintln!("[{}] {}", record.level(), record.args());

        #[cfg(all(not(test), target_arch = "x86_64"))]
        crate::serial_println!("[{}] {}", record.level(), record.args());

        #[cfg(all(not(test), not(target_arch = "x86_64")))]
        let _ = record;
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    /// Formats messages as "[LEVEL] message"
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _guard = self.inner.lock();
            self.emit(record);
        }
    }

    fn flush(&self) {}
}

/// The level used when the kernel is built in this profile
pub fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Installs [`LOGGER`] as the global logger.
///
/// Fails if a logger was already installed; the max level is left untouched
/// in that case.
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(default_level());
    Ok(())
}
