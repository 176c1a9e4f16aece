//! Kernel logger
//!
//! Bridges the `log` facade onto the console `print!` path. Records render as
//! `[LEVEL] target: message`. High-rate paths (tick accounting, syscall
//! dispatch) do not log; subsystem init and error paths do.

use log::{Level, LevelFilter, Metadata, Record};

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Install the kernel logger. Safe to call more than once; later calls are
/// no-ops because the facade only accepts one logger.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}
