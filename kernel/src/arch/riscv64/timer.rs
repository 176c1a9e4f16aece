//! Timer programming
//!
//! The QEMU virt machine runs the timebase at 10 MHz; one scheduler tick is
//! 10 ms. The timer is one-shot, so the trap handler re-arms it on every
//! tick before calling into the scheduler.

use super::sbi;

/// Timebase frequency of the QEMU virt machine (Hz)
const TIMEBASE_FREQ: u64 = 10_000_000;

/// Scheduler tick length
const TICK_MS: u64 = 10;

/// Timer cycles per scheduler tick
pub const TICK_CYCLES: u64 = TIMEBASE_FREQ * TICK_MS / 1000;

/// Arm the first tick.
pub fn init() {
    rearm();
    log::info!("timer armed, {} ms per tick", TICK_MS);
}

/// Arm the next tick relative to now.
pub fn rearm() {
    let now = riscv::register::time::read() as u64;
    sbi::set_timer(now + TICK_CYCLES);
}
