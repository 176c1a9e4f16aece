//! Goldfish RTC read stub
//!
//! The virt machine exposes a Goldfish RTC at 0x101000. Reading TIME_LOW
//! latches the high half, so the order below matters. Host builds report 0.

/// Wall-clock time in nanoseconds since the epoch.
#[cfg(target_arch = "riscv64")]
pub fn read_time_ns() -> u64 {
    const RTC_BASE: usize = 0x10_1000;
    const TIME_LOW: usize = 0x00;
    const TIME_HIGH: usize = 0x04;

    // SAFETY: fixed MMIO window of the virt machine's RTC; reads are
    // side-effect-free apart from the documented latch.
    unsafe {
        let low = core::ptr::read_volatile((RTC_BASE + TIME_LOW) as *const u32) as u64;
        let high = core::ptr::read_volatile((RTC_BASE + TIME_HIGH) as *const u32) as u64;
        (high << 32) | low
    }
}

#[cfg(not(target_arch = "riscv64"))]
pub fn read_time_ns() -> u64 {
    0
}
