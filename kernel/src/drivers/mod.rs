//! Device drivers
//!
//! Consumers of the core: the UART console, the RAM-backed test device, the
//! RTC stub, and the PLIC. `init` brings them up and registers the
//! character devices with the VFS.

#[cfg(target_arch = "riscv64")]
pub mod plic;
pub mod rtc;
pub mod testdev;
pub mod uart;

/// Bring up the drivers and populate the device registry.
pub fn init() {
    uart::init();
    #[cfg(target_arch = "riscv64")]
    plic::init();

    let _ = crate::fs::register_device("console", &uart::CONSOLE_DEV);
    let _ = testdev::register();
}
