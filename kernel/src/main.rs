//! rvos kernel binary
//!
//! Bare-metal entry for the QEMU virt machine. The boot stub in the library
//! (`arch::riscv64::entry`) lands in `kernel_main` below with a stack and a
//! zeroed .bss; everything after that is ordinary initialization, ending in
//! the scheduler dispatch loop.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use rvos_kernel::{arch, drivers, fs, mm, println, sched, services, trap};

#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn kernel_main(_hartid: usize, _dtb: usize) -> ! {
    drivers::uart::init();
    println!();
    println!("====================================");
    println!("  rvos - RISC-V 64 kernel");
    println!("====================================");

    rvos_kernel::logger::init();

    mm::init();
    mm::vm::init();
    trap::init();
    sched::init();
    fs::init();
    drivers::init();

    sched::spawn("shell", shell_entry).expect("spawning the shell task");

    arch::riscv64::timer::init();
    sched::start()
}

#[cfg(target_os = "none")]
fn shell_entry() -> ! {
    services::shell::run()
}

/// Kernel panics terminate: report and park. User-triggered errors never
/// reach here; they surface as syscall return codes.
#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("\n[PANIC] {}", info);
    arch::halt()
}

#[cfg(not(target_os = "none"))]
fn main() {
    println!("rvos-kernel runs on riscv64gc-unknown-none-elf; this host build is for tests only");
}
