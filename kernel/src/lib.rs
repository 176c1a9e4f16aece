//! rvos kernel library
//!
//! Core of a small preemptive kernel for the QEMU `virt` RISC-V 64 machine:
//! physical page allocator, bump heap, SV39 virtual memory, process table,
//! MLFQ + real-time scheduler, trap dispatch, a device-only VFS, and the
//! syscall surface that ties them together.
//!
//! The machine-independent core compiles for the host triple as well, so the
//! standard `cargo test` harness can exercise it; everything that touches
//! CSRs, MMIO, or inline assembly is gated on `target_arch = "riscv64"`.

#![no_std]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]

extern crate alloc;

// Host target: use the system allocator so unit tests can allocate normally.
#[cfg(not(target_os = "none"))]
extern crate std;
#[cfg(not(target_os = "none"))]
#[global_allocator]
static SYSTEM_ALLOCATOR: std::alloc::System = std::alloc::System;

// Bare metal: the kernel bump heap backs `alloc`.
#[cfg(target_os = "none")]
#[global_allocator]
static KERNEL_HEAP: mm::heap::LockedHeap = mm::heap::LockedHeap::empty();

/// Get a reference to the global kernel heap (bare metal only).
#[cfg(target_os = "none")]
pub fn kernel_heap() -> &'static mm::heap::LockedHeap {
    &KERNEL_HEAP
}

#[macro_use]
pub mod print;

pub mod arch;
pub mod drivers;
pub mod error;
pub mod fs;
pub mod logger;
pub mod mm;
pub mod process;
pub mod sched;
pub mod services;
pub mod syscall;
pub mod trap;

// Re-export memory management for tests
pub use mm::{PhysAddr, VirtAddr, PAGE_SIZE};
// Re-export scheduler items for tests
pub use process::{Process, ProcessState, SchedPolicy};
pub use sched::{Scheduler, TaskRef};

/// Heap allocation error handler.
///
/// Panic is intentional: heap allocation failure in a no_std kernel is
/// unrecoverable. The alloc_error_handler ABI requires `-> !`.
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("allocation error: {:?}", layout);
}
