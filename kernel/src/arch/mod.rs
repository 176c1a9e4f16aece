//! Architecture support
//!
//! Everything that touches CSRs, MMIO, or inline assembly lives under here.
//! The rest of the kernel goes through the small façade below so the core
//! compiles (and is testable) on the host triple.

#[cfg(target_arch = "riscv64")]
pub mod riscv64;

#[cfg(target_arch = "riscv64")]
pub use riscv64::{context, exit_qemu, halt, idle, install_page_table, QemuExitCode};

/// Run `f` with interrupts disabled, restoring the previous interrupt state
/// afterwards. Every mutation of scheduler queues, the process table, the
/// allocators, and the device registry goes through this scope.
#[cfg(target_arch = "riscv64")]
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    let _guard = riscv64::disable_interrupts();
    f()
}

/// Host builds have no interrupt state to mask.
#[cfg(not(target_arch = "riscv64"))]
pub fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Context switching for non-riscv64 targets: bookkeeping only.
#[cfg(not(target_arch = "riscv64"))]
pub mod context {
    /// Callee-save register file of a suspended task.
    ///
    /// Layout mirrors the riscv64 definition so the scheduler is identical on
    /// both targets; only the swap itself differs.
    #[repr(C)]
    #[derive(Debug, Clone, Default)]
    pub struct Context {
        pub ra: usize,
        pub sp: usize,
        pub s: [usize; 12],
    }

    impl Context {
        pub const fn zeroed() -> Self {
            Self {
                ra: 0,
                sp: 0,
                s: [0; 12],
            }
        }
    }

    /// Register swap stub. The host never suspends a real register file;
    /// scheduler state transitions are observable without it.
    ///
    /// # Safety
    ///
    /// Callers pass pointers obtained from live `Process` records; nothing is
    /// dereferenced here.
    pub unsafe fn switch(_old: *mut Context, _new: *const Context) {}
}

/// Install a page-table root: no MMU on the host build.
#[cfg(not(target_arch = "riscv64"))]
pub fn install_page_table(_root: crate::mm::PhysAddr) {}

/// Relax the CPU while waiting for work (host: spin hint).
#[cfg(not(target_arch = "riscv64"))]
pub fn idle() {
    core::hint::spin_loop();
}
