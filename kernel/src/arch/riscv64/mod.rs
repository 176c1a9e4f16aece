// RISC-V 64 architecture support

pub mod context;
pub mod entry;
pub mod sbi;
pub mod timer;

use riscv::register::sstatus;

use crate::mm::PhysAddr;

/// QEMU `virt` test device ("sifive,test0"); writes here terminate the VM.
const VIRT_TEST: *mut u32 = 0x10_0000 as *mut u32;

/// Exit codes understood by the QEMU test device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x5555,
    Failed = 0x3333,
}

/// Terminate QEMU through the `virt` test device.
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    // SAFETY: VIRT_TEST is the fixed MMIO address of the test device on the
    // QEMU virt machine; the store does not return on real QEMU. The wfi
    // loop covers platforms without the device.
    unsafe {
        core::ptr::write_volatile(VIRT_TEST, exit_code as u32);
    }
    halt();
}

/// Park the CPU forever.
pub fn halt() -> ! {
    loop {
        // SAFETY: wfi only suspends the hart until the next interrupt.
        unsafe { riscv::asm::wfi() };
    }
}

/// Relax the CPU until the next interrupt.
pub fn idle() {
    // SAFETY: wfi only suspends the hart until the next interrupt.
    unsafe { riscv::asm::wfi() };
}

/// Unmask supervisor interrupts.
pub fn enable_interrupts() {
    // SAFETY: setting SSTATUS.SIE only permits the trap handler installed by
    // trap::init to run.
    unsafe { sstatus::set_sie() };
}

/// RAII interrupt mask. Restores the previous SSTATUS.SIE on drop, so the
/// scopes nest correctly.
pub struct InterruptGuard {
    was_enabled: bool,
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            // SAFETY: restores the interrupt-enable state captured when the
            // guard was created.
            unsafe { sstatus::set_sie() };
        }
    }
}

/// Mask supervisor interrupts until the returned guard is dropped.
pub fn disable_interrupts() -> InterruptGuard {
    let was_enabled = sstatus::read().sie();
    // SAFETY: clearing SSTATUS.SIE masks interrupts; the guard re-enables
    // them if they were enabled before.
    unsafe { sstatus::clear_sie() };
    InterruptGuard { was_enabled }
}

/// Point SATP at a new root page table and flush the TLB.
pub fn install_page_table(root: PhysAddr) {
    use riscv::register::satp;

    // SAFETY: the caller hands us a root built by mm::vm; the kernel range
    // is identity-mapped in every root, so execution continues across the
    // switch. sfence.vma discards stale translations.
    unsafe {
        satp::set(satp::Mode::Sv39, 0, root.as_usize() >> 12);
        riscv::asm::sfence_vma_all();
    }
}
