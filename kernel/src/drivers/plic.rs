//! PLIC driver
//!
//! Claim/complete plumbing for external interrupts on hart 0's S-mode
//! context. The only wired source today is the UART; its interrupts are
//! acknowledged and logged, with console input itself still polled.

use crate::mm::PLIC_BASE;

/// UART0 interrupt source on the virt machine
pub const UART0_IRQ: u32 = 10;

/// Per-source priority registers
const PRIORITY: usize = PLIC_BASE;
/// Enable bits for hart 0, S-mode context
const SENABLE: usize = PLIC_BASE + 0x2080;
/// Priority threshold for hart 0, S-mode context
const STHRESHOLD: usize = PLIC_BASE + 0x20_1000;
/// Claim/complete register for hart 0, S-mode context
const SCLAIM: usize = PLIC_BASE + 0x20_1004;

fn write_reg(addr: usize, value: u32) {
    // SAFETY: addr is within the PLIC MMIO window mapped at boot.
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

fn read_reg(addr: usize) -> u32 {
    // SAFETY: as in write_reg; SCLAIM reads have the documented claim side
    // effect, which is exactly what claim() wants.
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

/// Route the UART source to hart 0 S-mode and open the threshold.
pub fn init() {
    write_reg(PRIORITY + 4 * UART0_IRQ as usize, 1);
    write_reg(SENABLE, 1 << UART0_IRQ);
    write_reg(STHRESHOLD, 0);
    log::info!("PLIC routing irq {} to hart 0", UART0_IRQ);
}

/// Claim the highest-priority pending interrupt; 0 means none.
pub fn claim() -> u32 {
    read_reg(SCLAIM)
}

/// Signal completion of a claimed interrupt.
pub fn complete(irq: u32) {
    write_reg(SCLAIM, irq);
}

/// External-interrupt dispatch: claim, route, complete.
pub fn handle_interrupt() {
    let irq = claim();
    if irq == 0 {
        return;
    }
    if irq == UART0_IRQ {
        log::info!("uart interrupt");
    } else {
        log::warn!("unexpected external interrupt {}", irq);
    }
    complete(irq);
}
