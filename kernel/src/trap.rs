//! Trap handling
//!
//! One direct-mode vector for every supervisor trap. Interrupts dispatch to
//! the timer (scheduler tick), the PLIC (external), or a logged software
//! IPI; ECALL becomes a syscall; every other exception is a fatal kernel
//! bug. Cause decoding is plain data transformation and lives outside the
//! `riscv64` gates.

/// Interrupt flag in scause
pub const INTERRUPT_BIT: u64 = 1 << 63;

/// Interrupt codes
pub const IRQ_S_SOFT: u64 = 1;
pub const IRQ_S_TIMER: u64 = 5;
pub const IRQ_S_EXTERNAL: u64 = 9;

/// Exception code for an environment call from U-mode
pub const EXC_USER_ECALL: u64 = 8;

/// Decoded trap cause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    SoftwareInterrupt,
    TimerInterrupt,
    ExternalInterrupt,
    UnknownInterrupt(u64),
    /// ECALL from U-mode: the syscall entry
    UserEcall,
    /// Any other synchronous exception, by scause code
    Exception(u64),
}

/// Split scause into its interrupt/exception spaces.
pub fn decode(scause: u64) -> TrapCause {
    if scause & INTERRUPT_BIT != 0 {
        match scause & !INTERRUPT_BIT {
            IRQ_S_SOFT => TrapCause::SoftwareInterrupt,
            IRQ_S_TIMER => TrapCause::TimerInterrupt,
            IRQ_S_EXTERNAL => TrapCause::ExternalInterrupt,
            code => TrapCause::UnknownInterrupt(code),
        }
    } else if scause == EXC_USER_ECALL {
        TrapCause::UserEcall
    } else {
        TrapCause::Exception(scause)
    }
}

/// Human-readable exception names, indexed by scause code.
pub fn exception_name(code: u64) -> &'static str {
    match code {
        0 => "instruction address misaligned",
        1 => "instruction access fault",
        2 => "illegal instruction",
        3 => "breakpoint",
        4 => "load address misaligned",
        5 => "load access fault",
        6 => "store address misaligned",
        7 => "store access fault",
        8 => "environment call from U-mode",
        9 => "environment call from S-mode",
        12 => "instruction page fault",
        13 => "load page fault",
        15 => "store page fault",
        _ => "unknown exception",
    }
}

/// Caller-save registers spilled by the trap entry stub.
///
/// Layout is load-bearing: the offsets in the entry assembly below index
/// straight into this struct.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    pub ra: usize,
    pub t0: usize,
    pub t1: usize,
    pub t2: usize,
    pub a0: usize,
    pub a1: usize,
    pub a2: usize,
    pub a3: usize,
    pub a4: usize,
    pub a5: usize,
    pub a6: usize,
    pub a7: usize,
    pub t3: usize,
    pub t4: usize,
    pub t5: usize,
    pub t6: usize,
}

#[cfg(target_arch = "riscv64")]
core::arch::global_asm!(
    r#"
    .section .text
    .globl __rvos_trap_entry
    .align 4
    // All traps funnel through here (STVEC direct mode). Spill the
    // caller-save file onto the interrupted task's kernel stack, hand the
    // frame to trap_handler, and unwind. Callee-save registers are
    // preserved by the Rust side per the ABI.
__rvos_trap_entry:
    addi sp, sp, -128
    sd ra, 0(sp)
    sd t0, 8(sp)
    sd t1, 16(sp)
    sd t2, 24(sp)
    sd a0, 32(sp)
    sd a1, 40(sp)
    sd a2, 48(sp)
    sd a3, 56(sp)
    sd a4, 64(sp)
    sd a5, 72(sp)
    sd a6, 80(sp)
    sd a7, 88(sp)
    sd t3, 96(sp)
    sd t4, 104(sp)
    sd t5, 112(sp)
    sd t6, 120(sp)

    mv a0, sp
    call trap_handler

    ld ra, 0(sp)
    ld t0, 8(sp)
    ld t1, 16(sp)
    ld t2, 24(sp)
    ld a0, 32(sp)
    ld a1, 40(sp)
    ld a2, 48(sp)
    ld a3, 56(sp)
    ld a4, 64(sp)
    ld a5, 72(sp)
    ld a6, 80(sp)
    ld a7, 88(sp)
    ld t3, 96(sp)
    ld t4, 104(sp)
    ld t5, 112(sp)
    ld t6, 120(sp)
    addi sp, sp, 128
    sret
"#
);

/// Install the trap vector and unmask the supervisor interrupt sources.
/// SSTATUS.SIE itself stays off until the scheduler starts.
#[cfg(target_arch = "riscv64")]
pub fn init() {
    use riscv::register::{sie, stvec};

    extern "C" {
        fn __rvos_trap_entry();
    }

    // SAFETY: the entry stub is 4-byte aligned and follows the direct-mode
    // contract; enabling the SIE bits only admits interrupts we handle.
    unsafe {
        stvec::write(__rvos_trap_entry as usize, stvec::TrapMode::Direct);
        sie::set_ssoft();
        sie::set_stimer();
        sie::set_sext();
    }

    log::info!("trap vector at {:#x}", __rvos_trap_entry as usize);
}

/// Rust half of the trap path.
#[cfg(target_arch = "riscv64")]
#[no_mangle]
pub extern "C" fn trap_handler(frame: &mut TrapFrame) {
    use riscv::register::{scause, stval};

    // A resched below can run other tasks that trap on their own; stash the
    // CSRs this trap needs for its sret and restore them at the end.
    let mut saved_sepc: usize;
    let saved_sstatus: usize;
    // SAFETY: read-only CSR access.
    unsafe {
        core::arch::asm!("csrr {}, sepc", out(reg) saved_sepc);
        core::arch::asm!("csrr {}, sstatus", out(reg) saved_sstatus);
    }

    let cause = scause::read().bits() as u64;

    match decode(cause) {
        TrapCause::TimerInterrupt => {
            crate::arch::riscv64::timer::rearm();
            crate::sched::tick();
        }
        TrapCause::SoftwareInterrupt => {
            // IPI path; single-CPU runtime has nothing to do.
            log::info!("software interrupt");
        }
        TrapCause::ExternalInterrupt => {
            crate::drivers::plic::handle_interrupt();
        }
        TrapCause::UserEcall => {
            saved_sepc += 4;
            frame.a0 = crate::syscall::syscall_handler(frame.a0, frame.a1, frame.a2, frame.a3)
                as usize;
        }
        TrapCause::UnknownInterrupt(code) => {
            log::warn!("unhandled interrupt {}", code);
        }
        TrapCause::Exception(code) => {
            panic!(
                "fatal exception: {} (scause={:#x}, sepc={:#x}, stval={:#x})",
                exception_name(code),
                cause,
                saved_sepc,
                stval::read(),
            );
        }
    }

    // SAFETY: restores the exact values this trap entered with (plus the
    // ECALL skip), as required before sret.
    unsafe {
        core::arch::asm!("csrw sepc, {}", in(reg) saved_sepc);
        core::arch::asm!("csrw sstatus, {}", in(reg) saved_sstatus);
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    #[test]
    fn decodes_interrupts() {
        assert_eq!(decode(INTERRUPT_BIT | 1), TrapCause::SoftwareInterrupt);
        assert_eq!(decode(INTERRUPT_BIT | 5), TrapCause::TimerInterrupt);
        assert_eq!(decode(INTERRUPT_BIT | 9), TrapCause::ExternalInterrupt);
        assert_eq!(decode(INTERRUPT_BIT | 11), TrapCause::UnknownInterrupt(11));
    }

    #[test]
    fn decodes_exceptions() {
        assert_eq!(decode(EXC_USER_ECALL), TrapCause::UserEcall);
        assert_eq!(decode(2), TrapCause::Exception(2));
        assert_eq!(decode(13), TrapCause::Exception(13));
    }

    #[test]
    fn exception_names_cover_the_table() {
        assert_eq!(exception_name(2), "illegal instruction");
        assert_eq!(exception_name(15), "store page fault");
        assert_eq!(exception_name(99), "unknown exception");
    }
}
