//! RISC-V context switching
//!
//! Only the callee-save register file is held here; caller-save registers
//! are spilled by the trap entry path before any Rust code runs, so the
//! voluntary switch below never needs them.

use core::arch::global_asm;

/// Callee-save register file of a suspended task.
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Return address: where the task resumes
    pub ra: usize,
    /// Stack pointer
    pub sp: usize,
    /// s0..s11
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

global_asm!(
    r#"
    .section .text
    .globl __rvos_swtch
    .align 4
    // __rvos_swtch(a0 = *mut Context old, a1 = *const Context new)
    //
    // Saves the callee-save file of the caller into old, restores new, and
    // returns on new's stack into new.ra. Offsets follow the #[repr(C)]
    // layout of Context: ra, sp, s0..s11.
__rvos_swtch:
    sd ra, 0(a0)
    sd sp, 8(a0)
    sd s0, 16(a0)
    sd s1, 24(a0)
    sd s2, 32(a0)
    sd s3, 40(a0)
    sd s4, 48(a0)
    sd s5, 56(a0)
    sd s6, 64(a0)
    sd s7, 72(a0)
    sd s8, 80(a0)
    sd s9, 88(a0)
    sd s10, 96(a0)
    sd s11, 104(a0)

    ld ra, 0(a1)
    ld sp, 8(a1)
    ld s0, 16(a1)
    ld s1, 24(a1)
    ld s2, 32(a1)
    ld s3, 40(a1)
    ld s4, 48(a1)
    ld s5, 56(a1)
    ld s6, 64(a1)
    ld s7, 72(a1)
    ld s8, 80(a1)
    ld s9, 88(a1)
    ld s10, 96(a1)
    ld s11, 104(a1)
    ret
"#
);

extern "C" {
    fn __rvos_swtch(old: *mut Context, new: *const Context);
}

/// Swap register files: save into `old`, resume from `new`.
///
/// # Safety
///
/// Both pointers must reference live `Context` records, `new` must hold a
/// resumable register file (a prior save or a `setup_context` image), and
/// interrupts must be disabled across the call.
pub unsafe fn switch(old: *mut Context, new: *const Context) {
    // SAFETY: contract forwarded to the caller; the asm only spills and
    // reloads the callee-save file at the given addresses.
    unsafe { __rvos_swtch(old, new) };
}
