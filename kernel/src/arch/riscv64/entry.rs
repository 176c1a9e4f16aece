//! Boot entry
//!
//! OpenSBI drops us here in S-mode with the hart id in a0 and the DTB
//! pointer in a1. We zero .bss, point sp at the boot stack, and enter
//! `kernel_main`. Nothing else happens before Rust code runs.

use core::arch::global_asm;

global_asm!(
    r#"
    .section .text.entry
    .globl _start
_start:
    // Zero .bss; OpenSBI does not do it for us.
    la t0, __bss_start
    la t1, __bss_end
1:
    bgeu t0, t1, 2f
    sd zero, 0(t0)
    addi t0, t0, 8
    j 1b
2:
    la sp, __boot_stack_top
    call kernel_main
3:
    wfi
    j 3b

    .section .bss.stack
    .align 12
    .globl __boot_stack_bottom
__boot_stack_bottom:
    .space 0x10000
    .globl __boot_stack_top
__boot_stack_top:
"#
);
