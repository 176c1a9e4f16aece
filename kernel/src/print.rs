// Print macros for kernel console output

use core::fmt;

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::print::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[cfg(target_arch = "riscv64")]
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;

    // The UART writer is lock-free byte output; formatting state lives on the
    // caller's stack, so concurrent prints interleave at line granularity at
    // worst.
    let mut console = crate::drivers::uart::Console;
    let _ = console.write_fmt(args);
}

#[cfg(not(target_arch = "riscv64"))]
#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use std::io::Write;

    let _ = std::io::stdout().write_fmt(args);
}
