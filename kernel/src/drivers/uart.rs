//! 16550 UART driver
//!
//! Byte-level serial I/O for the QEMU virt machine, plus the console
//! protocol (`\n` becomes `\r\n` on output). On the host the MMIO backend
//! is replaced by in-memory buffers so the console paths stay exercisable.

use crate::error::Result;
use crate::fs::{DevOps, OpenFile};

#[cfg(target_arch = "riscv64")]
mod backend {
    use crate::mm::UART0_BASE;

    /// Receive Buffer / Transmit Holding Register
    const RBR_THR: usize = 0;
    /// Line Status Register
    const LSR: usize = 5;

    const LSR_RX_READY: u8 = 1 << 0;
    const LSR_TX_IDLE: u8 = 1 << 5;

    fn read_reg(offset: usize) -> u8 {
        // SAFETY: UART0_BASE is the fixed MMIO window of the virt machine's
        // 16550; byte reads at these offsets have no side effects beyond the
        // device's documented ones.
        unsafe { core::ptr::read_volatile((UART0_BASE + offset) as *const u8) }
    }

    fn write_reg(offset: usize, value: u8) {
        // SAFETY: as in read_reg.
        unsafe { core::ptr::write_volatile((UART0_BASE + offset) as *mut u8, value) }
    }

    /// QEMU leaves the UART usable; nothing to program.
    pub fn init() {}

    pub fn putc_raw(byte: u8) {
        while read_reg(LSR) & LSR_TX_IDLE == 0 {}
        write_reg(RBR_THR, byte);
    }

    pub fn getc() -> u8 {
        while read_reg(LSR) & LSR_RX_READY == 0 {}
        read_reg(RBR_THR)
    }

    pub fn has_byte() -> bool {
        read_reg(LSR) & LSR_RX_READY != 0
    }
}

#[cfg(not(target_arch = "riscv64"))]
mod backend {
    use alloc::collections::VecDeque;
    use alloc::vec::Vec;

    use spin::Mutex;

    static RX: Mutex<VecDeque<u8>> = Mutex::new(VecDeque::new());
    static TX: Mutex<Vec<u8>> = Mutex::new(Vec::new());

    pub fn init() {}

    pub fn putc_raw(byte: u8) {
        TX.lock().push(byte);
    }

    pub fn getc() -> u8 {
        loop {
            if let Some(b) = RX.lock().pop_front() {
                return b;
            }
            core::hint::spin_loop();
        }
    }

    pub fn has_byte() -> bool {
        !RX.lock().is_empty()
    }

    /// Queue bytes for `getc` to consume.
    pub fn feed_input(bytes: &[u8]) {
        RX.lock().extend(bytes.iter().copied());
    }

    /// Drain everything written so far.
    pub fn take_output() -> Vec<u8> {
        core::mem::take(&mut *TX.lock())
    }
}

pub use backend::{getc, has_byte, putc_raw};

#[cfg(not(target_arch = "riscv64"))]
pub use backend::{feed_input, take_output};

pub fn init() {
    backend::init();
}

/// Console output: newline becomes carriage return + newline.
pub fn putc(byte: u8) {
    if byte == b'\n' {
        putc_raw(b'\r');
    }
    putc_raw(byte);
}

/// `fmt::Write` adapter for the print macros.
pub struct Console;

impl core::fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            putc(byte);
        }
        Ok(())
    }
}

/// The console as a registered character device.
///
/// Reads gather bytes up to the buffer size, stopping after a newline;
/// writes stream through the console protocol. Seeking a terminal is an
/// error.
pub struct ConsoleDev;

impl DevOps for ConsoleDev {
    fn read(&self, _file: &mut OpenFile, buf: &mut [u8]) -> Result<usize> {
        for i in 0..buf.len() {
            let b = getc();
            buf[i] = b;
            if b == b'\n' {
                return Ok(i + 1);
            }
        }
        Ok(buf.len())
    }

    fn write(&self, _file: &mut OpenFile, buf: &[u8]) -> Result<usize> {
        for &b in buf {
            putc(b);
        }
        Ok(buf.len())
    }

    fn seek(&self, _file: &mut OpenFile, _offset: usize) -> Result<usize> {
        Err(crate::error::KernelError::InvalidArgument)
    }
}

/// Registry instance for the console device.
pub static CONSOLE_DEV: ConsoleDev = ConsoleDev;

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    #[test]
    fn console_translates_newlines() {
        take_output();
        putc(b'a');
        putc(b'\n');
        assert_eq!(take_output(), b"a\r\n");
    }

    #[test]
    fn getc_drains_fed_input() {
        feed_input(b"hi");
        assert!(has_byte());
        assert_eq!(getc(), b'h');
        assert_eq!(getc(), b'i');
        assert!(!has_byte());
    }
}
