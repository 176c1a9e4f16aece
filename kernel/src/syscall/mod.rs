//! System call surface
//!
//! Number in a0, arguments in a1..a3, return in a0; errors are reported to
//! the caller as a bare -1. The handlers decode raw pointers, then delegate
//! to the console, the VFS, and the scheduler.

use crate::error::KernelError;
use crate::fs::{self, OpenFlags, FILE_TABLE};
use crate::{arch, drivers::uart, sched};

/// System call numbers
#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Read = 0,
    Write = 1,
    Fork = 2,
    Exec = 3,
    Exit = 4,
    Open = 5,
    Close = 6,
    GetPid = 7,
    Yield = 8,
}

impl TryFrom<usize> for Syscall {
    type Error = ();

    fn try_from(num: usize) -> Result<Self, ()> {
        match num {
            0 => Ok(Syscall::Read),
            1 => Ok(Syscall::Write),
            2 => Ok(Syscall::Fork),
            3 => Ok(Syscall::Exec),
            4 => Ok(Syscall::Exit),
            5 => Ok(Syscall::Open),
            6 => Ok(Syscall::Close),
            7 => Ok(Syscall::GetPid),
            8 => Ok(Syscall::Yield),
            _ => Err(()),
        }
    }
}

/// Internal error taxonomy; the wire format collapses all of it to -1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    UnknownSyscall,
    InvalidArgument,
    NotImplemented,
    NotFound,
    BadDescriptor,
    DeviceError,
    OutOfResources,
}

impl From<KernelError> for SyscallError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::NotFound => SyscallError::NotFound,
            KernelError::InvalidArgument | KernelError::InvalidAddress { .. } => {
                SyscallError::InvalidArgument
            }
            KernelError::OutOfMemory | KernelError::ResourceExhausted { .. } => {
                SyscallError::OutOfResources
            }
            KernelError::NotImplemented { .. } => SyscallError::NotImplemented,
            _ => SyscallError::DeviceError,
        }
    }
}

pub type SyscallResult = core::result::Result<usize, SyscallError>;

/// Entry point used by the trap path (and directly by kernel tasks).
pub fn syscall_handler(num: usize, a1: usize, a2: usize, a3: usize) -> isize {
    let result = match Syscall::try_from(num) {
        Ok(syscall) => dispatch(syscall, a1, a2, a3),
        Err(()) => Err(SyscallError::UnknownSyscall),
    };

    match result {
        Ok(value) => value as isize,
        Err(_) => -1,
    }
}

fn dispatch(syscall: Syscall, a1: usize, a2: usize, _a3: usize) -> SyscallResult {
    match syscall {
        Syscall::Read => sys_read(a1, a2),
        Syscall::Write => sys_write(a1, a2),
        Syscall::Fork => Err(SyscallError::NotImplemented),
        Syscall::Exec => Err(SyscallError::NotImplemented),
        Syscall::Exit => sys_exit(a1),
        Syscall::Open => sys_open(a1, a2),
        Syscall::Close => sys_close(a1),
        Syscall::GetPid => Ok(sched::current_pid() as usize),
        Syscall::Yield => {
            sched::yield_now();
            Ok(0)
        }
    }
}

/// Gather console input, stopping after (and including) a newline.
fn sys_read(buf: usize, len: usize) -> SyscallResult {
    if buf == 0 {
        return Err(SyscallError::InvalidArgument);
    }
    // SAFETY: without user mode, syscall callers are kernel tasks handing us
    // a live writable buffer of at least `len` bytes.
    let buf = unsafe { core::slice::from_raw_parts_mut(buf as *mut u8, len) };

    for i in 0..buf.len() {
        let byte = uart::getc();
        buf[i] = byte;
        if byte == b'\n' {
            return Ok(i + 1);
        }
    }
    Ok(len)
}

/// Stream bytes through the console protocol.
fn sys_write(buf: usize, len: usize) -> SyscallResult {
    if buf == 0 {
        return Err(SyscallError::InvalidArgument);
    }
    // SAFETY: as in sys_read, but read-only.
    let buf = unsafe { core::slice::from_raw_parts(buf as *const u8, len) };

    for &byte in buf {
        uart::putc(byte);
    }
    Ok(len)
}

/// True teardown is out of scope; the exit is recorded and reported.
fn sys_exit(code: usize) -> SyscallResult {
    log::info!("process {} exits with code {}", sched::current_pid(), code);
    Ok(0)
}

fn sys_open(path: usize, flags: usize) -> SyscallResult {
    let path = read_path(path)?;
    let file = fs::open(path, OpenFlags::from_bits_truncate(flags as u32))?;

    arch::without_interrupts(|| FILE_TABLE.lock().install(file))
        .ok_or(SyscallError::OutOfResources)
}

fn sys_close(fd: usize) -> SyscallResult {
    let file = arch::without_interrupts(|| FILE_TABLE.lock().remove(fd))
        .ok_or(SyscallError::BadDescriptor)?;
    fs::close(file)?;
    Ok(0)
}

/// Decode a NUL-terminated path argument, bounded at 256 bytes. The
/// returned borrow must not outlive the caller's buffer; `sys_open` only
/// holds it across the registry lookup, which copies what it needs.
fn read_path<'a>(ptr: usize) -> Result<&'a str, SyscallError> {
    const PATH_MAX: usize = 256;

    if ptr == 0 {
        return Err(SyscallError::InvalidArgument);
    }
    // SAFETY: the caller passes a live NUL-terminated string; the scan is
    // bounded at PATH_MAX bytes.
    let bytes = unsafe { core::slice::from_raw_parts(ptr as *const u8, PATH_MAX) };
    let len = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(SyscallError::InvalidArgument)?;
    core::str::from_utf8(&bytes[..len]).map_err(|_| SyscallError::InvalidArgument)
}

/// File read/write used by the shell's device test; not part of the numeric
/// surface, but the same delegation path the syscalls use.
pub fn file_read(fd: usize, buf: &mut [u8]) -> SyscallResult {
    arch::without_interrupts(|| {
        let mut table = FILE_TABLE.lock();
        let file = table.get_mut(fd).ok_or(SyscallError::BadDescriptor)?;
        file.read(buf).map_err(SyscallError::from)
    })
}

pub fn file_write(fd: usize, buf: &[u8]) -> SyscallResult {
    arch::without_interrupts(|| {
        let mut table = FILE_TABLE.lock();
        let file = table.get_mut(fd).ok_or(SyscallError::BadDescriptor)?;
        file.write(buf).map_err(SyscallError::from)
    })
}

pub fn file_seek(fd: usize, offset: usize) -> SyscallResult {
    arch::without_interrupts(|| {
        let mut table = FILE_TABLE.lock();
        let file = table.get_mut(fd).ok_or(SyscallError::BadDescriptor)?;
        file.seek(offset).map_err(SyscallError::from)
    })
}
