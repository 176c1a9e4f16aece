//! Kernel error types
//!
//! One enum for everything that can fail at runtime. Structural invariant
//! violations (remapping a live PTE, unmapping a hole) are kernel bugs and
//! panic instead of returning a variant.

use core::fmt;

/// Main kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// Frame or heap exhaustion
    OutOfMemory,
    /// Virtual address beyond MAXVA or otherwise unusable
    InvalidAddress { addr: usize },
    /// Bad syscall number, file handle, or offset
    InvalidArgument,
    /// Named device or path does not exist
    NotFound,
    /// Registry or table slot capacity exhausted
    ResourceExhausted { resource: &'static str },
    /// Operation is recognized but not provided by this kernel
    NotImplemented { operation: &'static str },
    /// Device rejected the operation
    DeviceError { device: &'static str },
    /// Malformed executable image
    BadExecutable { reason: &'static str },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::OutOfMemory => write!(f, "out of memory"),
            KernelError::InvalidAddress { addr } => {
                write!(f, "invalid address {:#x}", addr)
            }
            KernelError::InvalidArgument => write!(f, "invalid argument"),
            KernelError::NotFound => write!(f, "not found"),
            KernelError::ResourceExhausted { resource } => {
                write!(f, "resource exhausted: {}", resource)
            }
            KernelError::NotImplemented { operation } => {
                write!(f, "not implemented: {}", operation)
            }
            KernelError::DeviceError { device } => write!(f, "device error: {}", device),
            KernelError::BadExecutable { reason } => {
                write!(f, "bad executable: {}", reason)
            }
        }
    }
}

/// Result alias used throughout the kernel
pub type Result<T> = core::result::Result<T, KernelError>;

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable() {
        extern crate std;
        use std::string::ToString;

        assert_eq!(KernelError::OutOfMemory.to_string(), "out of memory");
        assert_eq!(
            KernelError::InvalidAddress { addr: 0xdead }.to_string(),
            "invalid address 0xdead"
        );
    }
}
