//! Memory-backed test device
//!
//! A 1 KiB buffer behind the full device-op contract: bounded writes, EOF on
//! reads past the written length, absolute seeks. Exists to exercise the
//! VFS delegation path end to end.

use spin::Mutex;

use crate::error::{KernelError, Result};
use crate::fs::{DevOps, OpenFile};

/// Backing buffer capacity
pub const TESTDEV_SIZE: usize = 1024;

struct Backing {
    data: [u8; TESTDEV_SIZE],
    len: usize,
}

pub struct TestDev {
    backing: Mutex<Backing>,
}

impl TestDev {
    pub const fn new() -> Self {
        Self {
            backing: Mutex::new(Backing {
                data: [0; TESTDEV_SIZE],
                len: 0,
            }),
        }
    }
}

impl Default for TestDev {
    fn default() -> Self {
        Self::new()
    }
}

impl DevOps for TestDev {
    fn read(&self, file: &mut OpenFile, buf: &mut [u8]) -> Result<usize> {
        let backing = self.backing.lock();
        let available = backing.len.saturating_sub(file.offset);
        if available == 0 {
            return Ok(0);
        }

        let count = buf.len().min(available);
        buf[..count].copy_from_slice(&backing.data[file.offset..file.offset + count]);
        file.offset += count;
        Ok(count)
    }

    fn write(&self, file: &mut OpenFile, buf: &[u8]) -> Result<usize> {
        let mut backing = self.backing.lock();
        let space = TESTDEV_SIZE.saturating_sub(file.offset);
        if space == 0 {
            return Err(KernelError::DeviceError { device: "testdev" });
        }

        let count = buf.len().min(space);
        backing.data[file.offset..file.offset + count].copy_from_slice(&buf[..count]);
        file.offset += count;
        if file.offset > backing.len {
            backing.len = file.offset;
        }
        Ok(count)
    }

    fn seek(&self, file: &mut OpenFile, offset: usize) -> Result<usize> {
        if offset > TESTDEV_SIZE {
            return Err(KernelError::InvalidArgument);
        }
        file.offset = offset;
        Ok(offset)
    }
}

/// Registry instance
pub static TESTDEV: TestDev = TestDev::new();

/// Register with the VFS under the name tests and the shell expect.
pub fn register() -> Result<()> {
    crate::fs::register_device("testdev", &TESTDEV)
}
