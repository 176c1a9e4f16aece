//! Open files and the descriptor table

use alloc::sync::Arc;

use bitflags::bitflags;
use spin::Mutex;

use super::{DevOps, Inode};
use crate::error::Result;

/// Open-file table capacity
pub const MAX_OPEN_FILES: usize = 32;

/// Descriptors 0..=2 are reserved for the console convention.
pub const STDIN: usize = 0;
pub const STDOUT: usize = 1;
pub const STDERR: usize = 2;
const RESERVED_FDS: usize = 3;

bitflags! {
    /// Open flags carried on a handle. Devices may ignore them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const NONBLOCK = 1 << 2;
    }
}

/// An open file: inode plus cursor. Owned by whoever opened it; destroyed
/// on close.
pub struct OpenFile {
    pub inode: Arc<Inode>,
    /// Byte offset, maintained by the device ops
    pub offset: usize,
    pub flags: OpenFlags,
}

impl OpenFile {
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let ops: &'static dyn DevOps = self.inode.ops;
        ops.read(self, buf)
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let ops: &'static dyn DevOps = self.inode.ops;
        ops.write(self, buf)
    }

    pub fn seek(&mut self, offset: usize) -> Result<usize> {
        let ops: &'static dyn DevOps = self.inode.ops;
        ops.seek(self, offset)
    }
}

/// Fixed table mapping numeric descriptors to open files, for the syscall
/// surface. Slots start after the reserved console descriptors.
pub struct FileTable {
    files: [Option<OpenFile>; MAX_OPEN_FILES],
}

impl FileTable {
    pub const fn new() -> Self {
        Self {
            files: [const { None }; MAX_OPEN_FILES],
        }
    }

    /// Store a handle, returning its descriptor.
    pub fn install(&mut self, file: OpenFile) -> Option<usize> {
        let slot = self.files.iter().position(|f| f.is_none())?;
        self.files[slot] = Some(file);
        Some(slot + RESERVED_FDS)
    }

    pub fn get_mut(&mut self, fd: usize) -> Option<&mut OpenFile> {
        let slot = fd.checked_sub(RESERVED_FDS)?;
        self.files.get_mut(slot)?.as_mut()
    }

    /// Detach a handle from the table.
    pub fn remove(&mut self, fd: usize) -> Option<OpenFile> {
        let slot = fd.checked_sub(RESERVED_FDS)?;
        self.files.get_mut(slot)?.take()
    }

    pub fn open_count(&self) -> usize {
        self.files.iter().flatten().count()
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Global descriptor table
pub static FILE_TABLE: Mutex<FileTable> = Mutex::new(FileTable::new());
