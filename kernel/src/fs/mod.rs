//! Virtual file system
//!
//! A device-only VFS: a fixed registry of named character devices, inodes
//! that bind a device's operation table, and open-file handles that carry an
//! offset. Open resolves a name; everything after that delegates to the
//! device ops. There is no hierarchy and no mount table.

pub mod file;

pub use file::{FileTable, OpenFile, OpenFlags, FILE_TABLE, MAX_OPEN_FILES};

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::arch;
use crate::error::{KernelError, Result};

/// Device registry capacity
pub const MAX_DEVICES: usize = 16;

/// Device name capacity (31 bytes + NUL)
pub const DEV_NAME_LEN: usize = 32;

/// Inode kinds. Only devices exist in this VFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Dev,
}

/// Operation table a character device registers with the VFS.
///
/// `read`/`write` return bytes transferred; `read` returning 0 means EOF,
/// and a short `write` means the backing store is at its limit. The device
/// owns the handle's offset; the VFS never touches it.
pub trait DevOps: Send + Sync {
    fn open(&self, _inode: &Inode, _file: &mut OpenFile) -> Result<()> {
        Ok(())
    }

    fn close(&self, _file: &mut OpenFile) -> Result<()> {
        Ok(())
    }

    fn read(&self, file: &mut OpenFile, buf: &mut [u8]) -> Result<usize>;

    fn write(&self, file: &mut OpenFile, buf: &[u8]) -> Result<usize>;

    fn seek(&self, file: &mut OpenFile, offset: usize) -> Result<usize>;
}

/// Kernel object for an open device file. Freed when the last `Arc` drops.
pub struct Inode {
    /// Monotonic inode number
    pub ino: u64,
    pub kind: NodeType,
    /// Always 0 for devices
    pub size: usize,
    /// Operation table bound at open; immutable once registered
    pub ops: &'static dyn DevOps,
}

static NEXT_INO: AtomicU64 = AtomicU64::new(1);

/// One registry entry
struct Device {
    name: [u8; DEV_NAME_LEN],
    ops: &'static dyn DevOps,
}

impl Device {
    fn matches(&self, name: &str) -> bool {
        let bytes = name.as_bytes();
        if bytes.len() >= DEV_NAME_LEN {
            return false;
        }
        self.name[..bytes.len()] == *bytes && self.name[bytes.len()] == 0
    }
}

/// Fixed-capacity table of named character devices.
pub struct DeviceRegistry {
    devices: [Option<Device>; MAX_DEVICES],
}

impl DeviceRegistry {
    pub const fn new() -> Self {
        Self {
            devices: [const { None }; MAX_DEVICES],
        }
    }

    /// Copy `name` (truncated to 31 bytes) into the first free slot.
    /// Duplicate names are allowed; `open` resolves to the first match.
    pub fn register(&mut self, name: &str, ops: &'static dyn DevOps) -> Result<()> {
        let slot = self
            .devices
            .iter()
            .position(|d| d.is_none())
            .ok_or(KernelError::ResourceExhausted {
                resource: "device registry",
            })?;

        let mut stored = [0u8; DEV_NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(DEV_NAME_LEN - 1);
        stored[..len].copy_from_slice(&bytes[..len]);

        self.devices[slot] = Some(Device { name: stored, ops });
        Ok(())
    }

    /// First registered device with this exact name.
    fn lookup(&self, name: &str) -> Option<&'static dyn DevOps> {
        self.devices
            .iter()
            .flatten()
            .find(|d| d.matches(name))
            .map(|d| d.ops)
    }

    /// Resolve `path` (an optional leading `/` plus a device name), bind an
    /// inode, and produce a handle at offset 0.
    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<OpenFile> {
        let name = path.strip_prefix('/').unwrap_or(path);
        let ops = self.lookup(name).ok_or(KernelError::NotFound)?;

        let inode = Arc::new(Inode {
            ino: NEXT_INO.fetch_add(1, Ordering::Relaxed),
            kind: NodeType::Dev,
            size: 0,
            ops,
        });
        let mut handle = OpenFile {
            inode: inode.clone(),
            offset: 0,
            flags,
        };
        // A failing device open undoes everything: dropping the handle and
        // the Arc releases the inode.
        ops.open(&inode, &mut handle)?;
        Ok(handle)
    }

    pub fn device_count(&self) -> usize {
        self.devices.iter().flatten().count()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global device registry
pub static DEVICES: Mutex<DeviceRegistry> = Mutex::new(DeviceRegistry::new());

/// Register a device with the global registry.
pub fn register_device(name: &str, ops: &'static dyn DevOps) -> Result<()> {
    let result = arch::without_interrupts(|| DEVICES.lock().register(name, ops));
    match result {
        Ok(()) => log::info!("registered device: {}", name),
        Err(_) => log::warn!("device registry full, dropping: {}", name),
    }
    result
}

/// Open a path against the global registry.
pub fn open(path: &str, flags: OpenFlags) -> Result<OpenFile> {
    arch::without_interrupts(|| DEVICES.lock().open(path, flags))
}

/// Close a handle: run the device close hook (its verdict is ignored; the
/// handle is gone regardless), then release the inode.
pub fn close(mut file: OpenFile) -> Result<()> {
    let ops = file.inode.ops;
    let _ = ops.close(&mut file);
    drop(file);
    Ok(())
}

/// Set up the VFS layer.
pub fn init() {
    log::info!("VFS online, {} device slots", MAX_DEVICES);
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    extern crate std;

    use alloc::vec;
    use alloc::vec::Vec;
    use std::boxed::Box;

    use super::*;

    /// Minimal device: reads always yield one fixed byte.
    struct ConstDev(u8);

    impl DevOps for ConstDev {
        fn read(&self, _file: &mut OpenFile, buf: &mut [u8]) -> Result<usize> {
            if let Some(b) = buf.first_mut() {
                *b = self.0;
                Ok(1)
            } else {
                Ok(0)
            }
        }

        fn write(&self, _file: &mut OpenFile, buf: &[u8]) -> Result<usize> {
            Ok(buf.len())
        }

        fn seek(&self, _file: &mut OpenFile, _offset: usize) -> Result<usize> {
            Err(KernelError::InvalidArgument)
        }
    }

    fn leak(dev: ConstDev) -> &'static ConstDev {
        Box::leak(Box::new(dev))
    }

    #[test]
    fn open_resolves_registered_names() {
        let mut reg = DeviceRegistry::new();
        reg.register("null0", leak(ConstDev(7))).expect("register");

        let mut file = reg
            .open("/null0", OpenFlags::empty())
            .expect("open by path with slash");
        let mut buf = [0u8; 1];
        assert_eq!(file.read(&mut buf), Ok(1));
        assert_eq!(buf[0], 7);

        assert!(reg.open("null0", OpenFlags::empty()).is_ok(), "no slash");
        assert_eq!(
            reg.open("/nosuch", OpenFlags::empty()).err(),
            Some(KernelError::NotFound)
        );
    }

    #[test]
    fn duplicate_names_resolve_to_first_registration() {
        let mut reg = DeviceRegistry::new();
        reg.register("dup", leak(ConstDev(1))).expect("first");
        reg.register("dup", leak(ConstDev(2))).expect("second");

        let mut file = reg.open("dup", OpenFlags::empty()).expect("open");
        let mut buf = [0u8; 1];
        file.read(&mut buf).expect("read");
        assert_eq!(buf[0], 1);
    }

    #[test]
    fn inode_numbers_are_monotonic() {
        let mut reg = DeviceRegistry::new();
        reg.register("mono", leak(ConstDev(0))).expect("register");

        let a = reg.open("mono", OpenFlags::empty()).expect("open a");
        let b = reg.open("mono", OpenFlags::empty()).expect("open b");
        assert!(b.inode.ino > a.inode.ino);
    }

    #[test]
    fn name_matching_is_exact() {
        let mut reg = DeviceRegistry::new();
        reg.register("tty", leak(ConstDev(0))).expect("register");

        assert!(reg.open("tty0", OpenFlags::empty()).is_err());
        assert!(reg.open("tt", OpenFlags::empty()).is_err());
        assert!(reg.open("tty", OpenFlags::empty()).is_ok());
    }

    #[test]
    fn registry_capacity_is_enforced() {
        let mut reg = DeviceRegistry::new();
        let mut names: Vec<alloc::string::String> = vec![];
        for i in 0..MAX_DEVICES {
            names.push(alloc::format!("dev{}", i));
        }
        for name in &names {
            reg.register(name, leak(ConstDev(0))).expect("register");
        }
        assert_eq!(reg.device_count(), MAX_DEVICES);
        assert!(reg.register("one-too-many", leak(ConstDev(0))).is_err());
    }
}
