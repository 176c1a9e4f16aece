//! VFS and syscall surface tests
//!
//! The delegation scenario runs against a private registry; the numeric
//! syscall table runs against the kernel's global registry, file table, and
//! console mock, so the whole surface is covered by one sequential test.

#![cfg(not(target_os = "none"))]

use rvos_kernel::drivers::testdev::{TestDev, TESTDEV_SIZE};
use rvos_kernel::drivers::uart;
use rvos_kernel::fs::{DeviceRegistry, OpenFlags};
use rvos_kernel::syscall::{file_read, file_seek, file_write, syscall_handler};

#[test]
fn vfs_delegates_to_the_device_ops() {
    let mut registry = DeviceRegistry::new();
    registry
        .register("testdev", Box::leak(Box::new(TestDev::new())))
        .expect("register");

    let mut file = registry
        .open("/testdev", OpenFlags::READ | OpenFlags::WRITE)
        .expect("open");

    assert_eq!(file.write(b"hello"), Ok(5));
    assert_eq!(file.seek(0), Ok(0));

    let mut buf = [0u8; 8];
    assert_eq!(file.read(&mut buf), Ok(5));
    assert_eq!(&buf[..5], b"hello");
    assert_eq!(file.read(&mut buf), Ok(0), "EOF past the written length");

    assert!(file.seek(TESTDEV_SIZE + 1).is_err());
    assert!(rvos_kernel::fs::close(file).is_ok());
}

/// Property: every defined syscall number returns its documented value on
/// the happy path, and everything else returns -1. Sequential on purpose --
/// these share the kernel's global state.
#[test]
fn syscall_table_coverage() {
    rvos_kernel::drivers::testdev::register().expect("register testdev globally");

    // WRITE streams through the console protocol.
    uart::take_output();
    let msg = b"echo\n";
    assert_eq!(syscall_handler(1, msg.as_ptr() as usize, msg.len(), 0), 5);
    assert_eq!(uart::take_output(), b"echo\r\n");

    // READ stops after (and includes) the newline.
    uart::feed_input(b"hi\nmore");
    let mut buf = [0u8; 16];
    assert_eq!(syscall_handler(0, buf.as_mut_ptr() as usize, buf.len(), 0), 3);
    assert_eq!(&buf[..3], b"hi\n");

    // READ fills the buffer when no newline shows up in range.
    assert_eq!(syscall_handler(0, buf.as_mut_ptr() as usize, 4, 0), 4);
    assert_eq!(&buf[..4], b"more");

    // FORK and EXEC are not provided by this core.
    assert_eq!(syscall_handler(2, 0, 0, 0), -1);
    assert_eq!(syscall_handler(3, 0, 0, 0), -1);

    // EXIT records the code and reports success.
    assert_eq!(syscall_handler(4, 42, 0, 0), 0);

    // OPEN yields a descriptor past the reserved console range.
    let path = b"/testdev\0";
    let fd = syscall_handler(5, path.as_ptr() as usize, 0, 0);
    assert!(fd >= 3, "got descriptor {}", fd);
    let fd = fd as usize;

    // The handle delegates: write, rewind, read back.
    assert_eq!(file_write(fd, b"hello"), Ok(5));
    assert_eq!(file_seek(fd, 0), Ok(0));
    let mut echo = [0u8; 5];
    assert_eq!(file_read(fd, &mut echo), Ok(5));
    assert_eq!(&echo, b"hello");

    // CLOSE succeeds once; the descriptor is dead afterwards.
    assert_eq!(syscall_handler(6, fd, 0, 0), 0);
    assert_eq!(syscall_handler(6, fd, 0, 0), -1);
    assert!(file_read(fd, &mut echo).is_err());

    // OPEN on an unknown name fails.
    let missing = b"/does-not-exist\0";
    assert_eq!(syscall_handler(5, missing.as_ptr() as usize, 0, 0), -1);

    // GETPID: no process is current on the test harness CPU.
    assert_eq!(syscall_handler(7, 0, 0, 0), 0);

    // YIELD always succeeds; with empty queues the idle record takes over.
    assert_eq!(syscall_handler(8, 0, 0, 0), 0);

    // Unknown numbers are rejected.
    assert_eq!(syscall_handler(9, 0, 0, 0), -1);
    assert_eq!(syscall_handler(1000, 0, 0, 0), -1);
}
