//! Interactive shell
//!
//! A line-edited REPL over the console. Pure consumer of the core: every
//! command goes through the public scheduler, allocator, VFS, or syscall
//! surfaces. Runs as a normal kernel task.

use crate::drivers::{rtc, uart};
use crate::process::PROCESS_TABLE;
use crate::{arch, sched, syscall};

const LINE_LEN: usize = 128;

/// Shell task body.
pub fn run() -> ! {
    println!();
    println!("rvos shell -- type 'help' for commands");

    let mut line = [0u8; LINE_LEN];
    loop {
        print!("> ");
        let len = read_line(&mut line);
        let cmd = core::str::from_utf8(&line[..len]).unwrap_or("");
        execute(cmd.trim());
    }
}

/// Read one line with backspace handling and echo.
fn read_line(buf: &mut [u8]) -> usize {
    let mut pos = 0;
    loop {
        let byte = uart::getc();
        match byte {
            b'\r' | b'\n' => {
                print!("\n");
                return pos;
            }
            0x08 | 0x7F => {
                if pos > 0 {
                    pos -= 1;
                    print!("\x08 \x08");
                }
            }
            0x20..=0x7E if pos < buf.len() => {
                buf[pos] = byte;
                pos += 1;
                uart::putc(byte);
            }
            _ => {}
        }
    }
}

fn execute(cmd: &str) {
    let (name, rest) = cmd.split_once(' ').unwrap_or((cmd, ""));
    match name {
        "" => {}
        "help" => help(),
        "ps" => ps(),
        "free" => free(),
        "sched" => sched_stats(),
        "ticks" => println!("{}", sched::ticks()),
        "time" => println!("{} ns since epoch", rtc::read_time_ns()),
        "echo" => println!("{}", rest),
        "devtest" => devtest(),
        "poweroff" => poweroff(),
        other => println!("unknown command: {} (try 'help')", other),
    }
}

fn help() {
    println!("commands:");
    println!("  ps        process table");
    println!("  free      memory statistics");
    println!("  sched     scheduler statistics");
    println!("  ticks     global tick counter");
    println!("  time      RTC reading");
    println!("  echo ...  print arguments");
    println!("  devtest   write/seek/read round trip on /testdev");
    println!("  poweroff  shut the machine down");
}

fn ps() {
    use crate::process::{ProcessState, SchedPolicy};

    fn state_name(state: ProcessState) -> &'static str {
        match state {
            ProcessState::Unused => "unused",
            ProcessState::Runnable => "runnable",
            ProcessState::Running => "running",
            ProcessState::Sleeping => "sleeping",
            ProcessState::Zombie => "zombie",
        }
    }

    fn policy_name(policy: SchedPolicy) -> &'static str {
        match policy {
            SchedPolicy::Normal => "normal",
            SchedPolicy::Fifo => "fifo",
            SchedPolicy::RoundRobin => "rr",
            SchedPolicy::Idle => "idle",
        }
    }

    println!(
        "{:>5} {:<9} {:>4} {:<7} {:>8} {:>8}  {}",
        "PID", "STATE", "PRIO", "POLICY", "CPU", "SWITCHES", "NAME"
    );
    arch::without_interrupts(|| {
        let table = PROCESS_TABLE.lock();
        for (_, p) in table.iter_live() {
            println!(
                "{:>5} {:<9} {:>4} {:<7} {:>8} {:>8}  {}",
                p.pid,
                state_name(p.state),
                p.dynamic_priority,
                policy_name(p.policy),
                p.stats.cpu_time,
                p.stats.context_switches,
                p.name()
            );
        }
    });
}

fn free() {
    let pages = arch::without_interrupts(|| crate::mm::PAGE_ALLOCATOR.lock().free_pages());
    println!("free pages: {} ({} KiB)", pages, pages * crate::mm::PAGE_SIZE / 1024);

    #[cfg(target_os = "none")]
    {
        let (used, remaining, allocations) = crate::kernel_heap().stats();
        println!(
            "heap: {} bytes used, {} free, {} allocations",
            used, remaining, allocations
        );
    }
}

fn sched_stats() {
    let stats = sched::stats();
    println!("global ticks: {}", stats.ticks);
    for cpu in 0..sched::NUM_CPUS {
        let total = stats.cpu_ticks[cpu];
        let idle = stats.idle_ticks[cpu];
        let usage = if total > 0 { (total - idle) * 100 / total } else { 0 };
        println!(
            "cpu {}: {} ticks, {} idle, {}% busy",
            cpu, total, idle, usage
        );
    }
    println!("rt queue: {} waiting", stats.rt_queued);
    for (level, count) in stats.mlfq_queued.iter().enumerate() {
        println!(
            "mlfq L{}: {} waiting (slice {} ticks)",
            level,
            count,
            sched::QUEUE_TIME_SLICES[level]
        );
    }
}

/// Round-trip the test device through the numeric syscall surface.
fn devtest() {
    let path = b"/testdev\0";
    let fd = syscall::syscall_handler(5, path.as_ptr() as usize, 0, 0);
    if fd < 0 {
        println!("devtest: open failed");
        return;
    }
    let fd = fd as usize;

    let message = b"hello through the vfs";
    if syscall::file_write(fd, message).is_err() {
        println!("devtest: write failed");
    } else if syscall::file_seek(fd, 0).is_err() {
        println!("devtest: seek failed");
    } else {
        let mut buf = [0u8; 32];
        match syscall::file_read(fd, &mut buf) {
            Ok(n) if buf[..n] == *message => {
                println!("devtest: echoed {} bytes ok", n);
            }
            _ => println!("devtest: readback mismatch"),
        }
    }

    if syscall::syscall_handler(6, fd, 0, 0) != 0 {
        println!("devtest: close failed");
    }
}

fn poweroff() {
    println!("bye");
    #[cfg(target_arch = "riscv64")]
    {
        crate::arch::riscv64::sbi::shutdown();
        crate::arch::exit_qemu(crate::arch::QemuExitCode::Success);
    }
    #[cfg(not(target_arch = "riscv64"))]
    panic!("poweroff outside the machine");
}
