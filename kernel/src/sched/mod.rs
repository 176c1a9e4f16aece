//! Scheduling
//!
//! [`scheduler::Scheduler`] holds the policy engine; this module owns the
//! global instance and the entry points the rest of the kernel calls. Every
//! entry point masks interrupts for its whole critical section, and the
//! architectural register swap happens only after both locks are released.
//!
//! Lock order: SCHEDULER before PROCESS_TABLE, always.

pub mod queue;
pub mod scheduler;

pub use scheduler::{
    Scheduler, SchedulerStats, TaskRef, BOOST_PERIOD, MAX_CPUS, NUM_CPUS, NUM_QUEUE_LEVELS,
    QUEUE_TIME_SLICES, RT_TIME_SLICE,
};

use spin::Mutex;

use crate::arch;
use crate::process::{SchedPolicy, PROCESS_TABLE};

/// Global scheduler instance
pub static SCHEDULER: Mutex<Scheduler> = Mutex::new(Scheduler::new());

/// Set up the idle records.
pub fn init() {
    arch::without_interrupts(|| SCHEDULER.lock().init());
}

/// Enqueue a process-table slot by its policy.
pub fn add(slot: usize) {
    arch::without_interrupts(|| {
        let mut sched = SCHEDULER.lock();
        let mut table = PROCESS_TABLE.lock();
        sched.add(&mut table, slot);
    });
}

/// Pick the next task and transfer the CPU to it.
pub fn yield_now() {
    arch::without_interrupts(|| {
        let pair = {
            let mut sched = SCHEDULER.lock();
            let mut table = PROCESS_TABLE.lock();
            sched.resched(&mut table)
        };
        if let Some((old, new)) = pair {
            // SAFETY: both contexts live in static singletons (scheduler /
            // process table), the locks are released, and interrupts stay
            // masked across the swap.
            unsafe { arch::context::switch(old, new) };
        }
    });
}

/// Timer tick: account, then hand the CPU over if the tick asks for it.
pub fn tick() {
    arch::without_interrupts(|| {
        let needs_resched = {
            let mut sched = SCHEDULER.lock();
            let mut table = PROCESS_TABLE.lock();
            sched.tick(&mut table)
        };
        if needs_resched {
            let pair = {
                let mut sched = SCHEDULER.lock();
                let mut table = PROCESS_TABLE.lock();
                sched.resched(&mut table)
            };
            if let Some((old, new)) = pair {
                // SAFETY: as in yield_now; contexts are in static storage
                // and interrupts are masked.
                unsafe { arch::context::switch(old, new) };
            }
        }
    });
}

/// Global tick count.
pub fn ticks() -> u64 {
    arch::without_interrupts(|| SCHEDULER.lock().ticks())
}

/// Identifier of the current process; 0 for idle or during bootstrap.
pub fn current_pid() -> u64 {
    arch::without_interrupts(|| {
        let sched = SCHEDULER.lock();
        let table = PROCESS_TABLE.lock();
        sched.current_pid(&table)
    })
}

/// Clamp and apply a priority to a process-table slot.
pub fn set_priority(slot: usize, priority: u8) {
    arch::without_interrupts(|| {
        let mut sched = SCHEDULER.lock();
        let mut table = PROCESS_TABLE.lock();
        sched.set_priority(&mut table, slot, priority);
    });
}

/// Apply a scheduling policy to a process-table slot.
pub fn set_policy(slot: usize, policy: SchedPolicy) {
    arch::without_interrupts(|| {
        let mut sched = SCHEDULER.lock();
        let mut table = PROCESS_TABLE.lock();
        sched.set_policy(&mut table, slot, policy);
    });
}

/// Snapshot of the scheduler counters.
pub fn stats() -> SchedulerStats {
    arch::without_interrupts(|| SCHEDULER.lock().stats())
}

/// Create a kernel task: allocate a slot and a stack, prime the context,
/// and enqueue it. Returns the new pid.
pub fn spawn(name: &str, entry: fn() -> !) -> Option<u64> {
    use alloc::vec;

    const STACK_SIZE: usize = 16 * 1024;
    let stack = vec![0u8; STACK_SIZE].leak();
    let stack_top = (stack.as_ptr() as usize + STACK_SIZE) & !0xF;

    arch::without_interrupts(|| {
        let sched = SCHEDULER.lock();
        let mut table = PROCESS_TABLE.lock();
        let slot = table.alloc()?;
        let start_time = sched.ticks();
        {
            let p = table.get_mut(slot);
            p.set_name(name);
            p.setup_context(entry as usize, stack_top);
            p.stats.start_time = start_time;
        }
        drop(sched);

        let pid = table.get(slot).pid;
        drop(table);
        add(slot);
        Some(pid)
    })
}

/// Enter the dispatch loop on the boot thread, which becomes the idle task.
/// Interrupts come on here; every subsequent handover happens from the trap
/// path or from an explicit yield.
#[cfg(target_arch = "riscv64")]
pub fn start() -> ! {
    arch::without_interrupts(|| SCHEDULER.lock().adopt_idle());
    log::info!("scheduler online");
    crate::arch::riscv64::enable_interrupts();
    loop {
        crate::arch::idle();
        yield_now();
    }
}
