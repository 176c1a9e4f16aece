//! Core scheduler
//!
//! Multi-level feedback queue for normal processes, a priority queue for
//! real-time processes, and one never-enqueued idle record per CPU. Timer
//! ticks drive accounting, slice expiry, and the periodic starvation boost;
//! `resched` performs the actual handover.
//!
//! The scheduler is instance-constructible and operates on a caller-provided
//! process table, so the whole policy engine runs under the host test
//! harness; only the register swap itself is architecture code.

use super::queue::{FifoQueue, RtQueue};
use crate::arch::context::Context;
use crate::process::{
    Process, ProcessState, ProcessTable, SchedPolicy, PRIORITY_MAX, PRIORITY_NORMAL_MIN,
    PRIORITY_RT_MAX,
};

/// CPU slots carried in the per-CPU arrays. Runtime uses one.
pub const MAX_CPUS: usize = 4;

/// CPUs actually brought up
pub const NUM_CPUS: usize = 1;

/// MLFQ depth
pub const NUM_QUEUE_LEVELS: usize = 3;

/// Per-level time slices, in ticks
pub const QUEUE_TIME_SLICES: [u64; NUM_QUEUE_LEVELS] = [10, 20, 40];

/// Slice handed to real-time round-robin processes
pub const RT_TIME_SLICE: u64 = 10;

/// Every this many ticks, queued normal processes are boosted back to L0
pub const BOOST_PERIOD: u64 = 100;

/// Priority assigned when a process switches to a real-time policy without
/// already holding a real-time priority
const RT_DEFAULT_PRIORITY: u8 = 50;

/// Handle to a schedulable task: a process-table slot, or a per-CPU idle
/// record (which lives in the scheduler and is never enqueued).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRef {
    Slot(usize),
    Idle(usize),
}

/// Per-CPU scheduler state
pub struct CpuSched {
    /// What is running on this CPU right now
    pub current: Option<TaskRef>,
    /// The idle record for this CPU
    idle: Process,
    /// Where the bootstrap thread's registers go on the first handover
    boot_context: Context,
    /// Ticks observed by this CPU
    pub ticks: u64,
    /// Ticks spent in the idle record
    pub idle_ticks: u64,
}

impl CpuSched {
    const fn new() -> Self {
        Self {
            current: None,
            idle: Process::empty(),
            boot_context: Context::zeroed(),
            ticks: 0,
            idle_ticks: 0,
        }
    }
}

/// Point-in-time scheduler counters, for the shell and for tests.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub cpu_ticks: [u64; MAX_CPUS],
    pub idle_ticks: [u64; MAX_CPUS],
    pub rt_queued: usize,
    pub mlfq_queued: [usize; NUM_QUEUE_LEVELS],
}

pub struct Scheduler {
    cpus: [CpuSched; MAX_CPUS],
    rt_queue: RtQueue,
    mlfq: [FifoQueue; NUM_QUEUE_LEVELS],
    /// Global tick counter
    ticks: u64,
    /// The CPU this scheduler instance is driving
    current_cpu: usize,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            cpus: [const { CpuSched::new() }; MAX_CPUS],
            rt_queue: RtQueue::new(),
            mlfq: [const { FifoQueue::new() }; NUM_QUEUE_LEVELS],
            ticks: 0,
            current_cpu: 0,
        }
    }

    /// Set up the per-CPU idle records.
    pub fn init(&mut self) {
        for (cpu, c) in self.cpus.iter_mut().enumerate().take(NUM_CPUS) {
            c.idle = Process::empty();
            c.idle.set_name("idle");
            c.idle.state = ProcessState::Runnable;
            c.idle.policy = SchedPolicy::Idle;
            c.idle.priority = PRIORITY_MAX;
            c.idle.dynamic_priority = PRIORITY_MAX;
            c.idle.queue_level = NUM_QUEUE_LEVELS - 1;
            c.idle.cpu_affinity = 1 << cpu;
            c.idle.last_cpu = Some(cpu as u8);
        }
        log::info!(
            "MLFQ with {} levels (slices {:?}), RT priorities 0..={}",
            NUM_QUEUE_LEVELS,
            QUEUE_TIME_SLICES,
            PRIORITY_RT_MAX
        );
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn current(&self) -> Option<TaskRef> {
        self.cpus[self.current_cpu].current
    }

    /// Identifier of the current process; 0 for idle or during bootstrap.
    pub fn current_pid(&self, table: &ProcessTable) -> u64 {
        match self.cpus[self.current_cpu].current {
            Some(TaskRef::Slot(slot)) => table.get(slot).pid,
            _ => 0,
        }
    }

    /// Resolve a task handle for inspection.
    pub fn task<'a>(&'a self, table: &'a ProcessTable, task: TaskRef) -> &'a Process {
        match task {
            TaskRef::Slot(slot) => table.get(slot),
            TaskRef::Idle(cpu) => &self.cpus[cpu].idle,
        }
    }

    /// Make the bootstrap thread the CPU's idle task. Its registers land in
    /// the idle record on the first handover, so the boot loop *is* the idle
    /// loop from then on.
    pub fn adopt_idle(&mut self) {
        let cpu = self.current_cpu;
        self.cpus[cpu].idle.state = ProcessState::Running;
        self.cpus[cpu].current = Some(TaskRef::Idle(cpu));
    }

    /// Enqueue a process by policy. Idle records are never queued.
    pub fn add(&mut self, table: &mut ProcessTable, slot: usize) {
        let p = table.get_mut(slot);
        match p.policy {
            SchedPolicy::Idle => {
                log::warn!("refusing to enqueue idle-policy process {}", p.pid);
            }
            SchedPolicy::Fifo | SchedPolicy::RoundRobin => {
                p.state = ProcessState::Runnable;
                let prio = p.dynamic_priority;
                assert!(self.rt_queue.push(slot, prio), "rt queue overflow");
            }
            SchedPolicy::Normal => {
                p.state = ProcessState::Runnable;
                let level = p.queue_level.min(NUM_QUEUE_LEVELS - 1);
                p.queue_level = level;
                assert!(self.mlfq[level].push(slot), "mlfq overflow");
            }
        }
    }

    /// Pull the next task: RT queue first, then MLFQ top-down, else idle.
    /// Refreshes the dequeued task's slice for its level.
    fn pick_next(&mut self, table: &mut ProcessTable) -> TaskRef {
        if let Some(slot) = self.rt_queue.pop() {
            let p = table.get_mut(slot);
            if p.policy == SchedPolicy::RoundRobin && p.time_slice == 0 {
                p.time_slice = RT_TIME_SLICE;
            }
            return TaskRef::Slot(slot);
        }

        for level in 0..NUM_QUEUE_LEVELS {
            if let Some(slot) = self.mlfq[level].pop() {
                let p = table.get_mut(slot);
                p.queue_level = level;
                p.time_slice = QUEUE_TIME_SLICES[level];
                return TaskRef::Slot(slot);
            }
        }

        TaskRef::Idle(self.current_cpu)
    }

    /// Timer tick: accounting, slice bookkeeping, starvation boost.
    /// Returns true when the caller should hand the CPU over.
    pub fn tick(&mut self, table: &mut ProcessTable) -> bool {
        let cpu = self.current_cpu;
        self.ticks += 1;
        self.cpus[cpu].ticks += 1;

        let Some(cur) = self.cpus[cpu].current else {
            return false;
        };

        let policy;
        let mut expired = false;
        {
            let p = match cur {
                TaskRef::Slot(slot) => table.get_mut(slot),
                TaskRef::Idle(c) => &mut self.cpus[c].idle,
            };
            p.stats.cpu_time += 1;
            policy = p.policy;

            if matches!(policy, SchedPolicy::Normal | SchedPolicy::RoundRobin) {
                if p.time_slice > 0 {
                    p.time_slice -= 1;
                }
                if p.time_slice == 0 {
                    expired = true;
                    if policy == SchedPolicy::RoundRobin {
                        p.time_slice = RT_TIME_SLICE;
                    }
                }
            }
        }
        if matches!(cur, TaskRef::Idle(_)) {
            self.cpus[cpu].idle_ticks += 1;
        }

        match policy {
            // FIFO runs until it lets go; not even the boost pass runs.
            SchedPolicy::Fifo => false,
            SchedPolicy::RoundRobin => {
                self.maybe_boost(table, cur);
                expired
            }
            SchedPolicy::Normal => {
                // Real-time work preempts a normal process at the tick
                // boundary, slice or no slice.
                let boosted = self.maybe_boost(table, cur);
                expired || boosted || !self.rt_queue.is_empty()
            }
            SchedPolicy::Idle => {
                self.maybe_boost(table, cur);
                !self.rt_queue.is_empty() || self.mlfq.iter().any(|q| !q.is_empty())
            }
        }
    }

    /// Every BOOST_PERIOD ticks, move every normal process back to L0 so low
    /// levels cannot starve. The running process is included: it restarts on
    /// an L0 slice and, when anything was waiting, gets preempted so it
    /// requeues behind the boosted set.
    fn maybe_boost(&mut self, table: &mut ProcessTable, cur: TaskRef) -> bool {
        if self.ticks % BOOST_PERIOD != 0 {
            return false;
        }

        let mut boosted = false;
        for level in 1..NUM_QUEUE_LEVELS {
            while let Some(slot) = self.mlfq[level].pop() {
                let p = table.get_mut(slot);
                if p.policy == SchedPolicy::Normal {
                    p.queue_level = 0;
                    assert!(self.mlfq[0].push(slot), "mlfq overflow during boost");
                    boosted = true;
                }
            }
        }

        if let TaskRef::Slot(slot) = cur {
            let p = table.get_mut(slot);
            if p.policy == SchedPolicy::Normal {
                p.queue_level = 0;
                p.time_slice = QUEUE_TIME_SLICES[0];
                return boosted;
            }
        }
        false
    }

    /// Hand the CPU to the next task.
    ///
    /// Requeues the outgoing task through the normal add path (which encodes
    /// MLFQ demotion), picks a successor, performs switch-in bookkeeping and
    /// page-table installation, and returns the context pair for the
    /// architectural swap. `None` when the current task simply continues.
    pub fn resched(
        &mut self,
        table: &mut ProcessTable,
    ) -> Option<(*mut Context, *const Context)> {
        let cpu = self.current_cpu;
        let old = self.cpus[cpu].current;

        match old {
            Some(TaskRef::Slot(slot)) => {
                let p = table.get_mut(slot);
                if p.state == ProcessState::Running {
                    if p.policy == SchedPolicy::Normal
                        && p.time_slice == 0
                        && p.queue_level < NUM_QUEUE_LEVELS - 1
                    {
                        p.queue_level += 1;
                    }
                    p.state = ProcessState::Runnable;
                    self.add(table, slot);
                }
            }
            Some(TaskRef::Idle(c)) => {
                self.cpus[c].idle.state = ProcessState::Runnable;
            }
            None => {}
        }

        let new = self.pick_next(table);

        if old == Some(new) {
            // Sole runnable task: keep going on the fresh slice.
            let p = match new {
                TaskRef::Slot(slot) => table.get_mut(slot),
                TaskRef::Idle(c) => &mut self.cpus[c].idle,
            };
            p.state = ProcessState::Running;
            return None;
        }

        let ticks = self.ticks;
        let page_table = {
            let p = match new {
                TaskRef::Slot(slot) => table.get_mut(slot),
                TaskRef::Idle(c) => &mut self.cpus[c].idle,
            };
            p.state = ProcessState::Running;
            p.stats.last_run = ticks;
            p.stats.context_switches += 1;
            p.last_cpu = Some(cpu as u8);
            p.page_table
        };
        if let Some(root) = page_table {
            crate::arch::install_page_table(root);
        }
        self.cpus[cpu].current = Some(new);

        let old_ctx: *mut Context = match old {
            None => &mut self.cpus[cpu].boot_context,
            Some(TaskRef::Idle(c)) => &mut self.cpus[c].idle.context,
            Some(TaskRef::Slot(slot)) => &mut table.get_mut(slot).context,
        };
        let new_ctx: *const Context = match new {
            TaskRef::Idle(c) => &self.cpus[c].idle.context,
            TaskRef::Slot(slot) => &table.get(slot).context,
        };
        Some((old_ctx, new_ctx))
    }

    /// Clamp to 0..=139 and update both priorities. A real-time priority
    /// implies the round-robin policy; a normal priority maps onto its MLFQ
    /// level.
    pub fn set_priority(&mut self, table: &mut ProcessTable, slot: usize, priority: u8) {
        let priority = priority.min(PRIORITY_MAX);
        let p = table.get_mut(slot);
        p.priority = priority;
        p.dynamic_priority = priority;

        if priority <= PRIORITY_RT_MAX {
            p.policy = SchedPolicy::RoundRobin;
        } else {
            let range = (PRIORITY_MAX - PRIORITY_NORMAL_MIN + 1) as usize;
            let level =
                (priority - PRIORITY_NORMAL_MIN) as usize * NUM_QUEUE_LEVELS / range;
            p.queue_level = level.min(NUM_QUEUE_LEVELS - 1);
        }
    }

    /// Change policy, fixing up the priority when it falls outside the new
    /// policy's range.
    pub fn set_policy(&mut self, table: &mut ProcessTable, slot: usize, policy: SchedPolicy) {
        let p = table.get_mut(slot);
        p.policy = policy;
        match policy {
            SchedPolicy::Fifo | SchedPolicy::RoundRobin => {
                if p.dynamic_priority > PRIORITY_RT_MAX {
                    p.priority = RT_DEFAULT_PRIORITY;
                    p.dynamic_priority = RT_DEFAULT_PRIORITY;
                }
            }
            SchedPolicy::Idle => {
                p.priority = PRIORITY_MAX;
                p.dynamic_priority = PRIORITY_MAX;
            }
            SchedPolicy::Normal => {
                if p.dynamic_priority < PRIORITY_NORMAL_MIN {
                    p.priority = crate::process::PRIORITY_DEFAULT;
                    p.dynamic_priority = crate::process::PRIORITY_DEFAULT;
                }
            }
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut cpu_ticks = [0; MAX_CPUS];
        let mut idle_ticks = [0; MAX_CPUS];
        for (i, c) in self.cpus.iter().enumerate() {
            cpu_ticks[i] = c.ticks;
            idle_ticks[i] = c.idle_ticks;
        }
        let mut mlfq_queued = [0; NUM_QUEUE_LEVELS];
        for (i, q) in self.mlfq.iter().enumerate() {
            mlfq_queued[i] = q.len();
        }
        SchedulerStats {
            ticks: self.ticks,
            cpu_ticks,
            idle_ticks,
            rt_queued: self.rt_queue.len(),
            mlfq_queued,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    fn fresh() -> (Scheduler, ProcessTable) {
        let mut sched = Scheduler::new();
        sched.init();
        (sched, ProcessTable::new())
    }

    fn spawn(table: &mut ProcessTable, name: &str) -> usize {
        let slot = table.alloc().expect("free slot");
        table.get_mut(slot).set_name(name);
        slot
    }

    #[test]
    fn empty_scheduler_runs_idle() {
        let (mut sched, mut table) = fresh();
        assert!(sched.resched(&mut table).is_some(), "bootstrap handover");
        assert_eq!(sched.current(), Some(TaskRef::Idle(0)));

        sched.tick(&mut table);
        assert_eq!(sched.stats().idle_ticks[0], 1);
    }

    #[test]
    fn rt_task_beats_normal_task() {
        let (mut sched, mut table) = fresh();
        let normal = spawn(&mut table, "normal");
        let rt = spawn(&mut table, "rt");
        sched.set_policy(&mut table, rt, SchedPolicy::RoundRobin);

        sched.add(&mut table, normal);
        sched.add(&mut table, rt);
        sched.resched(&mut table);

        assert_eq!(sched.current(), Some(TaskRef::Slot(rt)));
        assert_eq!(table.get(rt).state, ProcessState::Running);
        assert_eq!(table.get(normal).state, ProcessState::Runnable);
    }

    #[test]
    fn normal_is_preempted_when_rt_arrives() {
        let (mut sched, mut table) = fresh();
        let normal = spawn(&mut table, "normal");
        sched.add(&mut table, normal);
        sched.resched(&mut table);
        assert_eq!(sched.current(), Some(TaskRef::Slot(normal)));

        let rt = spawn(&mut table, "rt");
        sched.set_policy(&mut table, rt, SchedPolicy::RoundRobin);
        sched.add(&mut table, rt);

        assert!(sched.tick(&mut table), "preempt at the next tick");
        sched.resched(&mut table);
        assert_eq!(sched.current(), Some(TaskRef::Slot(rt)));
    }

    #[test]
    fn fifo_ignores_slice_expiry() {
        let (mut sched, mut table) = fresh();
        let fifo = spawn(&mut table, "fifo");
        sched.set_policy(&mut table, fifo, SchedPolicy::Fifo);
        sched.add(&mut table, fifo);
        sched.resched(&mut table);

        for _ in 0..200 {
            assert!(!sched.tick(&mut table));
        }
        assert_eq!(sched.current(), Some(TaskRef::Slot(fifo)));
    }

    #[test]
    fn sole_normal_task_keeps_running_on_expiry() {
        let (mut sched, mut table) = fresh();
        let p = spawn(&mut table, "solo");
        sched.add(&mut table, p);
        sched.resched(&mut table);

        for _ in 0..QUEUE_TIME_SLICES[0] {
            if sched.tick(&mut table) {
                assert!(sched.resched(&mut table).is_none(), "no handover needed");
            }
        }
        assert_eq!(sched.current(), Some(TaskRef::Slot(p)));
        assert_eq!(table.get(p).state, ProcessState::Running);
        assert_eq!(table.get(p).queue_level, 1, "expiry still demotes");
    }

    #[test]
    fn set_priority_clamps_and_maps() {
        let (mut sched, mut table) = fresh();
        let p = spawn(&mut table, "p");

        sched.set_priority(&mut table, p, 200);
        assert_eq!(table.get(p).priority, PRIORITY_MAX);

        sched.set_priority(&mut table, p, 100);
        assert_eq!(table.get(p).queue_level, 0);
        sched.set_priority(&mut table, p, 120);
        assert_eq!(table.get(p).queue_level, 1);
        sched.set_priority(&mut table, p, 139);
        assert_eq!(table.get(p).queue_level, NUM_QUEUE_LEVELS - 1);

        sched.set_priority(&mut table, p, 30);
        assert_eq!(table.get(p).policy, SchedPolicy::RoundRobin);
    }

    #[test]
    fn set_policy_fixes_out_of_range_priorities() {
        let (mut sched, mut table) = fresh();
        let p = spawn(&mut table, "p");

        sched.set_policy(&mut table, p, SchedPolicy::Fifo);
        assert_eq!(table.get(p).dynamic_priority, 50);

        sched.set_policy(&mut table, p, SchedPolicy::Idle);
        assert_eq!(table.get(p).dynamic_priority, PRIORITY_MAX);
    }

    #[test]
    fn context_switch_counts_switch_ins() {
        let (mut sched, mut table) = fresh();
        let a = spawn(&mut table, "a");
        let b = spawn(&mut table, "b");
        sched.add(&mut table, a);
        sched.add(&mut table, b);

        sched.resched(&mut table); // in: a
        sched.resched(&mut table); // in: b, a requeued
        sched.resched(&mut table); // in: a again

        assert_eq!(table.get(a).stats.context_switches, 2);
        assert_eq!(table.get(b).stats.context_switches, 1);
    }
}
