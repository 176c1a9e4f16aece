//! Process table
//!
//! Fixed array of 64 slots plus a monotonic pid counter. Slots are reused
//! after free; identifiers are not.

use spin::Mutex;

use super::{ProcStats, Process, ProcessState, SchedPolicy, PRIORITY_DEFAULT};
use crate::arch::context::Context;

/// Number of process slots
pub const MAX_PROCESSES: usize = 64;

pub struct ProcessTable {
    slots: [Process; MAX_PROCESSES],
    next_pid: u64,
}

impl ProcessTable {
    pub const fn new() -> Self {
        Self {
            slots: [const { Process::empty() }; MAX_PROCESSES],
            next_pid: 1,
        }
    }

    /// Claim the first unused slot, assign a fresh pid, and reset every
    /// field to its default. Returns the slot index.
    pub fn alloc(&mut self) -> Option<usize> {
        let slot = self
            .slots
            .iter()
            .position(|p| p.state == ProcessState::Unused)?;

        let p = &mut self.slots[slot];
        *p = Process::empty();
        p.pid = self.next_pid;
        self.next_pid += 1;
        p.state = ProcessState::Runnable;
        p.priority = PRIORITY_DEFAULT;
        p.dynamic_priority = PRIORITY_DEFAULT;
        p.policy = SchedPolicy::Normal;
        p.cpu_affinity = u64::MAX;

        Some(slot)
    }

    /// Release a slot. The pid is retired, not recycled.
    pub fn free(&mut self, slot: usize) {
        let p = &mut self.slots[slot];
        p.pid = 0;
        p.state = ProcessState::Unused;
        p.context = Context::zeroed();
        p.page_table = None;
        p.queue_level = 0;
        p.time_slice = 0;
        p.last_cpu = None;
        p.stats = ProcStats::zeroed();
    }

    pub fn get(&self, slot: usize) -> &Process {
        &self.slots[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut Process {
        &mut self.slots[slot]
    }

    /// Slot index of the process with the given pid, if it is live.
    pub fn find_pid(&self, pid: u64) -> Option<usize> {
        self.slots
            .iter()
            .position(|p| p.pid == pid && p.state != ProcessState::Unused)
    }

    /// Iterate over live slots.
    pub fn iter_live(&self) -> impl Iterator<Item = (usize, &Process)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state != ProcessState::Unused)
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Global process table instance
pub static PROCESS_TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());

#[cfg(all(test, not(target_os = "none")))]
mod tests {
    use super::*;

    #[test]
    fn pids_are_monotonic_and_never_reused() {
        let mut t = ProcessTable::new();
        let a = t.alloc().expect("first slot");
        let b = t.alloc().expect("second slot");
        assert_eq!(t.get(a).pid, 1);
        assert_eq!(t.get(b).pid, 2);

        t.free(a);
        let c = t.alloc().expect("slot reuse");
        assert_eq!(c, a, "slot is reused");
        assert_eq!(t.get(c).pid, 3, "pid is not");
    }

    #[test]
    fn alloc_applies_defaults() {
        let mut t = ProcessTable::new();
        let slot = t.alloc().expect("slot");
        let p = t.get(slot);
        assert_eq!(p.state, ProcessState::Runnable);
        assert_eq!(p.priority, PRIORITY_DEFAULT);
        assert_eq!(p.dynamic_priority, PRIORITY_DEFAULT);
        assert_eq!(p.policy, SchedPolicy::Normal);
        assert_eq!(p.queue_level, 0);
        assert_eq!(p.time_slice, 0);
        assert_eq!(p.cpu_affinity, u64::MAX);
        assert_eq!(p.stats.cpu_time, 0);
    }

    #[test]
    fn table_exhaustion_returns_none() {
        let mut t = ProcessTable::new();
        for _ in 0..MAX_PROCESSES {
            assert!(t.alloc().is_some());
        }
        assert!(t.alloc().is_none());

        t.free(17);
        assert_eq!(t.alloc(), Some(17));
    }

    #[test]
    fn find_pid_sees_only_live_slots() {
        let mut t = ProcessTable::new();
        let a = t.alloc().expect("slot");
        let pid = t.get(a).pid;
        assert_eq!(t.find_pid(pid), Some(a));

        t.free(a);
        assert_eq!(t.find_pid(pid), None);
        assert_eq!(t.iter_live().count(), 0);
    }
}
