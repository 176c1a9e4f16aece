//! Process model
//!
//! Fixed-size process records with saved callee-save context, scheduling
//! fields, and accounting counters. Records live in the process table
//! ([`table::ProcessTable`]); everything else refers to them by slot index.

pub mod elf;
pub mod table;

pub use table::{ProcessTable, MAX_PROCESSES, PROCESS_TABLE};

use crate::arch::context::Context;
use crate::mm::PhysAddr;

/// Process name capacity (31 bytes + NUL)
pub const NAME_LEN: usize = 32;

/// Priority space: 0..=139, lower is higher priority.
pub const PRIORITY_MIN: u8 = 0;
/// Highest numeric real-time priority
pub const PRIORITY_RT_MAX: u8 = 99;
/// Lowest numeric normal priority
pub const PRIORITY_NORMAL_MIN: u8 = 100;
/// Default priority for fresh processes
pub const PRIORITY_DEFAULT: u8 = 120;
/// Numeric floor of the priority space (idle)
pub const PRIORITY_MAX: u8 = 139;

/// Process lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unused,
    Runnable,
    Running,
    Sleeping,
    Zombie,
}

/// Scheduling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// MLFQ, preemptive, slice-driven
    Normal,
    /// Real-time, runs until voluntary yield or block
    Fifo,
    /// Real-time, preemptive at a fixed slice
    RoundRobin,
    /// Runs only when both ready queues are empty; never enqueued
    Idle,
}

impl SchedPolicy {
    pub fn is_realtime(&self) -> bool {
        matches!(self, SchedPolicy::Fifo | SchedPolicy::RoundRobin)
    }
}

/// Per-process accounting
#[derive(Debug, Clone, Copy)]
pub struct ProcStats {
    /// Ticks spent as the running process
    pub cpu_time: u64,
    /// Times this process was switched in
    pub context_switches: u64,
    /// Tick at which the record was allocated
    pub start_time: u64,
    /// Tick of the most recent dispatch
    pub last_run: u64,
}

impl ProcStats {
    pub const fn zeroed() -> Self {
        Self {
            cpu_time: 0,
            context_switches: 0,
            start_time: 0,
            last_run: 0,
        }
    }
}

/// One process record
#[derive(Debug, Clone)]
pub struct Process {
    /// Monotonic identifier; never reused within a run
    pub pid: u64,
    pub state: ProcessState,
    name: [u8; NAME_LEN],
    /// Saved callee-save register file
    pub context: Context,
    pub kernel_sp: usize,
    pub user_sp: usize,
    /// Root page-table node, or None for kernel-only tasks and idle
    pub page_table: Option<PhysAddr>,
    /// Static priority, 0..=139
    pub priority: u8,
    /// Priority the scheduler currently acts on
    pub dynamic_priority: u8,
    pub policy: SchedPolicy,
    /// Current MLFQ level (Normal policy only)
    pub queue_level: usize,
    /// Remaining ticks of the current slice
    pub time_slice: u64,
    /// CPU this process last ran on
    pub last_cpu: Option<u8>,
    /// Bit N set = may run on CPU N
    pub cpu_affinity: u64,
    pub stats: ProcStats,
}

impl Process {
    pub const fn empty() -> Self {
        Self {
            pid: 0,
            state: ProcessState::Unused,
            name: [0; NAME_LEN],
            context: Context::zeroed(),
            kernel_sp: 0,
            user_sp: 0,
            page_table: None,
            priority: PRIORITY_DEFAULT,
            dynamic_priority: PRIORITY_DEFAULT,
            policy: SchedPolicy::Normal,
            queue_level: 0,
            time_slice: 0,
            last_cpu: None,
            cpu_affinity: u64::MAX,
            stats: ProcStats::zeroed(),
        }
    }

    /// Copy `name` in, truncated to 31 bytes.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_LEN];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_LEN - 1);
        self.name[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }

    /// Prime the saved context so the first switch into this process enters
    /// `entry` on `stack_top`. The saved registers start zeroed.
    pub fn setup_context(&mut self, entry: usize, stack_top: usize) {
        self.context = Context::zeroed();
        self.context.ra = entry;
        self.context.sp = stack_top;
        self.kernel_sp = stack_top;
    }
}
