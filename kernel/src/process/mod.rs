//! # Process Management Module
//!
//! This module provides the process descriptor and its lifecycle bookkeeping.
//!
//! ## Submodules
//!
//! - `table`: Fixed-capacity descriptor table (slot arena)
//! - `wait`: Process exit and wait (child reaping)
//!
//! ## Core Types
//!
//! - `Process`: Process descriptor with scheduling counters and identity
//! - `ProcState`: Lifecycle states, from Unused through Zombie
//! - `ProcFlags`: Out-of-band marks (pinned to the floor level, killed)
//!
//! ## Scheduling Counters
//!
//! Each descriptor carries four counters the scheduler reads and resets:
//!
//! - `cpu_burst`: ticks consumed in the current level (quantum accounting)
//! - `cpu_wait`: ticks spent Runnable without the CPU (aging)
//! - `io_wait_time`: ticks spent Sleeping (selection order within a level)
//! - `stack_cpu_burst`: lifetime ticks consumed, never reset (budget accounting)
//!
//! The first three are zeroed whenever the process changes level; the last
//! survives every relocation so an absolute CPU budget (`end_time`) can be
//! enforced against it.

pub mod table;
pub mod wait;

use alloc::string::String;

use bitflags::bitflags;

use crate::sched::ProcessId;

/// Maximum number of processes resident at once.
pub const MAX_PROCESSES: usize = 64;

/// Sentinel for `end_time`: the process has no CPU budget.
pub const NO_BUDGET: i64 = -1;

bitflags! {
    /// Out-of-band per-process marks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProcFlags: u8 {
        /// Bootstrap process: lives at the floor level forever, exempt
        /// from aging and demotion.
        const PINNED = 1 << 0;
        /// Marked for termination; realized as an exit at the next tick
        /// boundary the process reaches.
        const KILLED = 1 << 1;
    }
}

/// Process lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Slot is free
    Unused,
    /// Being constructed, not yet visible to the dispatcher
    Embryo,
    /// Waiting on an event; accumulates `io_wait_time`
    Sleeping,
    /// Ready for the CPU; accumulates `cpu_wait`
    Runnable,
    /// On a CPU; accumulates `cpu_burst` and `stack_cpu_burst`
    Running,
    /// Exited, awaiting reap by the parent
    Zombie,
}

/// Process descriptor.
///
/// Descriptors live in fixed slots of the [`table::ProcessTable`] and never
/// move while resident; queues refer to them by slot index.
#[derive(Debug, Clone)]
pub struct Process {
    /// Unique process ID
    pub pid: ProcessId,
    /// Process name (for diagnostics)
    pub name: String,
    /// Parent process ID
    pub parent: ProcessId,
    /// Current state
    pub state: ProcState,
    /// Out-of-band marks
    pub flags: ProcFlags,
    /// Feedback-queue level this process is enqueued at (0 = highest)
    pub queue_level: usize,
    /// Priority hint installed by `configure`; carried, not acted on
    pub priority: u8,
    /// Ticks consumed at the current level
    pub cpu_burst: u32,
    /// Ticks spent Runnable without the CPU
    pub cpu_wait: u32,
    /// Ticks spent Sleeping
    pub io_wait_time: u32,
    /// Lifetime ticks consumed; never reset
    pub stack_cpu_burst: u64,
    /// Absolute CPU budget in ticks, or [`NO_BUDGET`]
    pub end_time: i64,
    /// Exit code (set when the process becomes a Zombie)
    pub exit_code: Option<i32>,
}

impl Process {
    /// Creates a fresh descriptor in the Embryo state at level 0.
    pub fn new(pid: ProcessId, name: String, parent: ProcessId) -> Self {
        Self {
            pid,
            name,
            parent,
            state: ProcState::Embryo,
            flags: ProcFlags::empty(),
            queue_level: 0,
            priority: 0,
            cpu_burst: 0,
            cpu_wait: 0,
            io_wait_time: 0,
            stack_cpu_burst: 0,
            end_time: NO_BUDGET,
            exit_code: None,
        }
    }

    /// Zeroes the per-level counters. Called on every level change;
    /// `stack_cpu_burst` is deliberately left alone.
    pub fn reset_level_counters(&mut self) {
        self.cpu_burst = 0;
        self.cpu_wait = 0;
        self.io_wait_time = 0;
    }

    /// True if this process is exempt from aging and demotion.
    pub fn is_pinned(&self) -> bool {
        self.flags.contains(ProcFlags::PINNED)
    }

    /// True if an absolute CPU budget is installed.
    pub fn has_budget(&self) -> bool {
        self.end_time > 0
    }

    /// True once the installed budget is fully consumed.
    pub fn budget_exhausted(&self) -> bool {
        self.has_budget() && self.stack_cpu_burst >= self.end_time as u64
    }

    /// True for states the tick accountant counts and queues carry.
    pub fn is_resident(&self) -> bool {
        !matches!(self.state, ProcState::Unused)
    }
}

// ===== Tests =====
