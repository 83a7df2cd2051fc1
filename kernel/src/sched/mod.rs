//! # Multilevel Feedback Queue Scheduler
//!
//! The Tern scheduler provides deterministic, preemptive MLFQ scheduling.
//!
//! ## Key Properties
//!
//! 1. **Determinism**: Same tick history produces the same dispatch order
//! 2. **Feedback**: CPU-bound processes drift down, starved ones drift up
//! 3. **Recency bias**: Within a level, the longest sleeper runs first
//! 4. **Budget enforcement**: A process never runs past its absolute CPU budget
//!
//! ## Levels
//!
//! - **Level 0**: Highest priority, 10-tick quantum
//! - **Level 1**: 20-tick quantum
//! - **Level 2**: 40-tick quantum
//! - **Level 3**: Round-robin floor, 80-tick quantum; pinned bootstrap
//!   processes live here permanently
//!
//! A process that exhausts its quantum is demoted one level. A process that
//! accumulates 250 ticks of CPU wait is promoted one level. Both moves zero
//! the per-level counters.
//!
//! ## Locking
//!
//! One [`spin::Mutex`] guards the whole scheduler state: the descriptor
//! table, the level queues, the per-CPU current array and the tick counter.
//! Every counter, queue, and state mutation happens under it; no path takes
//! a second lock, so there is no ordering to get wrong.

use alloc::string::String;
use alloc::vec::Vec;

use spin::{Lazy, Mutex};

use crate::process::table::{ProcessTable, SlotId};
use crate::process::{ProcFlags, ProcState, Process, NO_BUDGET};

pub mod dispatch;
pub mod queue;
pub mod tick;

pub use dispatch::CpuContext;
pub use queue::{LevelQueues, FLOOR_LEVEL, NUM_LEVELS};
pub use tick::{TickAction, AGING_THRESHOLD, QUANTA};

/// Process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u64);

impl ProcessId {
    /// The kernel's own process ID, parent of the bootstrap processes.
    pub const KERNEL: Self = Self(0);

    /// Creates a new process ID.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// CPU identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CpuId(pub u32);

impl CpuId {
    /// The bootstrap CPU. Global tick accounting runs on its timer.
    pub const BSP: Self = Self(0);

    /// Creates a CPU ID.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the index for per-CPU arrays.
    pub const fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// Maximum number of CPUs running dispatcher loops.
pub const MAX_CPUS: usize = 8;

/// Recoverable scheduler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// The process table has no free slot
    TableFull,
    /// No resident process has the given pid
    NotFound,
    /// Queue level outside 0..NUM_LEVELS
    InvalidLevel,
    /// CPU budget is neither positive nor the no-budget sentinel
    InvalidBudget,
    /// The process is not in a state the operation applies to
    NotSchedulable,
}

/// Snapshot of one process's scheduling bookkeeping.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub name: String,
    pub parent: ProcessId,
    pub state: ProcState,
    pub flags: ProcFlags,
    pub queue_level: usize,
    pub priority: u8,
    pub cpu_burst: u32,
    pub cpu_wait: u32,
    pub io_wait_time: u32,
    pub stack_cpu_burst: u64,
    pub end_time: i64,
    pub exit_code: Option<i32>,
}

impl ProcessInfo {
    fn snapshot(p: &Process) -> Self {
        Self {
            pid: p.pid,
            name: p.name.clone(),
            parent: p.parent,
            state: p.state,
            flags: p.flags,
            queue_level: p.queue_level,
            priority: p.priority,
            cpu_burst: p.cpu_burst,
            cpu_wait: p.cpu_wait,
            io_wait_time: p.io_wait_time,
            stack_cpu_burst: p.stack_cpu_burst,
            end_time: p.end_time,
            exit_code: p.exit_code,
        }
    }
}

/// Everything the scheduler lock protects.
pub(crate) struct SchedState {
    pub(crate) table: ProcessTable,
    pub(crate) queues: LevelQueues,
    /// Slot currently running on each CPU.
    pub(crate) running: [Option<SlotId>; MAX_CPUS],
    /// Global tick counter, advanced by the bootstrap CPU.
    pub(crate) ticks: u64,
    /// Reap fallback: orphaned children are reparented here.
    pub(crate) init: Option<ProcessId>,
}

impl SchedState {
    fn new() -> Self {
        Self {
            table: ProcessTable::new(),
            queues: LevelQueues::new(),
            running: [None; MAX_CPUS],
            ticks: 0,
            init: None,
        }
    }

    /// Moves a resident process to `level`, zeroing its per-level counters.
    ///
    /// The process must be in its current level's queue; a missing entry is
    /// a corrupted index and fatal.
    pub(crate) fn relocate(&mut self, slot: SlotId, level: usize) {
        let removed = self.queues.remove(&self.table, slot);
        assert!(removed, "relocating a process absent from its level queue");
        self.table
            .get_mut(slot)
            .expect("relocating a freed slot")
            .reset_level_counters();
        self.queues.insert(&mut self.table, slot, level);
    }

    /// Clears any per-CPU current entry pointing at `slot`.
    pub(crate) fn clear_running(&mut self, slot: SlotId) {
        for entry in self.running.iter_mut() {
            if *entry == Some(slot) {
                *entry = None;
            }
        }
    }
}

/// The MLFQ scheduler.
pub struct Scheduler {
    pub(crate) state: Mutex<SchedState>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedState::new()),
        }
    }

    /// Admits a new process.
    ///
    /// The descriptor starts as an Embryo at level 0 with zeroed counters
    /// and no CPU budget, already enqueued so the first `make_runnable`
    /// makes it immediately selectable. Pinned processes go to the floor
    /// level instead and never leave it.
    pub fn create(
        &self,
        name: &str,
        parent: ProcessId,
        pinned: bool,
    ) -> Result<ProcessId, SchedError> {
        let mut state = self.state.lock();
        let slot = state.table.allocate(String::from(name), parent)?;
        let level = if pinned {
            let p = state.table.get_mut(slot).expect("slot just allocated");
            p.flags.insert(ProcFlags::PINNED);
            FLOOR_LEVEL
        } else {
            0
        };
        let SchedState { table, queues, .. } = &mut *state;
        queues.insert(table, slot, level);
        let pid = table.get(slot).expect("slot just allocated").pid;
        log::debug!("created process {} ({:?}) at level {}", name, pid, level);
        Ok(pid)
    }

    /// Makes an Embryo visible to the dispatcher.
    pub fn make_runnable(&self, pid: ProcessId) -> Result<(), SchedError> {
        let mut state = self.state.lock();
        let slot = state.table.slot_of(pid).ok_or(SchedError::NotFound)?;
        let p = state.table.get_mut(slot).expect("slot just looked up");
        if p.state != ProcState::Embryo {
            return Err(SchedError::NotSchedulable);
        }
        p.state = ProcState::Runnable;
        Ok(())
    }

    /// Installs scheduling parameters: relocates the process to `level`
    /// (zeroing its per-level counters), records `priority`, and sets the
    /// absolute CPU budget `end_time` (ticks; 0 or [`NO_BUDGET`] clears it).
    ///
    /// Returns the level the process was at before the call.
    pub fn configure(
        &self,
        pid: ProcessId,
        level: usize,
        priority: u8,
        end_time: i64,
    ) -> Result<usize, SchedError> {
        if level >= NUM_LEVELS {
            return Err(SchedError::InvalidLevel);
        }
        if end_time < NO_BUDGET {
            return Err(SchedError::InvalidBudget);
        }
        let mut state = self.state.lock();
        let slot = state.table.slot_of(pid).ok_or(SchedError::NotFound)?;
        let p = state.table.get(slot).expect("slot just looked up");
        if matches!(p.state, ProcState::Unused | ProcState::Zombie) {
            return Err(SchedError::NotSchedulable);
        }
        let previous = p.queue_level;
        state.relocate(slot, level);
        let p = state.table.get_mut(slot).expect("slot just relocated");
        p.priority = priority;
        p.end_time = if end_time > 0 { end_time } else { NO_BUDGET };
        log::debug!(
            "configured {:?}: level {} -> {}, end_time {}",
            pid,
            previous,
            level,
            p.end_time
        );
        Ok(previous)
    }

    /// Puts a Runnable or Running process to sleep. Queue membership
    /// persists; only the state (and the CPU's current entry) changes.
    pub fn sleep(&self, pid: ProcessId) -> Result<(), SchedError> {
        let mut state = self.state.lock();
        let slot = state.table.slot_of(pid).ok_or(SchedError::NotFound)?;
        let p = state.table.get_mut(slot).expect("slot just looked up");
        match p.state {
            ProcState::Running => {
                p.state = ProcState::Sleeping;
                state.clear_running(slot);
            }
            ProcState::Runnable => p.state = ProcState::Sleeping,
            _ => return Err(SchedError::NotSchedulable),
        }
        Ok(())
    }

    /// Wakes a Sleeping process. A no-op for any other state.
    pub fn wake(&self, pid: ProcessId) -> Result<(), SchedError> {
        let mut state = self.state.lock();
        let slot = state.table.slot_of(pid).ok_or(SchedError::NotFound)?;
        let p = state.table.get_mut(slot).expect("slot just looked up");
        if p.state == ProcState::Sleeping {
            p.state = ProcState::Runnable;
        }
        Ok(())
    }

    /// Marks a process for termination. A Sleeping target is made Runnable
    /// so it reaches a tick boundary; the actual exit happens there.
    pub fn kill(&self, pid: ProcessId) -> Result<(), SchedError> {
        let mut state = self.state.lock();
        let slot = state.table.slot_of(pid).ok_or(SchedError::NotFound)?;
        let p = state.table.get_mut(slot).expect("slot just looked up");
        p.flags.insert(ProcFlags::KILLED);
        if p.state == ProcState::Sleeping {
            p.state = ProcState::Runnable;
        }
        Ok(())
    }

    /// Voluntarily gives up the CPU: the process running on `cpu` becomes
    /// Runnable again. A no-op when the CPU is idle.
    pub fn yield_cpu(&self, cpu: CpuId) {
        let mut state = self.state.lock();
        let Some(slot) = state.running[cpu.as_index()] else {
            return;
        };
        let p = state.table.get_mut(slot).expect("running slot is occupied");
        assert_eq!(p.state, ProcState::Running, "current process not Running");
        p.state = ProcState::Runnable;
        state.running[cpu.as_index()] = None;
    }

    /// Runs the tick accountant. See [`tick`] for the phase ordering and
    /// the meaning of the returned action.
    pub fn timer_tick(&self, cpu: CpuId) -> TickAction {
        let mut state = self.state.lock();
        tick::account(&mut state, cpu)
    }

    /// Records `pid` as the reap fallback for orphaned children.
    pub fn set_init_process(&self, pid: ProcessId) -> Result<(), SchedError> {
        let mut state = self.state.lock();
        if state.table.slot_of(pid).is_none() {
            return Err(SchedError::NotFound);
        }
        state.init = Some(pid);
        Ok(())
    }

    /// The process currently on `cpu`, if any.
    pub fn current(&self, cpu: CpuId) -> Option<ProcessId> {
        let state = self.state.lock();
        let slot = state.running[cpu.as_index()]?;
        state.table.get(slot).map(|p| p.pid)
    }

    /// Global tick count.
    pub fn ticks(&self) -> u64 {
        self.state.lock().ticks
    }

    /// Number of resident processes.
    pub fn process_count(&self) -> usize {
        self.state.lock().table.len()
    }

    /// Snapshot of one process's bookkeeping.
    pub fn process_info(&self, pid: ProcessId) -> Option<ProcessInfo> {
        let state = self.state.lock();
        let slot = state.table.slot_of(pid)?;
        state.table.get(slot).map(ProcessInfo::snapshot)
    }

    /// Snapshots of every resident process, in slot order.
    pub fn list_processes(&self) -> Vec<ProcessInfo> {
        let state = self.state.lock();
        state
            .table
            .iter()
            .map(|(_, p)| ProcessInfo::snapshot(p))
            .collect()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Global scheduler instance.
static SCHEDULER: Lazy<Scheduler> = Lazy::new(Scheduler::new);

/// Gets the global scheduler.
pub fn scheduler() -> &'static Scheduler {
    &SCHEDULER
}

// ===== Tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_starts_embryo_at_level_zero() {
        let sched = Scheduler::new();
        let pid = sched.create("worker", ProcessId::KERNEL, false).unwrap();
        let info = sched.process_info(pid).unwrap();
        assert_eq!(info.state, ProcState::Embryo);
        assert_eq!(info.queue_level, 0);
        assert_eq!(info.end_time, NO_BUDGET);
        assert!(!info.flags.contains(ProcFlags::PINNED));
    }

    #[test]
    fn test_pinned_process_lands_on_floor_level() {
        let sched = Scheduler::new();
        let pid = sched.create("shell", ProcessId::KERNEL, true).unwrap();
        let info = sched.process_info(pid).unwrap();
        assert_eq!(info.queue_level, FLOOR_LEVEL);
        assert!(info.flags.contains(ProcFlags::PINNED));
    }

    #[test]
    fn test_make_runnable_requires_embryo() {
        let sched = Scheduler::new();
        let pid = sched.create("worker", ProcessId::KERNEL, false).unwrap();
        sched.make_runnable(pid).unwrap();
        assert_eq!(
            sched.make_runnable(pid),
            Err(SchedError::NotSchedulable)
        );
        assert_eq!(
            sched.make_runnable(ProcessId(999)),
            Err(SchedError::NotFound)
        );
    }

    #[test]
    fn test_configure_moves_level_and_reports_previous() {
        let sched = Scheduler::new();
        let pid = sched.create("batch", ProcessId::KERNEL, false).unwrap();
        sched.make_runnable(pid).unwrap();
        assert_eq!(sched.configure(pid, 2, 0, 300), Ok(0));
        let info = sched.process_info(pid).unwrap();
        assert_eq!(info.queue_level, 2);
        assert_eq!(info.end_time, 300);
        assert_eq!(sched.configure(pid, 1, 0, 0), Ok(2));
        assert_eq!(sched.process_info(pid).unwrap().end_time, NO_BUDGET);
    }

    #[test]
    fn test_configure_resets_level_counters_but_not_lifetime_burst() {
        let sched = Scheduler::new();
        let pid = sched.create("batch", ProcessId::KERNEL, false).unwrap();
        sched.make_runnable(pid).unwrap();
        {
            let mut state = sched.state.lock();
            let slot = state.table.slot_of(pid).unwrap();
            let p = state.table.get_mut(slot).unwrap();
            p.cpu_burst = 7;
            p.cpu_wait = 30;
            p.io_wait_time = 4;
            p.stack_cpu_burst = 90;
        }
        sched.configure(pid, 1, 0, 300).unwrap();
        let info = sched.process_info(pid).unwrap();
        assert_eq!(info.cpu_burst, 0);
        assert_eq!(info.cpu_wait, 0);
        assert_eq!(info.io_wait_time, 0);
        assert_eq!(info.stack_cpu_burst, 90);
    }

    #[test]
    fn test_configure_rejects_bad_arguments() {
        let sched = Scheduler::new();
        let pid = sched.create("p", ProcessId::KERNEL, false).unwrap();
        assert_eq!(
            sched.configure(pid, NUM_LEVELS, 0, 100),
            Err(SchedError::InvalidLevel)
        );
        assert_eq!(
            sched.configure(pid, 0, 0, -2),
            Err(SchedError::InvalidBudget)
        );
        assert_eq!(
            sched.configure(ProcessId(999), 0, 0, 100),
            Err(SchedError::NotFound)
        );
    }

    #[test]
    fn test_sleep_and_wake_roundtrip() {
        let sched = Scheduler::new();
        let pid = sched.create("io", ProcessId::KERNEL, false).unwrap();
        sched.make_runnable(pid).unwrap();
        sched.sleep(pid).unwrap();
        assert_eq!(sched.process_info(pid).unwrap().state, ProcState::Sleeping);
        sched.wake(pid).unwrap();
        assert_eq!(sched.process_info(pid).unwrap().state, ProcState::Runnable);
        // waking a non-sleeper is a no-op
        sched.wake(pid).unwrap();
        assert_eq!(sched.process_info(pid).unwrap().state, ProcState::Runnable);
    }

    #[test]
    fn test_kill_wakes_sleeper() {
        let sched = Scheduler::new();
        let pid = sched.create("victim", ProcessId::KERNEL, false).unwrap();
        sched.make_runnable(pid).unwrap();
        sched.sleep(pid).unwrap();
        sched.kill(pid).unwrap();
        let info = sched.process_info(pid).unwrap();
        assert_eq!(info.state, ProcState::Runnable);
        assert!(info.flags.contains(ProcFlags::KILLED));
    }
}
