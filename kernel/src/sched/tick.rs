//! # Tick Accountant
//!
//! One call per timer interrupt drives the whole policy. The work splits
//! into two strictly ordered phases, both under the scheduler lock:
//!
//! 1. **Counting**: every resident descriptor receives exactly one
//!    increment chosen by its state (Runnable advances `cpu_wait`,
//!    Sleeping advances `io_wait_time`, Running advances `cpu_burst` and
//!    `stack_cpu_burst`). Unused, Embryo and Zombie descriptors are
//!    skipped.
//! 2. **Policy**: any unpinned process above level 0 whose `cpu_wait` has
//!    reached [`AGING_THRESHOLD`] is promoted one level, with its
//!    per-level counters zeroed.
//!
//! Counting and promotion run on the bootstrap CPU's tick only, so each
//! global tick increments each counter exactly once no matter how many
//! CPUs are dispatching. Every CPU's tick then evaluates its own current
//! process and reports a [`TickAction`]; the interrupt path realizes the
//! action at the next safe boundary (`Preempt` as a yield, `Terminate` as
//! an exit).
//!
//! Counters are not overflow-checked; at one tick per interrupt they would
//! take centuries to wrap.

use alloc::vec::Vec;

use crate::process::table::SlotId;
use crate::process::{ProcFlags, ProcState};

use super::{CpuId, SchedState, NUM_LEVELS};

/// Time quantum per level, in ticks.
pub const QUANTA: [u32; NUM_LEVELS] = [10, 20, 40, 80];

/// CPU-wait ticks after which a process is promoted one level.
pub const AGING_THRESHOLD: u32 = 250;

/// What the interrupt path should do with the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Keep running; neither quantum nor budget is spent
    Continue,
    /// Quantum exhausted; yield at the next safe boundary
    Preempt,
    /// Budget exhausted or killed; exit at the next safe boundary
    Terminate,
}

/// Runs one tick. Called with the scheduler lock held.
pub(crate) fn account(state: &mut SchedState, cpu: CpuId) -> TickAction {
    if cpu == CpuId::BSP {
        state.ticks += 1;
        count_tick(state);
        age(state);
    }
    evaluate_current(state, cpu)
}

/// Phase 1: one increment per resident descriptor.
fn count_tick(state: &mut SchedState) {
    for i in 0..state.table.capacity() {
        if let Some(p) = state.table.get_mut(SlotId(i)) {
            match p.state {
                ProcState::Runnable => p.cpu_wait += 1,
                ProcState::Sleeping => p.io_wait_time += 1,
                ProcState::Running => {
                    p.cpu_burst += 1;
                    p.stack_cpu_burst += 1;
                }
                ProcState::Unused | ProcState::Embryo | ProcState::Zombie => {}
            }
        }
    }
}

/// Phase 2: aging promotion.
fn age(state: &mut SchedState) {
    let starved: Vec<SlotId> = state
        .table
        .iter()
        .filter(|&(_, p)| {
            !p.is_pinned()
                && p.queue_level > 0
                && p.cpu_wait >= AGING_THRESHOLD
                && matches!(
                    p.state,
                    ProcState::Runnable | ProcState::Sleeping | ProcState::Running
                )
        })
        .map(|(slot, _)| slot)
        .collect();
    for slot in starved {
        let (pid, level) = {
            let p = state.table.get(slot).expect("starved slot vanished");
            (p.pid, p.queue_level)
        };
        state.relocate(slot, level - 1);
        log::debug!("aged {:?}: level {} -> {}", pid, level, level - 1);
    }
}

/// Evaluates the process running on `cpu`.
fn evaluate_current(state: &SchedState, cpu: CpuId) -> TickAction {
    let Some(slot) = state.running[cpu.as_index()] else {
        return TickAction::Continue;
    };
    let p = state.table.get(slot).expect("current slot is occupied");
    assert_eq!(p.state, ProcState::Running, "current process not Running");
    if p.flags.contains(ProcFlags::KILLED) {
        return TickAction::Terminate;
    }
    if p.budget_exhausted() {
        log::debug!(
            "{:?} hit CPU budget {} (consumed {})",
            p.pid,
            p.end_time,
            p.stack_cpu_burst
        );
        return TickAction::Terminate;
    }
    if p.cpu_burst >= QUANTA[p.queue_level] {
        TickAction::Preempt
    } else {
        TickAction::Continue
    }
}

// ===== Tests =====
