//! # Dispatcher
//!
//! Each CPU runs a dispatcher loop. One sweep walks the levels from 0 to
//! the floor; at each level it selects the best Runnable candidate, runs it
//! through the [`CpuContext`] capability, and applies the feedback move on
//! return. After any dispatch, if a level above the floor has entries, the
//! sweep restarts from level 0 so high-priority work is never outwaited by
//! the floor.
//!
//! ## Selection
//!
//! Within a level the winner maximizes, in order: higher `io_wait_time`,
//! then lower `cpu_wait`, then higher pid. Longest sleepers go first; among
//! equally rested candidates the one that waited *least* wins, which biases
//! toward processes that just arrived or were just promoted.
//!
//! ## Locking
//!
//! The scheduler lock is held during selection (marking the winner Running
//! so no other CPU can take it) and during the post-run feedback move, but
//! never across `run_until_yield`.

use crate::process::table::SlotId;
use crate::process::ProcState;

use super::{CpuId, ProcessId, SchedState, Scheduler, FLOOR_LEVEL, NUM_LEVELS};

/// Capability for entering and leaving a process's execution context.
///
/// The scheduling core never touches registers or interrupt hardware; the
/// platform supplies this trait instead.
pub trait CpuContext {
    /// Switches to `pid` and returns once the process has been switched
    /// out again, i.e. after it yielded, slept, or exited. The scheduler
    /// lock is not held across this call.
    fn run_until_yield(&mut self, pid: ProcessId);

    /// Nothing is runnable: wait, with interrupts enabled, until the next
    /// event.
    fn idle(&mut self);
}

/// Selects the best Runnable candidate at `level`, if any.
fn select_at(state: &SchedState, level: usize) -> Option<SlotId> {
    let mut best: Option<(SlotId, u32, u32, u64)> = None;
    for slot in state.queues.iter_level(level) {
        let p = state
            .table
            .get(slot)
            .expect("level queue names a freed slot");
        if p.state != ProcState::Runnable {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, io, wait, pid)) => {
                p.io_wait_time > io
                    || (p.io_wait_time == io && p.cpu_wait < wait)
                    || (p.io_wait_time == io && p.cpu_wait == wait && p.pid.0 > pid)
            }
        };
        if better {
            best = Some((slot, p.io_wait_time, p.cpu_wait, p.pid.0));
        }
    }
    best.map(|(slot, _, _, _)| slot)
}

/// Applies the feedback move after a process left the CPU: demotion one
/// level down, or an in-place quantum reset at the floor and for pinned
/// processes.
fn finish_dispatch(state: &mut SchedState, cpu: CpuId, pid: ProcessId) {
    state.running[cpu.as_index()] = None;
    let Some(slot) = state.table.slot_of(pid) else {
        // Reaped by its parent on another CPU before we got the lock back.
        return;
    };
    let p = state.table.get(slot).expect("slot just looked up");
    assert_ne!(
        p.state,
        ProcState::Running,
        "process came back from dispatch still Running"
    );
    let level = p.queue_level;
    if !p.is_pinned() && level < FLOOR_LEVEL {
        state.relocate(slot, level + 1);
        log::debug!("demoted {:?}: level {} -> {}", pid, level, level + 1);
    } else {
        let p = state.table.get_mut(slot).expect("slot just looked up");
        p.cpu_burst = 0;
        p.cpu_wait = 0;
        let removed = state.queues.remove(&state.table, slot);
        assert!(removed, "dispatched process absent from its level queue");
        let SchedState { table, queues, .. } = state;
        queues.insert(table, slot, level);
    }
}

impl Scheduler {
    /// One dispatcher sweep over the levels. Returns whether any process
    /// was dispatched.
    pub fn sweep(&self, cpu: CpuId, ctx: &mut dyn CpuContext) -> bool {
        let mut dispatched = false;
        let mut level = 0;
        while level < NUM_LEVELS {
            let picked = {
                let mut state = self.state.lock();
                match select_at(&state, level) {
                    Some(slot) => {
                        assert!(
                            state.running[cpu.as_index()].is_none(),
                            "cpu {} already has a current process",
                            cpu.0
                        );
                        let p = state.table.get_mut(slot).expect("selected slot vanished");
                        p.state = ProcState::Running;
                        let pid = p.pid;
                        state.running[cpu.as_index()] = Some(slot);
                        Some(pid)
                    }
                    None => None,
                }
            };
            let Some(pid) = picked else {
                level += 1;
                continue;
            };
            #[cfg(feature = "debug")]
            log::trace!("cpu {} dispatching {:?} at level {}", cpu.0, pid, level);
            ctx.run_until_yield(pid);
            dispatched = true;
            let restart = {
                let mut state = self.state.lock();
                finish_dispatch(&mut state, cpu, pid);
                state.queues.any_above_floor()
            };
            if restart {
                break;
            }
            level += 1;
        }
        dispatched
    }

    /// The per-CPU dispatcher loop: sweep forever, idling through the
    /// context capability whenever nothing is runnable.
    pub fn run(&self, cpu: CpuId, ctx: &mut dyn CpuContext) -> ! {
        loop {
            if !self.sweep(cpu, ctx) {
                ctx.idle();
            }
        }
    }
}

// ===== Tests =====
