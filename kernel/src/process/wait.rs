//! # Process Exit and Wait
//!
//! Process termination and child reaping.
//!
//! ## Exit
//!
//! When a process exits:
//! 1. Its exit code is recorded and it becomes a Zombie
//! 2. It stays in its level queue (membership follows table residency)
//! 3. Live children are reparented to the init process
//! 4. A Sleeping parent is woken so it can reap
//!
//! ## Wait
//!
//! A parent reaps one Zombie child per call. Reaping removes the child
//! from its level queue and returns the table slot to Unused; every
//! scheduling counter dies with the descriptor. A parent with living
//! children gets [`WaitOutcome::Pending`] and is expected to sleep and
//! retry; a parent with no children gets [`WaitOutcome::NoChildren`].
//!
//! Budget exhaustion funnels through the same exit path as a voluntary
//! exit: it is control flow, not an error.

use crate::process::table::SlotId;
use crate::process::{ProcState, Process};
use crate::sched::{ProcessId, SchedError, Scheduler};

use super::ProcFlags;

/// Result of one `wait` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A Zombie child was reaped; its slot is free again
    Reaped { pid: ProcessId, exit_code: i32 },
    /// Children exist but none has exited yet
    Pending,
    /// The caller has no children to wait for
    NoChildren,
}

impl Scheduler {
    /// Terminates a process: records `code`, flips it to Zombie, hands
    /// its live children to init, and wakes a Sleeping parent.
    ///
    /// The Zombie keeps its queue slot until the parent reaps it.
    pub fn exit_process(&self, pid: ProcessId, code: i32) -> Result<(), SchedError> {
        let mut state = self.state.lock();
        let slot = state.table.slot_of(pid).ok_or(SchedError::NotFound)?;
        let p = state.table.get_mut(slot).expect("slot just looked up");
        if p.state == ProcState::Zombie {
            return Err(SchedError::NotSchedulable);
        }
        p.state = ProcState::Zombie;
        p.exit_code = Some(code);
        let parent = p.parent;
        state.clear_running(slot);

        // Hand live children to init; wake init for any zombie orphans.
        let init = state.init;
        if let Some(init_pid) = init {
            let orphans: alloc::vec::Vec<SlotId> = state
                .table
                .iter()
                .filter(|&(_, c)| c.parent == pid)
                .map(|(s, _)| s)
                .collect();
            let mut zombie_orphans = false;
            for child_slot in orphans {
                let c = state
                    .table
                    .get_mut(child_slot)
                    .expect("child slot just listed");
                c.parent = init_pid;
                zombie_orphans |= c.state == ProcState::Zombie;
            }
            if zombie_orphans {
                wake_pid(&mut state, init_pid);
            }
        }

        wake_pid(&mut state, parent);
        log::debug!("{:?} exited with code {}", pid, code);
        Ok(())
    }

    /// Reaps one Zombie child of `parent`, if any.
    pub fn wait(&self, parent: ProcessId) -> WaitOutcome {
        let mut state = self.state.lock();

        // A killed caller stops waiting and goes to its own exit.
        if let Some(slot) = state.table.slot_of(parent) {
            let p = state.table.get(slot).expect("slot just looked up");
            if p.flags.contains(ProcFlags::KILLED) {
                return WaitOutcome::NoChildren;
            }
        }

        let mut have_children = false;
        let mut zombie: Option<SlotId> = None;
        for (slot, p) in state.table.iter() {
            if p.parent != parent {
                continue;
            }
            have_children = true;
            if p.state == ProcState::Zombie {
                zombie = Some(slot);
                break;
            }
        }

        let Some(slot) = zombie else {
            return if have_children {
                WaitOutcome::Pending
            } else {
                WaitOutcome::NoChildren
            };
        };

        let state = &mut *state;
        let removed = state.queues.remove(&state.table, slot);
        assert!(removed, "zombie child absent from its level queue");
        let (pid, exit_code) = {
            let p: &Process = state.table.get(slot).expect("zombie slot occupied");
            (p.pid, p.exit_code.unwrap_or(0))
        };
        state.table.free(slot);
        log::debug!("{:?} reaped {:?} (exit code {})", parent, pid, exit_code);
        WaitOutcome::Reaped { pid, exit_code }
    }
}

/// Wakes `pid` if it is resident and Sleeping. Lock already held.
fn wake_pid(state: &mut crate::sched::SchedState, pid: ProcessId) {
    if let Some(slot) = state.table.slot_of(pid) {
        let p = state.table.get_mut(slot).expect("slot just looked up");
        if p.state == ProcState::Sleeping {
            p.state = ProcState::Runnable;
        }
    }
}

// ===== Tests =====
