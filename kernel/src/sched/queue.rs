//! # Per-Level Queue Index
//!
//! Four ordered sequences of table slots, one per feedback-queue level.
//! Each sequence is kept in descending `io_wait_time` order; a newly
//! inserted process lands *after* every process whose `io_wait_time` is
//! equal or greater, so arrival order breaks ties.
//!
//! Membership follows table residency, not run state: a Sleeping or Zombie
//! process stays in its level's sequence until it is reaped or relocated.

use alloc::vec::Vec;

use crate::process::table::{ProcessTable, SlotId};

/// Number of feedback-queue levels. Level 0 is the highest priority;
/// level `NUM_LEVELS - 1` is the round-robin floor.
pub const NUM_LEVELS: usize = 4;

/// The round-robin floor level, home of pinned bootstrap processes.
pub const FLOOR_LEVEL: usize = NUM_LEVELS - 1;

/// Ordered slot sequences, one per level.
pub struct LevelQueues {
    levels: [Vec<SlotId>; NUM_LEVELS],
}

impl LevelQueues {
    /// Creates four empty level sequences.
    pub const fn new() -> Self {
        Self {
            levels: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Inserts `slot` into `level`, recording the level in the descriptor.
    ///
    /// The insertion point is before the first entry whose `io_wait_time`
    /// is strictly less than the new descriptor's; equal keys keep the
    /// earlier arrival ahead.
    pub fn insert(&mut self, table: &mut ProcessTable, slot: SlotId, level: usize) {
        assert!(level < NUM_LEVELS, "queue level {level} out of range");
        let key = {
            let p = table
                .get_mut(slot)
                .expect("inserting a freed slot into a level queue");
            p.queue_level = level;
            p.io_wait_time
        };
        let queue = &mut self.levels[level];
        let pos = queue
            .iter()
            .position(|&s| {
                table
                    .get(s)
                    .map(|q| q.io_wait_time < key)
                    .unwrap_or(true)
            })
            .unwrap_or(queue.len());
        queue.insert(pos, slot);
    }

    /// Unlinks `slot` from the level its descriptor names.
    ///
    /// Returns whether the slot was actually resident there. Callers on
    /// paths where residency is an invariant assert on the result.
    pub fn remove(&mut self, table: &ProcessTable, slot: SlotId) -> bool {
        let Some(p) = table.get(slot) else {
            return false;
        };
        let queue = &mut self.levels[p.queue_level];
        match queue.iter().position(|&s| s == slot) {
            Some(pos) => {
                queue.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Iterates the slots at `level` in queue order.
    pub fn iter_level(&self, level: usize) -> impl Iterator<Item = SlotId> + '_ {
        self.levels[level].iter().copied()
    }

    /// Number of slots enqueued at `level`.
    pub fn len(&self, level: usize) -> usize {
        self.levels[level].len()
    }

    /// True if no slot is enqueued at any level.
    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(|q| q.is_empty())
    }

    /// True if any level above the floor has entries. The dispatcher uses
    /// this to restart its sweep from level 0 after each dispatch.
    pub fn any_above_floor(&self) -> bool {
        self.levels[..FLOOR_LEVEL].iter().any(|q| !q.is_empty())
    }
}

impl Default for LevelQueues {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Tests =====
