//! # Process Table
//!
//! Fixed-capacity arena of process descriptors. Slots are addressed by a
//! stable [`SlotId`]; a descriptor never moves while resident, so queue
//! membership can be recorded as plain slot indices with no aliasing.
//!
//! Slot reuse is immediate: `free` returns the slot to the allocator and the
//! next `allocate` may hand it out again with a fresh pid. Anything that
//! holds a `SlotId` across a release must re-validate through the pid.

use alloc::string::String;
use alloc::vec::Vec;

use crate::sched::{ProcessId, SchedError};

use super::{Process, MAX_PROCESSES};

/// Stable index of a slot in the process table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotId(pub usize);

impl SlotId {
    /// Returns the raw index.
    pub const fn as_index(self) -> usize {
        self.0
    }
}

/// Fixed-capacity descriptor table.
pub struct ProcessTable {
    slots: Vec<Option<Process>>,
    next_pid: u64,
}

impl ProcessTable {
    /// Creates an empty table with [`MAX_PROCESSES`] slots.
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_PROCESSES);
        slots.resize_with(MAX_PROCESSES, || None);
        Self { slots, next_pid: 1 }
    }

    /// Allocates the lowest free slot and constructs an Embryo descriptor
    /// in it with a fresh pid.
    pub fn allocate(&mut self, name: String, parent: ProcessId) -> Result<SlotId, SchedError> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(SchedError::TableFull)?;
        let pid = ProcessId(self.next_pid);
        self.next_pid += 1;
        self.slots[idx] = Some(Process::new(pid, name, parent));
        Ok(SlotId(idx))
    }

    /// Releases a slot back to the allocator, dropping its descriptor.
    pub fn free(&mut self, slot: SlotId) {
        self.slots[slot.as_index()] = None;
    }

    /// Returns the descriptor in `slot`, if the slot is occupied.
    pub fn get(&self, slot: SlotId) -> Option<&Process> {
        self.slots.get(slot.as_index()).and_then(|s| s.as_ref())
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut Process> {
        self.slots.get_mut(slot.as_index()).and_then(|s| s.as_mut())
    }

    /// Finds the slot holding `pid`.
    pub fn slot_of(&self, pid: ProcessId) -> Option<SlotId> {
        self.iter().find(|&(_, p)| p.pid == pid).map(|(s, _)| s)
    }

    /// Iterates over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &Process)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|p| (SlotId(i), p)))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Table capacity (always [`MAX_PROCESSES`]).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Tests =====
