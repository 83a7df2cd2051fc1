//! # T-CORE: The Tern OS Scheduling Core
//!
//! This is the heart of Tern OS. The core is responsible for exactly three things:
//!
//! 1. **Process Bookkeeping** (`process`): Fixed-capacity descriptor table and lifecycle
//! 2. **MLFQ Scheduling** (`sched`): Four-level feedback queues with aging and demotion
//! 3. **Tick Accounting** (`sched::tick`): Per-tick counters, quanta, and CPU budgets
//!
//! Everything hardware-facing (interrupt controllers, register-level context
//! switching, virtual memory) lives outside this crate and reaches it through
//! the [`sched::dispatch::CpuContext`] capability.
//!
//! ## Scheduling Model
//!
//! Processes live in one of four priority levels. Level 0 is the highest;
//! level 3 is a round-robin floor. A process that exhausts its level's time
//! quantum is demoted one level; a process that waits too long for the CPU is
//! promoted one level. Within a level, the candidate that slept the longest
//! runs first. The whole policy is driven by a single timer tick.
//!
//! ## No Magic
//!
//! There are no heuristics or "smart" adjustments. Every scheduling decision
//! is a pure function of the per-process counters, so the same tick history
//! always produces the same dispatch order.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

// =============================================================================
// Core Modules
// =============================================================================

pub mod process;
pub mod sched;

use core::sync::atomic::{AtomicBool, Ordering};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "T-CORE";

/// Global core initialization flag
static CORE_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the scheduling core.
///
/// Idempotent; only the first call has any effect.
pub fn init() {
    if CORE_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }
    log::info!("{} v{} initialized", NAME, VERSION);
}

/// Returns true once [`init`] has run.
pub fn is_initialized() -> bool {
    CORE_INITIALIZED.load(Ordering::SeqCst)
}
