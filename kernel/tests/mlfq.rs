//! End-to-end scheduling scenarios driven through a scripted CPU context.

use tern_kernel::process::wait::WaitOutcome;
use tern_kernel::sched::{
    CpuContext, CpuId, ProcessId, Scheduler, TickAction, FLOOR_LEVEL, QUANTA,
};

/// One dispatch as observed by the scripted CPU.
#[derive(Debug, Clone, Copy)]
struct Dispatch {
    pid: ProcessId,
    level: usize,
    burst: u32,
}

/// Scripted CPU: runs every dispatched process for real ticks, obeying the
/// accountant's verdicts. A designated "reaper" process runs a wait loop
/// instead of burning ticks.
struct Machine<'a> {
    sched: &'a Scheduler,
    cpu: CpuId,
    reaper: Option<ProcessId>,
    dispatches: Vec<Dispatch>,
    reaped: Vec<(ProcessId, i32)>,
    no_children_seen: u32,
}

impl<'a> Machine<'a> {
    fn new(sched: &'a Scheduler, cpu: CpuId) -> Self {
        Self {
            sched,
            cpu,
            reaper: None,
            dispatches: Vec::new(),
            reaped: Vec::new(),
            no_children_seen: 0,
        }
    }

    fn run_reaper(&mut self, pid: ProcessId) {
        loop {
            match self.sched.wait(pid) {
                WaitOutcome::Reaped { pid, exit_code } => {
                    self.reaped.push((pid, exit_code));
                }
                WaitOutcome::Pending => {
                    self.sched.sleep(pid).unwrap();
                    return;
                }
                WaitOutcome::NoChildren => {
                    self.no_children_seen += 1;
                    self.sched.exit_process(pid, 0).unwrap();
                    return;
                }
            }
        }
    }

    fn drive_to_idle(&mut self) {
        let sched = self.sched;
        let cpu = self.cpu;
        let mut sweeps = 0;
        while sched.sweep(cpu, self) {
            sweeps += 1;
            assert!(sweeps < 10_000, "scheduler never went idle");
        }
    }
}

impl CpuContext for Machine<'_> {
    fn run_until_yield(&mut self, pid: ProcessId) {
        if self.reaper == Some(pid) {
            self.run_reaper(pid);
            return;
        }
        let level = self.sched.process_info(pid).unwrap().queue_level;
        let mut burst = 0u32;
        loop {
            let action = self.sched.timer_tick(self.cpu);
            burst += 1;
            match action {
                TickAction::Continue => {}
                TickAction::Preempt => {
                    self.sched.yield_cpu(self.cpu);
                    break;
                }
                TickAction::Terminate => {
                    self.sched.exit_process(pid, 0).unwrap();
                    break;
                }
            }
        }
        self.dispatches.push(Dispatch { pid, level, burst });
    }

    fn idle(&mut self) {}
}

#[test]
fn budgeted_workers_stop_exactly_on_budget() {
    let sched = Scheduler::new();

    let parent = sched.create("parent", ProcessId::KERNEL, false).unwrap();
    sched.make_runnable(parent).unwrap();
    // parent blocks in its wait loop until a child exits
    sched.sleep(parent).unwrap();

    let mut workers = Vec::new();
    for name in ["worker_a", "worker_b", "worker_c"] {
        let pid = sched.create(name, parent, false).unwrap();
        sched.make_runnable(pid).unwrap();
        assert_eq!(sched.configure(pid, 2, 0, 300), Ok(0));
        workers.push(pid);
    }

    let mut machine = Machine::new(&sched, CpuId::BSP);
    machine.reaper = Some(parent);
    machine.drive_to_idle();

    // With identical counters the highest pid is dispatched first.
    let first = machine
        .dispatches
        .iter()
        .find(|d| workers.contains(&d.pid))
        .unwrap();
    assert_eq!(first.pid, *workers.last().unwrap());
    assert_eq!(first.level, 2);

    // Every burst stayed within the quantum of the dispatching level, and
    // no worker ever rose above its configured level 2.
    for d in machine.dispatches.iter().filter(|d| workers.contains(&d.pid)) {
        assert!(d.level >= 2, "{:?} was promoted to level {}", d.pid, d.level);
        assert!(
            d.burst <= QUANTA[d.level],
            "{:?} ran {} ticks at level {}",
            d.pid,
            d.burst,
            d.level
        );
    }

    // Each worker consumed exactly its 300-tick budget, no more.
    for &pid in &workers {
        let total: u32 = machine
            .dispatches
            .iter()
            .filter(|d| d.pid == pid)
            .map(|d| d.burst)
            .sum();
        assert_eq!(total, 300, "{:?} consumed {} ticks", pid, total);
    }
    assert_eq!(sched.ticks(), 900);

    // The parent reaped all three, then saw an empty table and exited.
    assert_eq!(machine.reaped.len(), 3);
    assert_eq!(machine.no_children_seen, 1);
    for &pid in &workers {
        assert!(sched.process_info(pid).is_none(), "{:?} not reaped", pid);
    }
    assert_eq!(
        sched.process_info(parent).unwrap().state,
        tern_kernel::process::ProcState::Zombie
    );
}

#[test]
fn starved_floor_process_ages_back_up() {
    let sched = Scheduler::new();

    let hog = sched.create("hog", ProcessId::KERNEL, false).unwrap();
    sched.make_runnable(hog).unwrap();
    sched.configure(hog, 0, 0, 1000).unwrap();

    let meek = sched.create("meek", ProcessId::KERNEL, false).unwrap();
    sched.make_runnable(meek).unwrap();
    sched.configure(meek, FLOOR_LEVEL, 0, 50).unwrap();

    let mut machine = Machine::new(&sched, CpuId::BSP);
    machine.drive_to_idle();

    // The hog sank to the floor and kept winning the recency tie-break
    // there, so the meek process only ran after aging promoted it.
    let promoted = machine
        .dispatches
        .iter()
        .any(|d| d.pid == meek && d.level < FLOOR_LEVEL);
    assert!(promoted, "meek process was never promoted off the floor");

    let hog_info = sched.process_info(hog).unwrap();
    let meek_info = sched.process_info(meek).unwrap();
    assert_eq!(hog_info.stack_cpu_burst, 1000);
    assert_eq!(meek_info.stack_cpu_burst, 50);
    assert_eq!(sched.ticks(), 1050);
}
