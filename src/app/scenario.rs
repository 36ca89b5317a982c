//! Two-lock deadlock and priority-inversion scenario
//!
//! Task bodies are written as [`Step`] scripts. On the board [`Scenario`]
//! executes them through the blocking API; host tests interpret the same
//! scripts against a [`Kernel`] they drive tick by tick.
//!
//! Deadlock: the low task takes Mutex1 then Mutex2, the high task (woken by
//! a button) takes Mutex2 then Mutex1. Once each holds its first lock both
//! block forever. Priority inheritance lifts the low task to the high
//! task's priority but cannot break the cycle.
//!
//! Inversion: the low task holds Mutex1 through a long computation, the
//! high task blocks on it and a CPU-bound medium task becomes ready. The
//! inherited priority keeps the low task ahead of the medium one, so the
//! high task is delayed only by the critical section itself.

use portable_atomic::{AtomicU32, Ordering};

use crate::app::console::CONSOLE;
use crate::error::OsResult;
use crate::kernel::{os_call, Kernel};
use crate::sync::mutex::Mutex;
use crate::sync::sem::Semaphore;
use crate::task::os_task_create;
use crate::time::{os_time_dly_ms, os_time_get};
use crate::types::{MutexId, OsPendOn, OsPrio, OsTick, Timeout};

pub const LOW_PRIO: OsPrio = 1;
pub const MEDIUM_PRIO: OsPrio = 2;
pub const HIGH_PRIO: OsPrio = 3;
pub const MONITOR_PRIO: OsPrio = 4;

/// Stack of every scenario task, in words
pub const SCENARIO_STK_WORDS: usize = 256;

/// Period of the liveness check
pub const WATCH_PERIOD_MS: u32 = 1000;

/// One of the two scenario locks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockId {
    M1,
    M2,
}

/// Progress points counted by the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Milestone {
    LowLocked = 0,
    LowBoth = 1,
    LowReleased = 2,
    HighLocked = 3,
    HighBoth = 4,
    HighReleased = 5,
    MediumDone = 6,
}

impl Milestone {
    pub const COUNT: usize = 7;

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// One action of a scripted task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Print a line on the console
    Say(&'static str),
    /// Take a lock, waiting forever
    Lock(LockId),
    Unlock(LockId),
    /// Sleep for this many milliseconds
    Delay(u32),
    /// Wait for a button press
    AwaitSignal,
    /// Record progress
    Mark(Milestone),
    /// Compute for this many ticks of CPU time
    Spin(OsTick),
}

/// Script of one scenario task
///
/// The prologue runs once, then the body repeats forever.
pub struct TaskScript {
    pub name: &'static str,
    pub prio: OsPrio,
    pub prologue: &'static [Step],
    pub body: &'static [Step],
}

impl TaskScript {
    /// Step at position `pc` of the unrolled script
    pub fn step(&self, pc: usize) -> Step {
        match pc.checked_sub(self.prologue.len()) {
            None => self.prologue[pc],
            Some(i) => self.body[i % self.body.len()],
        }
    }
}

pub static LOW: TaskScript = TaskScript {
    name: "LowPriTask",
    prio: LOW_PRIO,
    prologue: &[Step::Say("Low Priority Task Started")],
    body: &[
        Step::Say("Low Priority Task: Starting new cycle"),
        Step::Say("Low Priority Task: Attempting to take Mutex1"),
        Step::Lock(LockId::M1),
        Step::Say("Low Priority Task: Acquired Mutex1"),
        Step::Mark(Milestone::LowLocked),
        Step::Delay(500),
        Step::Say("Low Priority Task: Attempting to take Mutex2"),
        Step::Lock(LockId::M2),
        Step::Say("Low Priority Task: Acquired both mutexes"),
        Step::Mark(Milestone::LowBoth),
        Step::Delay(500),
        Step::Unlock(LockId::M2),
        Step::Say("Low Priority Task: Released Mutex2"),
        Step::Unlock(LockId::M1),
        Step::Say("Low Priority Task: Released Mutex1"),
        Step::Mark(Milestone::LowReleased),
        Step::Delay(2000),
    ],
};

pub static HIGH: TaskScript = TaskScript {
    name: "HighPriTask",
    prio: HIGH_PRIO,
    prologue: &[Step::Say("High Priority Task Started"), Step::Delay(1000)],
    body: &[
        Step::AwaitSignal,
        Step::Say("High Priority Task: Button pressed, starting deadlock sequence"),
        Step::Say("High Priority Task: Attempting to take Mutex2"),
        Step::Lock(LockId::M2),
        Step::Say("High Priority Task: Acquired Mutex2"),
        Step::Mark(Milestone::HighLocked),
        Step::Delay(200),
        Step::Say("High Priority Task: Attempting to take Mutex1"),
        Step::Lock(LockId::M1),
        Step::Say("High Priority Task: Acquired both mutexes"),
        Step::Mark(Milestone::HighBoth),
        Step::Delay(500),
        Step::Unlock(LockId::M1),
        Step::Say("High Priority Task: Released Mutex1"),
        Step::Unlock(LockId::M2),
        Step::Say("High Priority Task: Released Mutex2"),
        Step::Mark(Milestone::HighReleased),
    ],
};

pub static INV_LOW: TaskScript = TaskScript {
    name: "LowPriTask",
    prio: LOW_PRIO,
    prologue: &[],
    body: &[
        Step::Lock(LockId::M1),
        Step::Mark(Milestone::LowLocked),
        Step::Spin(300),
        Step::Unlock(LockId::M1),
        Step::Mark(Milestone::LowReleased),
        Step::Delay(1000),
    ],
};

pub static INV_HIGH: TaskScript = TaskScript {
    name: "HighPriTask",
    prio: HIGH_PRIO,
    prologue: &[Step::Delay(100)],
    body: &[
        Step::Lock(LockId::M1),
        Step::Mark(Milestone::HighLocked),
        Step::Unlock(LockId::M1),
        Step::Mark(Milestone::HighReleased),
        Step::Say("High Priority Task: critical section done"),
        Step::Delay(1000),
    ],
};

pub static MEDIUM: TaskScript = TaskScript {
    name: "MedPriTask",
    prio: MEDIUM_PRIO,
    prologue: &[Step::Delay(150)],
    body: &[
        Step::Spin(500),
        Step::Mark(Milestone::MediumDone),
        Step::Say("Medium Priority Task: computation done"),
        Step::Delay(1000),
    ],
};

/// Milestone counters shared by the scenario tasks and the monitor
pub struct ScenarioTrace {
    counts: [AtomicU32; Milestone::COUNT],
    last: [AtomicU32; Milestone::COUNT],
}

/// Milestone counts at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSnapshot([u32; Milestone::COUNT]);

impl TraceSnapshot {
    pub fn count(&self, m: Milestone) -> u32 {
        self.0[m.index()]
    }

    /// Whether any milestone was reached since `earlier`
    pub fn progressed_since(&self, earlier: &TraceSnapshot) -> bool {
        self != earlier
    }
}

impl ScenarioTrace {
    pub const fn new() -> Self {
        ScenarioTrace {
            counts: [const { AtomicU32::new(0) }; Milestone::COUNT],
            last: [const { AtomicU32::new(0) }; Milestone::COUNT],
        }
    }

    pub fn record(&self, m: Milestone, tick: OsTick) {
        self.last[m.index()].store(tick, Ordering::Relaxed);
        self.counts[m.index()].fetch_add(1, Ordering::Release);
    }

    pub fn count(&self, m: Milestone) -> u32 {
        self.counts[m.index()].load(Ordering::Acquire)
    }

    /// Tick of the latest occurrence
    pub fn last_tick(&self, m: Milestone) -> Option<OsTick> {
        (self.count(m) > 0).then(|| self.last[m.index()].load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> TraceSnapshot {
        TraceSnapshot(core::array::from_fn(|i| self.counts[i].load(Ordering::Acquire)))
    }
}

impl Default for ScenarioTrace {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether each of the two mutexes is held by a task blocked on the other
pub fn deadlocked(k: &Kernel, a: MutexId, b: MutexId) -> bool {
    let (Ok(Some(owner_a)), Ok(Some(owner_b))) = (k.mutex_owner(a), k.mutex_owner(b)) else {
        return false;
    };
    owner_a != owner_b
        && k.task_pend_on(owner_a) == OsPendOn::Mutex(b)
        && k.task_pend_on(owner_b) == OsPendOn::Mutex(a)
}

/// Kernel objects of the scenario
pub struct Scenario {
    m1: Mutex,
    m2: Mutex,
    signal: Semaphore,
    trace: ScenarioTrace,
}

impl Scenario {
    pub const fn new() -> Self {
        Scenario {
            m1: Mutex::new(),
            m2: Mutex::new(),
            signal: Semaphore::new(),
            trace: ScenarioTrace::new(),
        }
    }

    /// Create the two locks and the button semaphore
    pub fn create(&self) -> OsResult<()> {
        self.m1.create("Mutex1")?;
        self.m2.create("Mutex2")?;
        self.signal.binary("Button")
    }

    pub fn lock(&self, id: LockId) -> &Mutex {
        match id {
            LockId::M1 => &self.m1,
            LockId::M2 => &self.m2,
        }
    }

    /// Semaphore the buttons give
    pub const fn signal(&self) -> &Semaphore {
        &self.signal
    }

    pub fn trace(&self) -> &ScenarioTrace {
        &self.trace
    }

    /// Perform one step on the running system
    pub fn exec(&self, step: Step) {
        match step {
            Step::Say(text) => CONSOLE.println(text),
            Step::Lock(id) => {
                let taken = self.lock(id).take(Timeout::Forever);
                debug_assert!(taken.is_acquired());
            }
            Step::Unlock(id) => {
                self.lock(id).give();
            }
            Step::Delay(ms) => os_time_dly_ms(ms),
            Step::AwaitSignal => {
                let signalled = self.signal.take(Timeout::Forever);
                debug_assert!(signalled.is_acquired());
            }
            Step::Mark(m) => self.trace.record(m, os_time_get()),
            Step::Spin(ticks) => spin(ticks),
        }
    }

    /// Run a script forever
    pub fn run(&self, script: &TaskScript) -> ! {
        crate::info!("{} running at priority {}", script.name, script.prio);
        for &step in script.prologue {
            self.exec(step);
        }
        loop {
            for &step in script.body {
                self.exec(step);
            }
        }
    }

    /// Report on the console when the scenario stops making progress
    pub fn watch(&self) -> ! {
        let mut before = self.trace.snapshot();
        let mut reported = false;
        loop {
            os_time_dly_ms(WATCH_PERIOD_MS);
            let now = self.trace.snapshot();
            let stuck = os_call(|k| deadlocked(k, self.m1.id(), self.m2.id()));

            if stuck && !now.progressed_since(&before) && !reported {
                crate::warn!("deadlock: Mutex1 and Mutex2 held by tasks waiting on each other");
                CONSOLE.println("Monitor: deadlock detected, no progress since last check");
                reported = true;
            }
            before = now;
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

/// Busy-compute for `ticks` ticks during which this task held the CPU
fn spin(ticks: OsTick) {
    let mut left = ticks;
    let mut last = os_time_get();
    while left > 0 {
        let now = os_time_get();
        if now != last {
            left -= 1;
            last = now;
        }
        core::hint::spin_loop();
    }
}

/// The board's scenario instance
pub static SCENARIO: Scenario = Scenario::new();

fn low_task() -> ! {
    SCENARIO.run(&LOW)
}

fn high_task() -> ! {
    SCENARIO.run(&HIGH)
}

fn inv_low_task() -> ! {
    SCENARIO.run(&INV_LOW)
}

fn inv_high_task() -> ! {
    SCENARIO.run(&INV_HIGH)
}

fn medium_task() -> ! {
    SCENARIO.run(&MEDIUM)
}

fn monitor_task() -> ! {
    SCENARIO.watch()
}

/// Create the deadlock scenario: objects, both lock tasks and the monitor
pub fn spawn_deadlock() -> OsResult<()> {
    SCENARIO.create()?;
    os_task_create(LOW.name, low_task, LOW.prio, SCENARIO_STK_WORDS)?;
    os_task_create(HIGH.name, high_task, HIGH.prio, SCENARIO_STK_WORDS)?;
    os_task_create("Monitor", monitor_task, MONITOR_PRIO, SCENARIO_STK_WORDS)?;
    Ok(())
}

/// Create the priority-inversion scenario
pub fn spawn_inversion() -> OsResult<()> {
    SCENARIO.create()?;
    os_task_create(INV_LOW.name, inv_low_task, INV_LOW.prio, SCENARIO_STK_WORDS)?;
    os_task_create(INV_HIGH.name, inv_high_task, INV_HIGH.prio, SCENARIO_STK_WORDS)?;
    os_task_create(MEDIUM.name, medium_task, MEDIUM.prio, SCENARIO_STK_WORDS)?;
    os_task_create("Monitor", monitor_task, MONITOR_PRIO, SCENARIO_STK_WORDS)?;
    Ok(())
}
