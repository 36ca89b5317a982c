//! Host-side helpers shared by the integration tests
//!
//! [`Sim`] runs scenario scripts against a private [`Kernel`]: it executes
//! the current task's steps through the kernel-level API, performs every
//! requested context switch the way PendSV would, and advances the clock
//! through the interrupt path whenever the running task computes or the
//! idle task runs.

#![allow(dead_code)]

use rtcore::app::scenario::SCENARIO_STK_WORDS;
use rtcore::app::{LockId, ScenarioTrace, Step, TaskScript};
use rtcore::kernel::Kernel;
use rtcore::types::{MutexId, OsTick, Pend, SemId, TakeResult, TaskId, Timeout};
use rtcore::ms_to_ticks;

/// Entry point of tasks that only exist as kernel bookkeeping
pub fn task_body() -> ! {
    loop {
        std::hint::spin_loop();
    }
}

/// One tick through the interrupt path, then the pending switch
pub fn tick(k: &mut Kernel) {
    k.int_enter();
    k.tick();
    k.int_exit();
    switch(k);
}

pub fn ticks(k: &mut Kernel, n: u32) {
    for _ in 0..n {
        tick(k);
    }
}

/// Perform the pending context switch, if any
pub fn switch(k: &mut Kernel) {
    if k.switch_pending() {
        k.complete_switch();
    }
}

/// Initialized kernel with tasks at the given priorities, not started
pub fn kernel_with(prios: &[u8]) -> (Kernel, Vec<TaskId>) {
    let mut k = Kernel::new();
    k.init().unwrap();
    let ids = prios
        .iter()
        .map(|&p| k.task_create("T", task_body, p, 128).unwrap())
        .collect();
    (k, ids)
}

struct SimTask {
    id: TaskId,
    script: &'static TaskScript,
    pc: usize,
    /// Blocked in the current step; its result is read on resumption
    waiting: bool,
    spin_left: Option<OsTick>,
}

/// Deterministic scenario simulator
pub struct Sim {
    pub k: Kernel,
    pub m1: MutexId,
    pub m2: MutexId,
    pub signal: SemId,
    pub trace: ScenarioTrace,
    /// Console lines with the tick they were printed at
    pub log: Vec<(OsTick, &'static str)>,
    tasks: Vec<SimTask>,
    presses: Vec<OsTick>,
}

/// Instantaneous steps one task may take before it must block or compute
const STEP_BUDGET: usize = 10_000;

impl Sim {
    pub fn new(scripts: &[&'static TaskScript]) -> Self {
        let mut k = Kernel::new();
        k.init().unwrap();

        let m1 = k.mutex_create("Mutex1").unwrap();
        let m2 = k.mutex_create("Mutex2").unwrap();
        let signal = k.sem_create("Button", 1, 0).unwrap();

        let tasks = scripts
            .iter()
            .map(|&script| SimTask {
                id: k
                    .task_create(script.name, task_body, script.prio, SCENARIO_STK_WORDS)
                    .unwrap(),
                script,
                pc: 0,
                waiting: false,
                spin_left: None,
            })
            .collect();

        k.start().unwrap();

        Sim {
            k,
            m1,
            m2,
            signal,
            trace: ScenarioTrace::new(),
            log: Vec::new(),
            tasks,
            presses: Vec::new(),
        }
    }

    /// Handle of the task running `script`
    pub fn task(&self, script: &TaskScript) -> TaskId {
        self.tasks
            .iter()
            .find(|t| core::ptr::eq(t.script, script))
            .map(|t| t.id)
            .expect("script not simulated")
    }

    /// Press a button (interrupt gives the signal semaphore) at `tick`
    pub fn press_at(&mut self, tick: OsTick) {
        self.presses.push(tick);
    }

    pub fn lock(&self, id: LockId) -> MutexId {
        match id {
            LockId::M1 => self.m1,
            LockId::M2 => self.m2,
        }
    }

    /// Run until the clock reaches `until`
    pub fn run_until(&mut self, until: OsTick) {
        let mut budget = 0;

        while self.k.tick_get() < until {
            switch(&mut self.k);
            let cur = self.k.current().expect("kernel has no current task");

            match self.tasks.iter().position(|t| t.id == cur) {
                None => {
                    self.advance_tick();
                    budget = 0;
                }
                Some(i) => {
                    if self.exec(i) {
                        budget = 0;
                    } else {
                        budget += 1;
                        assert!(budget < STEP_BUDGET, "task loops without blocking");
                    }
                }
            }
        }
    }

    /// SysTick, with any scheduled button press handled in the same interrupt
    fn advance_tick(&mut self) {
        self.k.int_enter();
        self.k.tick();
        if self.presses.contains(&self.k.tick_get()) {
            self.k.sem_give_from_isr(self.signal).unwrap();
        }
        self.k.int_exit();
    }

    /// Execute one step of task `i`; returns whether time advanced
    fn exec(&mut self, i: usize) -> bool {
        let (id, step) = {
            let t = &self.tasks[i];
            (t.id, t.script.step(t.pc))
        };

        if self.tasks[i].waiting {
            self.tasks[i].waiting = false;
            assert_eq!(self.k.pend_result(id), TakeResult::Acquired, "{:?} timed out", step);
            self.tasks[i].pc += 1;
            return false;
        }

        let now = self.k.tick_get();
        match step {
            Step::Say(text) => self.log.push((now, text)),
            Step::Lock(lock) => {
                let m = self.lock(lock);
                let pend = self.k.mutex_take(m, Timeout::Forever).unwrap();
                return self.settle(i, pend);
            }
            Step::Unlock(lock) => {
                let m = self.lock(lock);
                self.k.mutex_give(m).unwrap();
            }
            Step::Delay(ms) => self.k.time_dly(ms_to_ticks(ms)).unwrap(),
            Step::AwaitSignal => {
                let pend = self.k.sem_take(self.signal, Timeout::Forever).unwrap();
                return self.settle(i, pend);
            }
            Step::Mark(m) => self.trace.record(m, now),
            Step::Spin(n) => {
                let left = self.tasks[i].spin_left.get_or_insert(n);
                if *left > 0 {
                    *left -= 1;
                    self.advance_tick();
                    return true;
                }
                self.tasks[i].spin_left = None;
            }
        }

        self.tasks[i].pc += 1;
        false
    }

    fn settle(&mut self, i: usize, pend: Pend) -> bool {
        match pend {
            Pend::Acquired => self.tasks[i].pc += 1,
            Pend::Blocked => self.tasks[i].waiting = true,
            Pend::TimedOut => panic!("wait forever timed out"),
        }
        false
    }

    /// Whether `text` was printed
    pub fn said(&self, text: &str) -> bool {
        self.log.iter().any(|&(_, line)| line == text)
    }
}
