//! Global kernel state and initialization
//!
//! Every piece of scheduler state (task table, ready lists, priority
//! bitmap, tick list, synchronization objects) lives in one [`Kernel`]
//! value. The running system owns a single instance in [`KERNEL`], reached
//! only inside a critical section through [`os_call`]; host tests build
//! their own instance and drive it directly.

use crate::config::{CFG_IDLE_STK_WORDS, CFG_MAX_TASKS, CFG_PRIO_IDLE, CFG_PRIO_MAX};
use crate::core::cs_cell::CsCell;
use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::prio::PrioTable;
use crate::sched::ReadyList;
use crate::task::stack::StackAllocator;
use crate::task::OsTcb;
use crate::time::tick_list::{deadline_after, TickList};
use crate::types::{OsNestingCtr, OsPendOn, OsPendStatus, OsTaskState, OsTick, Pend, TakeResult, TaskId, Timeout};

use crate::sync::pend_list::PendList;

#[cfg(feature = "sem")]
use crate::config::CFG_MAX_SEMS;
#[cfg(feature = "sem")]
use crate::sync::sem::OsSem;

#[cfg(feature = "mutex")]
use crate::config::CFG_MAX_MUTEXES;
#[cfg(feature = "mutex")]
use crate::sync::mutex::OsMutex;

#[cfg(feature = "queue")]
use crate::config::CFG_MAX_QUEUES;
#[cfg(feature = "queue")]
use crate::sync::queue::{OsQueue, QueuePool};

/// Scheduler context
pub struct Kernel {
    // ============ Tasks ============
    pub(crate) tasks: [OsTcb; CFG_MAX_TASKS],
    pub(crate) task_cnt: usize,
    pub(crate) stacks: StackAllocator,

    // ============ Scheduling ============
    pub(crate) prio_tbl: PrioTable,
    pub(crate) rdy_list: [ReadyList; CFG_PRIO_MAX],
    pub(crate) tick_list: TickList,
    /// Task owning the CPU
    pub(crate) cur: Option<TaskId>,
    /// A context switch has been requested and not yet performed
    pub(crate) switch_pending: bool,

    // ============ Status ============
    pub(crate) tick: OsTick,
    pub(crate) int_nesting: OsNestingCtr,
    pub(crate) initialized: bool,
    pub(crate) running: bool,

    // ============ Kernel objects ============
    #[cfg(feature = "sem")]
    pub(crate) sems: [OsSem; CFG_MAX_SEMS],
    #[cfg(feature = "sem")]
    pub(crate) sem_cnt: usize,

    #[cfg(feature = "mutex")]
    pub(crate) mutexes: [OsMutex; CFG_MAX_MUTEXES],
    #[cfg(feature = "mutex")]
    pub(crate) mutex_cnt: usize,

    #[cfg(feature = "queue")]
    pub(crate) queues: [OsQueue; CFG_MAX_QUEUES],
    #[cfg(feature = "queue")]
    pub(crate) queue_cnt: usize,
    #[cfg(feature = "queue")]
    pub(crate) queue_pool: QueuePool,
}

impl Kernel {
    /// Create an empty, uninitialized kernel
    pub const fn new() -> Self {
        Kernel {
            tasks: [const { OsTcb::new() }; CFG_MAX_TASKS],
            task_cnt: 0,
            stacks: StackAllocator::new(),

            prio_tbl: PrioTable::new(),
            rdy_list: [ReadyList::new(); CFG_PRIO_MAX],
            tick_list: TickList::new(),
            cur: None,
            switch_pending: false,

            tick: 0,
            int_nesting: 0,
            initialized: false,
            running: false,

            #[cfg(feature = "sem")]
            sems: [const { OsSem::new() }; CFG_MAX_SEMS],
            #[cfg(feature = "sem")]
            sem_cnt: 0,

            #[cfg(feature = "mutex")]
            mutexes: [const { OsMutex::new() }; CFG_MAX_MUTEXES],
            #[cfg(feature = "mutex")]
            mutex_cnt: 0,

            #[cfg(feature = "queue")]
            queues: [const { OsQueue::new() }; CFG_MAX_QUEUES],
            #[cfg(feature = "queue")]
            queue_cnt: 0,
            #[cfg(feature = "queue")]
            queue_pool: QueuePool::new(),
        }
    }

    /// Reset the kernel and create the idle task
    ///
    /// Returns the idle task's handle.
    pub fn init(&mut self) -> OsResult<TaskId> {
        if self.running {
            return Err(OsError::OsRunning);
        }
        if self.initialized {
            *self = Kernel::new();
        }

        let idle = self.create_tcb("Idle", os_idle_task, CFG_PRIO_IDLE, CFG_IDLE_STK_WORDS)?;
        self.initialized = true;
        Ok(idle)
    }

    /// Mark the kernel running and select the first task
    ///
    /// The port starts the returned task; host tests simply continue.
    pub fn start(&mut self) -> OsResult<TaskId> {
        if !self.initialized {
            return Err(OsError::OsNotInit);
        }
        if self.running {
            return Err(OsError::OsRunning);
        }
        if self.task_cnt < 2 {
            return Err(OsError::OsNoAppTask);
        }

        self.running = true;
        let first = self.complete_switch().ok_or(OsError::OsNoAppTask)?;
        crate::info!("kernel started, first task {}", self.tasks[first.index()].name);
        Ok(first)
    }

    // ============ Status ============

    /// Task owning the CPU
    #[inline]
    pub fn current(&self) -> Option<TaskId> {
        self.cur
    }

    /// Current tick count
    #[inline]
    pub fn tick_get(&self) -> OsTick {
        self.tick
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a context switch is waiting to be performed
    #[inline]
    pub fn switch_pending(&self) -> bool {
        self.switch_pending
    }

    /// Interrupt nesting depth
    #[inline]
    pub fn int_nesting(&self) -> OsNestingCtr {
        self.int_nesting
    }

    /// Running task, or `OsNotRunning` before start
    pub(crate) fn cur_task(&self) -> OsResult<TaskId> {
        self.cur.filter(|_| self.running).ok_or(OsError::OsNotRunning)
    }

    /// Whether the caller is an interrupt handler
    #[inline]
    pub(crate) fn in_isr(&self) -> bool {
        self.int_nesting > 0 || is_isr_context()
    }

    // ============ Interrupt bracketing ============

    /// Record entry into an interrupt handler
    pub fn int_enter(&mut self) {
        if self.running {
            self.int_nesting = self.int_nesting.saturating_add(1);
        }
    }

    /// Record exit from an interrupt handler
    ///
    /// Returns `true` when the outermost handler is leaving and a task
    /// switch must be requested from the port.
    pub fn int_exit(&mut self) -> bool {
        if !self.running || self.int_nesting == 0 {
            return false;
        }
        self.int_nesting -= 1;
        if self.int_nesting > 0 {
            return false;
        }
        self.schedule()
    }

    // ============ Blocking and waking ============

    /// Move `me` from its ready list onto the wait list of `on`
    ///
    /// The caller reschedules afterwards.
    pub(crate) fn pend_current(&mut self, me: TaskId, on: OsPendOn, timeout: Timeout) {
        self.rdy_remove(me);

        let tcb = &mut self.tasks[me.index()];
        tcb.state = OsTaskState::Blocked;
        tcb.pend_on = on;
        tcb.pend_status = OsPendStatus::Ok;

        self.with_wait_list(on, |list, tasks| list.insert_by_prio(me, tasks));

        if let Timeout::Ticks(ticks) = timeout {
            let wake_at = deadline_after(self.tick, ticks);
            self.tick_list.insert(me, wake_at, self.tick, &mut self.tasks);
        }

        crate::trace!("task {} blocked", me);
    }

    /// Make a blocked task ready with the given pend status
    ///
    /// The caller reschedules afterwards (or leaves it to interrupt exit).
    pub(crate) fn pend_wake(&mut self, id: TaskId, status: OsPendStatus) {
        let on = self.tasks[id.index()].pend_on;
        self.with_wait_list(on, |list, tasks| list.remove(id, tasks));
        self.tick_list.remove(id, &mut self.tasks);

        let tcb = &mut self.tasks[id.index()];
        tcb.pend_on = OsPendOn::Nothing;
        tcb.pend_status = status;
        tcb.state = OsTaskState::Ready;

        self.rdy_insert(id);
        crate::trace!("task {} woken", id);
    }

    /// Result of the last blocking call made by `id`
    pub fn pend_result(&self, id: TaskId) -> TakeResult {
        match self.tasks[id.index()].pend_status {
            OsPendStatus::Ok => TakeResult::Acquired,
            OsPendStatus::Timeout => TakeResult::TimedOut,
        }
    }

    /// Run `f` on the wait list a pending task is linked into
    #[allow(unused_variables)]
    pub(crate) fn with_wait_list<R>(
        &mut self,
        on: OsPendOn,
        f: impl FnOnce(&mut PendList, &mut [OsTcb]) -> R,
    ) -> Option<R> {
        let Kernel {
            tasks,
            #[cfg(feature = "sem")]
            sems,
            #[cfg(feature = "mutex")]
            mutexes,
            #[cfg(feature = "queue")]
            queues,
            ..
        } = self;

        match on {
            #[cfg(feature = "sem")]
            OsPendOn::Semaphore(id) => Some(f(&mut sems[id.index()].pend_list, tasks)),
            #[cfg(feature = "mutex")]
            OsPendOn::Mutex(id) => Some(f(&mut mutexes[id.index()].pend_list, tasks)),
            #[cfg(feature = "queue")]
            OsPendOn::QueueSend(id) => Some(f(&mut queues[id.index()].send_list, tasks)),
            #[cfg(feature = "queue")]
            OsPendOn::QueueRecv(id) => Some(f(&mut queues[id.index()].recv_list, tasks)),
            _ => None,
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Global Instance ============

/// The kernel instance the running system uses
pub(crate) static KERNEL: CsCell<Kernel> = CsCell::new(Kernel::new());

/// Run `f` on the global kernel inside a critical section
///
/// A switch requested from task context is handed to the port once the
/// section is left; interrupt handlers defer it to [`os_int_exit`].
pub(crate) fn os_call<R>(f: impl FnOnce(&mut Kernel) -> R) -> R {
    let (result, switch) = critical_section(|cs| {
        let k = KERNEL.get(cs);
        let result = f(k);
        (result, k.switch_pending && k.int_nesting == 0)
    });

    if switch {
        crate::port::os_ctx_sw();
    }
    result
}

/// Stop the system on an unrecoverable error
#[cold]
pub fn os_fatal(err: OsError) -> ! {
    crate::error!("fatal kernel error {}", err);
    panic!("fatal kernel error {}", err.code());
}

/// Pass recoverable errors through, stop on fatal ones
#[inline]
pub(crate) fn os_check<T>(result: OsResult<T>) -> OsResult<T> {
    match result {
        Err(err) if err.is_fatal() => os_fatal(err),
        other => other,
    }
}

/// Turn the kernel-level outcome of a blocking call into its final result
///
/// For `Pend::Blocked` the calling task has already been switched out and
/// back in by the time this runs.
pub(crate) fn os_pend_finish(pend: OsResult<Pend>) -> TakeResult {
    match pend {
        Ok(Pend::Acquired) => TakeResult::Acquired,
        Ok(Pend::TimedOut) => TakeResult::TimedOut,
        Ok(Pend::Blocked) => os_call(|k| k.cur_task().map(|me| k.pend_result(me)))
            .unwrap_or_else(|err| os_fatal(err)),
        Err(err) => os_fatal(err),
    }
}

/// Idle task body
fn os_idle_task() -> ! {
    loop {
        crate::port::os_idle_hook();
    }
}

// ============ Public API ============

/// Initialize the RTOS kernel
///
/// This must be called before any other OS function. It resets the kernel
/// and creates the idle task.
///
/// # Returns
/// * `Ok(())` - Initialization successful
/// * `Err(OsError::OsRunning)` - OS is already running
pub fn os_init() -> OsResult<()> {
    critical_section(|cs| {
        let k = KERNEL.get(cs);
        let idle = k.init()?;
        crate::task::os_task_stk_init(k, idle)
    })
}

/// Start multitasking
///
/// Starts the highest priority ready task and does not return on success.
///
/// # Returns
/// * `Err(OsError::OsNotInit)` - OS not initialized
/// * `Err(OsError::OsRunning)` - OS is already running
/// * `Err(OsError::OsNoAppTask)` - No application task created
pub fn os_start() -> OsResult<()> {
    critical_section(|cs| KERNEL.get(cs).start())?;

    crate::port::os_cpu_systick_init(crate::config::CFG_CPU_CLOCK_HZ / crate::config::CFG_TICK_RATE_HZ);

    // SAFETY: the kernel is running and the first task's frame was built
    // at creation.
    unsafe { crate::port::os_start_high_rdy() }
}

/// Enter ISR
///
/// Call first thing in every interrupt handler that uses kernel services.
pub fn os_int_enter() {
    critical_section(|cs| KERNEL.get(cs).int_enter());
}

/// Exit ISR
///
/// Call last thing in the handler; performs the deferred task switch when
/// the outermost handler returns.
pub fn os_int_exit() {
    if critical_section(|cs| KERNEL.get(cs).int_exit()) {
        crate::port::os_int_ctx_sw();
    }
}

/// Get current tick count without a critical section
///
/// Used for log timestamps, where a torn read cannot happen on a 32-bit core.
#[inline]
pub fn os_tick_peek() -> OsTick {
    // SAFETY: a single aligned word read.
    unsafe { core::ptr::read_volatile(&KERNEL.get_unchecked().tick) }
}
