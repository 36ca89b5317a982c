//! Task management module
//!
//! Tasks are created once, before or after the scheduler starts, and live
//! forever. Each gets a TCB slot in the kernel's task table and a stack
//! region carved from the static stack pool.

pub mod stack;
mod tcb;

pub use tcb::{MutexSet, OsTcb};

use crate::config::{CFG_PRIO_IDLE, CFG_PRIO_MAX, CFG_STK_SIZE_MIN, CFG_TIME_QUANTA_DEFAULT};
use crate::error::{OsError, OsResult};
use crate::kernel::{os_call, Kernel};
use crate::port::frame::InitialFrame;
use crate::types::{OsPendOn, OsPrio, OsTaskState, TaskId};

use stack::{STACK_POOL, STK_CANARY};

/// Task entry point function type
pub type OsTaskFn = fn() -> !;

impl Kernel {
    /// Create a new application task
    ///
    /// # Arguments
    /// * `name` - Task name for debugging
    /// * `entry` - Task entry point function
    /// * `prio` - Task priority (higher = more urgent, above the idle priority)
    /// * `stk_words` - Stack size in words
    ///
    /// The task is ready immediately; if the kernel is running and the new
    /// task is more urgent than the caller, a switch is requested.
    pub fn task_create(
        &mut self,
        name: &'static str,
        entry: OsTaskFn,
        prio: OsPrio,
        stk_words: usize,
    ) -> OsResult<TaskId> {
        if self.in_isr() {
            return Err(OsError::TaskCreateIsr);
        }
        if !self.initialized {
            return Err(OsError::OsNotInit);
        }
        if prio == CFG_PRIO_IDLE {
            return Err(OsError::PrioInvalid);
        }

        let id = self.create_tcb(name, entry, prio, stk_words)?;
        self.schedule();
        Ok(id)
    }

    /// Allocate and link a TCB
    pub(crate) fn create_tcb(
        &mut self,
        name: &'static str,
        entry: OsTaskFn,
        prio: OsPrio,
        stk_words: usize,
    ) -> OsResult<TaskId> {
        if prio as usize >= CFG_PRIO_MAX {
            return Err(OsError::PrioInvalid);
        }
        if stk_words < CFG_STK_SIZE_MIN {
            return Err(OsError::StkSizeInvalid);
        }
        if self.task_cnt >= self.tasks.len() {
            return Err(OsError::TaskNoMoreTcb);
        }

        let stk = self.stacks.carve(stk_words)?;
        let id = TaskId(self.task_cnt as u8);
        self.task_cnt += 1;

        let tcb = &mut self.tasks[id.index()];
        *tcb = OsTcb::new();
        tcb.name = name;
        tcb.entry = Some(entry);
        tcb.stk = stk;
        tcb.prio = prio;
        tcb.base_prio = prio;
        tcb.time_quanta = CFG_TIME_QUANTA_DEFAULT;
        tcb.time_quanta_ctr = CFG_TIME_QUANTA_DEFAULT;
        tcb.state = OsTaskState::Ready;

        self.rdy_insert(id);
        crate::debug!("task {} created, prio {}", name, prio);
        Ok(id)
    }

    /// State of a task
    pub fn task_state(&self, id: TaskId) -> OsTaskState {
        self.tasks[id.index()].state
    }

    /// Effective priority of a task
    pub fn task_prio(&self, id: TaskId) -> OsPrio {
        self.tasks[id.index()].prio
    }

    /// Priority a task was created with
    pub fn task_base_prio(&self, id: TaskId) -> OsPrio {
        self.tasks[id.index()].base_prio
    }

    /// Object a blocked task waits on
    pub fn task_pend_on(&self, id: TaskId) -> OsPendOn {
        self.tasks[id.index()].pend_on
    }

    pub fn task_name(&self, id: TaskId) -> &'static str {
        self.tasks[id.index()].name
    }

    /// Number of created tasks, including the idle task
    pub fn task_count(&self) -> usize {
        self.task_cnt
    }

    /// Task table entry
    pub fn tcb(&self, id: TaskId) -> &OsTcb {
        &self.tasks[id.index()]
    }
}

/// Write the canary and the initial exception frame of a new task
pub(crate) fn os_task_stk_init(k: &mut Kernel, id: TaskId) -> OsResult<()> {
    let tcb = &mut k.tasks[id.index()];
    let entry = tcb.entry.ok_or(OsError::ObjInvalid)?;

    // SAFETY: the task has never run and its region belongs to it alone.
    let stk = unsafe { STACK_POOL.region_mut(tcb.stk) };
    stk[0] = STK_CANARY;

    let frame = InitialFrame::new(entry as usize as u32, crate::port::os_task_return as usize as u32);
    let sp = frame.write(stk)?;
    tcb.stk_ptr = STACK_POOL.addr_of(tcb.stk.base() + sp);
    Ok(())
}

/// Create a new task
///
/// # Arguments
/// * `name` - Task name for debugging
/// * `entry` - Task entry point function
/// * `prio` - Task priority (higher = more urgent, 0 is the idle task)
/// * `stk_words` - Stack size in words, carved from the static stack pool
///
/// # Example
/// ```ignore
/// fn blink() -> ! {
///     loop {
///         os_time_dly_ms(500);
///     }
/// }
///
/// os_task_create("Blink", blink, 2, 256)?;
/// ```
pub fn os_task_create(
    name: &'static str,
    entry: OsTaskFn,
    prio: OsPrio,
    stk_words: usize,
) -> OsResult<TaskId> {
    os_call(|k| {
        let id = k.task_create(name, entry, prio, stk_words)?;
        os_task_stk_init(k, id)?;
        Ok(id)
    })
}
