//! Scheduler module
//!
//! Priority-based preemptive scheduler with round-robin for same priority.
//!
//! A task switch happens in two phases. Kernel operations call
//! [`Kernel::schedule`], which only records that the most urgent ready task
//! differs from the running one. The port's PendSV handler then calls
//! [`Kernel::complete_switch`] to hand the CPU over. Inside an interrupt the
//! first phase is deferred until the outermost handler exits.

mod rdy_list;

pub use rdy_list::ReadyList;

use crate::config::CFG_SCHED_ROUND_ROBIN_EN;
use crate::error::{OsError, OsResult};
use crate::kernel::{os_call, os_fatal, Kernel};
use crate::types::{OsPrio, OsTaskState, TaskId};

impl Kernel {
    /// Make a task ready at the tail of its priority's list
    pub(crate) fn rdy_insert(&mut self, id: TaskId) {
        let prio = self.tasks[id.index()].prio;
        self.rdy_list[prio as usize].insert_tail(id, &mut self.tasks);
        self.prio_tbl.insert(prio);
    }

    /// Remove a task from its ready list
    pub(crate) fn rdy_remove(&mut self, id: TaskId) {
        let prio = self.tasks[id.index()].prio;
        let list = &mut self.rdy_list[prio as usize];
        list.remove(id, &mut self.tasks);
        if list.is_empty() {
            self.prio_tbl.remove(prio);
        }
    }

    /// Change a task's effective priority, keeping every list it is in sorted
    ///
    /// A ready or running task moves to the tail of its new ready list; a
    /// blocked task is re-sorted in its wait list.
    #[cfg_attr(not(feature = "mutex"), allow(dead_code))]
    pub(crate) fn change_prio(&mut self, id: TaskId, prio: OsPrio) {
        let (old, state) = {
            let tcb = &self.tasks[id.index()];
            (tcb.prio, tcb.state)
        };
        if old == prio {
            return;
        }
        crate::debug!("task {} priority {} -> {}", id, old, prio);

        match state {
            OsTaskState::Ready | OsTaskState::Running => {
                self.rdy_remove(id);
                self.tasks[id.index()].prio = prio;
                self.rdy_insert(id);
            }
            OsTaskState::Blocked => {
                self.tasks[id.index()].prio = prio;
                let on = self.tasks[id.index()].pend_on;
                self.with_wait_list(on, |list, tasks| list.reposition(id, tasks));
            }
            OsTaskState::Delayed => {
                self.tasks[id.index()].prio = prio;
            }
        }
    }

    /// Task that should own the CPU
    ///
    /// The running task keeps the CPU against equal priorities; only its own
    /// yield, block or time-slice expiry lets a peer in.
    pub(crate) fn find_high_rdy(&self) -> Option<TaskId> {
        let prio = self.prio_tbl.get_highest()?;

        if let Some(cur) = self.cur {
            let tcb = &self.tasks[cur.index()];
            if tcb.state == OsTaskState::Running && tcb.prio >= prio {
                return Some(cur);
            }
        }

        self.rdy_list[prio as usize].head()
    }

    /// Main scheduling point
    ///
    /// Records a pending switch if a more urgent task is ready. Returns `true`
    /// when the switch can be requested right away, `false` when nothing
    /// changes or the request is deferred to interrupt exit.
    pub fn schedule(&mut self) -> bool {
        if !self.running {
            return false;
        }

        let next = self.find_high_rdy();
        if next == self.cur {
            if let Some(cur) = self.cur {
                self.tasks[cur.index()].state = OsTaskState::Running;
            }
            self.switch_pending = false;
            return false;
        }

        self.switch_pending = true;
        self.int_nesting == 0
    }

    /// Hand the CPU to the most urgent ready task
    ///
    /// Called by the port's context switch handler with the outgoing
    /// context already saved. Returns the task now running.
    pub fn complete_switch(&mut self) -> Option<TaskId> {
        self.switch_pending = false;
        let next = self.find_high_rdy()?;

        if let Some(old) = self.cur {
            let tcb = &mut self.tasks[old.index()];
            if old != next && tcb.state == OsTaskState::Running {
                tcb.state = OsTaskState::Ready;
            }
        }

        let tcb = &mut self.tasks[next.index()];
        if self.cur != Some(next) {
            tcb.time_quanta_ctr = tcb.time_quanta;
            crate::trace!("switch to {}", next);
        }
        tcb.state = OsTaskState::Running;
        self.cur = Some(next);
        Some(next)
    }

    /// Give up the CPU to the next ready task of the same priority
    pub fn yield_now(&mut self) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::YieldIsr);
        }
        let me = self.cur_task()?;

        let prio = self.tasks[me.index()].prio;
        let list = &mut self.rdy_list[prio as usize];
        list.remove(me, &mut self.tasks);
        list.insert_tail(me, &mut self.tasks);
        self.tasks[me.index()].state = OsTaskState::Ready;

        self.schedule();
        Ok(())
    }

    /// Round-robin scheduling for tasks at the same priority
    ///
    /// Charges one tick to the running task; when its quanta runs out it is
    /// rotated behind its ready peers.
    pub(crate) fn round_robin(&mut self) {
        if !CFG_SCHED_ROUND_ROBIN_EN {
            return;
        }
        let Some(cur) = self.cur else {
            return;
        };

        let tcb = &mut self.tasks[cur.index()];
        if tcb.state != OsTaskState::Running {
            return;
        }

        tcb.time_quanta_ctr = tcb.time_quanta_ctr.saturating_sub(1);
        if tcb.time_quanta_ctr > 0 {
            return;
        }
        tcb.time_quanta_ctr = tcb.time_quanta;

        let prio = tcb.prio as usize;
        if self.rdy_list[prio].count() < 2 {
            return;
        }

        let list = &mut self.rdy_list[prio];
        list.remove(cur, &mut self.tasks);
        list.insert_tail(cur, &mut self.tasks);
        self.tasks[cur.index()].state = OsTaskState::Ready;
    }
}

/// Run the scheduler on the global kernel
pub fn os_sched() {
    os_call(|k| {
        k.schedule();
    });
}

/// Yield the CPU to the next ready task of equal priority
///
/// Like [`os_time_dly`](crate::time::os_time_dly), stops the system when
/// called from an ISR or before the scheduler runs.
pub fn os_yield() {
    if let Err(err) = os_call(|k| k.yield_now()) {
        os_fatal(err);
    }
}
