//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information needed to manage a task. TCBs live
//! in the kernel's task table and link to each other by [`TaskId`], so the
//! ready, pend and tick lists are intrusive lists threaded through this
//! table.

use crate::config::CFG_QUEUE_ITEM_MAX;
use crate::task::stack::StackRegion;
use crate::task::OsTaskFn;
use crate::types::{MutexId, OsPendOn, OsPendStatus, OsPrio, OsTaskState, OsTick, TaskId};

/// Set of mutexes held by a task
///
/// Every held mutex with waiters is a priority boost the task owes back; its
/// effective priority is recomputed from this set whenever it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutexSet(u32);

impl MutexSet {
    pub const fn new() -> Self {
        MutexSet(0)
    }

    #[inline]
    pub fn insert(&mut self, id: MutexId) {
        self.0 |= 1 << id.index();
    }

    #[inline]
    pub fn remove(&mut self, id: MutexId) {
        self.0 &= !(1 << id.index());
    }

    #[inline]
    pub fn contains(&self, id: MutexId) -> bool {
        self.0 & (1 << id.index()) != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Held mutexes in ascending handle order
    pub fn iter(&self) -> impl Iterator<Item = MutexId> {
        let bits = self.0;
        (0..32u8).filter(move |&i| bits & (1u32 << i) != 0).map(MutexId)
    }
}

/// Task Control Block
pub struct OsTcb {
    // ============ Stack ============
    /// Saved stack pointer (address of the saved context)
    pub(crate) stk_ptr: usize,
    /// Region of the stack pool owned by this task
    pub(crate) stk: StackRegion,

    // ============ Task identification ============
    /// Task name
    pub(crate) name: &'static str,
    /// Entry point
    pub(crate) entry: Option<OsTaskFn>,

    // ============ Ready list links ============
    pub(crate) next: Option<TaskId>,
    pub(crate) prev: Option<TaskId>,

    // ============ Pend list links ============
    pub(crate) pend_next: Option<TaskId>,
    pub(crate) pend_prev: Option<TaskId>,
    /// Object this task is pending on
    pub(crate) pend_on: OsPendOn,
    /// Result of the last pend operation
    pub(crate) pend_status: OsPendStatus,

    // ============ Tick list links ============
    pub(crate) tick_next: Option<TaskId>,
    pub(crate) tick_prev: Option<TaskId>,
    /// Tick at which a delay or timeout expires
    pub(crate) wake_at: OsTick,
    pub(crate) in_tick_list: bool,

    // ============ Priority ============
    /// Effective priority (base, possibly raised by inheritance)
    pub(crate) prio: OsPrio,
    /// Priority the task was created with
    pub(crate) base_prio: OsPrio,
    /// Mutexes currently held
    pub(crate) held: MutexSet,

    // ============ State ============
    pub(crate) state: OsTaskState,

    // ============ Time slicing ============
    pub(crate) time_quanta: OsTick,
    pub(crate) time_quanta_ctr: OsTick,

    // ============ Queue transfer ============
    /// Item handed over directly between a queue and a blocked task
    pub(crate) xfer: [u8; CFG_QUEUE_ITEM_MAX],
}

impl OsTcb {
    /// Create a new, unused TCB
    pub const fn new() -> Self {
        OsTcb {
            stk_ptr: 0,
            stk: StackRegion::EMPTY,

            name: "",
            entry: None,

            next: None,
            prev: None,

            pend_next: None,
            pend_prev: None,
            pend_on: OsPendOn::Nothing,
            pend_status: OsPendStatus::Ok,

            tick_next: None,
            tick_prev: None,
            wake_at: 0,
            in_tick_list: false,

            prio: 0,
            base_prio: 0,
            held: MutexSet::new(),

            state: OsTaskState::Ready,

            time_quanta: 0,
            time_quanta_ctr: 0,

            xfer: [0; CFG_QUEUE_ITEM_MAX],
        }
    }

    /// Check if task is ready to run (including the running task)
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self.state, OsTaskState::Ready | OsTaskState::Running)
    }

    /// Check if task is pending on an object
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.state == OsTaskState::Blocked
    }

    /// Check if task is delayed
    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.state == OsTaskState::Delayed
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutex_set() {
        let mut set = MutexSet::new();
        assert!(set.is_empty());

        set.insert(MutexId(3));
        set.insert(MutexId(0));
        assert!(set.contains(MutexId(3)));
        assert!(!set.contains(MutexId(1)));

        let mut it = set.iter();
        assert_eq!(it.next(), Some(MutexId(0)));
        assert_eq!(it.next(), Some(MutexId(3)));
        assert_eq!(it.next(), None);

        set.remove(MutexId(0));
        set.remove(MutexId(3));
        assert!(set.is_empty());
    }
}
