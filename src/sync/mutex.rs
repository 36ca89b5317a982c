//! Mutex implementation with priority inheritance
//!
//! Mutexes provide mutual exclusion with automatic priority boosting
//! to prevent priority inversion.
//!
//! A task's effective priority is never patched in place. It is recomputed
//! from its base priority and the most urgent waiter of every mutex it
//! holds, and the recomputation follows the chain when the holder is itself
//! blocked on another mutex. Releasing a mutex therefore drops the holder
//! back to exactly the level it still owes, base or a remaining boost.

use crate::config::{CFG_MAX_MUTEXES, CFG_MAX_TASKS};
use crate::error::{OsError, OsResult};
use crate::kernel::{os_call, os_fatal, os_pend_finish, Kernel};
use crate::sync::pend_list::PendList;
use crate::sync::HandleCell;
use crate::types::{GiveResult, MutexId, OsPendOn, OsPendStatus, OsTaskState, Pend, TakeResult, TaskId, Timeout};

/// Mutex with priority inheritance
pub struct OsMutex {
    /// List of tasks waiting on this mutex
    pub(crate) pend_list: PendList,
    /// Task that owns the mutex
    owner: Option<TaskId>,
    /// Name for debugging
    name: &'static str,
    created: bool,
}

impl OsMutex {
    pub const fn new() -> Self {
        OsMutex {
            pend_list: PendList::new(),
            owner: None,
            name: "",
            created: false,
        }
    }

    #[inline(always)]
    pub fn owner(&self) -> Option<TaskId> {
        self.owner
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for OsMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Create a free mutex
    pub fn mutex_create(&mut self, name: &'static str) -> OsResult<MutexId> {
        if self.in_isr() {
            return Err(OsError::CreateIsr);
        }
        if self.mutex_cnt >= CFG_MAX_MUTEXES {
            return Err(OsError::ObjNoMore);
        }

        let id = MutexId(self.mutex_cnt as u8);
        self.mutex_cnt += 1;
        self.mutexes[id.index()] = OsMutex {
            pend_list: PendList::new(),
            owner: None,
            name,
            created: true,
        };
        crate::debug!("mutex {} created", name);
        Ok(id)
    }

    fn mutex(&mut self, id: MutexId) -> OsResult<&mut OsMutex> {
        self.mutexes
            .get_mut(id.index())
            .filter(|m| m.created)
            .ok_or(OsError::ObjInvalid)
    }

    /// Mutex table entry
    pub fn mutex_ref(&self, id: MutexId) -> OsResult<&OsMutex> {
        self.mutexes
            .get(id.index())
            .filter(|m| m.created)
            .ok_or(OsError::ObjInvalid)
    }

    /// Task holding the mutex, if any
    pub fn mutex_owner(&self, id: MutexId) -> OsResult<Option<TaskId>> {
        self.mutex_ref(id).map(OsMutex::owner)
    }

    /// Acquire the mutex
    ///
    /// If the mutex is owned by another task, the caller blocks and the
    /// owner (and whoever the owner waits for) inherits its priority.
    ///
    /// # Returns
    /// * `Ok(Pend::Acquired)` - The caller now owns the mutex
    /// * `Ok(Pend::TimedOut)` - Owned elsewhere and the caller may not block
    /// * `Ok(Pend::Blocked)` - The caller is now waiting
    /// * `Err(OsError::MutexOwner)` - The caller already owns it
    /// * `Err(OsError::PendIsr)` - Called from an ISR
    pub fn mutex_take(&mut self, id: MutexId, timeout: Timeout) -> OsResult<Pend> {
        if self.in_isr() {
            return Err(OsError::PendIsr);
        }
        let me = self.cur_task()?;

        let mutex = self.mutex(id)?;
        let owner = match mutex.owner {
            None => {
                mutex.owner = Some(me);
                self.tasks[me.index()].held.insert(id);
                return Ok(Pend::Acquired);
            }
            Some(owner) if owner == me => return Err(OsError::MutexOwner),
            Some(owner) => owner,
        };

        if !timeout.may_block() {
            return Ok(Pend::TimedOut);
        }

        self.pend_current(me, OsPendOn::Mutex(id), timeout);
        self.recompute_prio(owner);
        self.schedule();
        Ok(Pend::Blocked)
    }

    /// Release the mutex
    ///
    /// Ownership passes straight to the most urgent waiter, and the caller
    /// drops to the priority it still owes.
    pub fn mutex_give(&mut self, id: MutexId) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::PendIsr);
        }
        let me = self.cur_task()?;

        let mutex = self.mutex(id)?;
        if mutex.owner != Some(me) {
            return Err(OsError::MutexNotOwner);
        }
        let waiter = mutex.pend_list.head();
        self.tasks[me.index()].held.remove(id);

        match waiter {
            Some(waiter) => {
                self.pend_wake(waiter, OsPendStatus::Ok);
                self.mutexes[id.index()].owner = Some(waiter);
                self.tasks[waiter.index()].held.insert(id);
                self.recompute_prio(waiter);
            }
            None => self.mutexes[id.index()].owner = None,
        }

        self.recompute_prio(me);
        self.schedule();
        Ok(())
    }

    /// Re-derive the effective priority of `id` and of every task it waits on
    ///
    /// The walk stops at the first task whose priority does not change; the
    /// bound only guards against a malformed wait-for cycle.
    pub(crate) fn recompute_prio(&mut self, id: TaskId) {
        let mut task = id;

        for _ in 0..CFG_MAX_TASKS {
            let tcb = &self.tasks[task.index()];
            let owed = tcb
                .held
                .iter()
                .filter_map(|m| self.mutexes[m.index()].pend_list.head())
                .map(|w| self.tasks[w.index()].prio)
                .fold(tcb.base_prio, core::cmp::max);

            if owed == tcb.prio {
                return;
            }
            self.change_prio(task, owed);

            let tcb = &self.tasks[task.index()];
            let next = match (tcb.state, tcb.pend_on) {
                (OsTaskState::Blocked, OsPendOn::Mutex(m)) => self.mutexes[m.index()].owner,
                _ => None,
            };
            match next {
                Some(owner) => task = owner,
                None => return,
            }
        }
    }

    /// A waiter left the mutex's wait list without taking it
    pub(crate) fn mutex_waiter_left(&mut self, id: MutexId) {
        if let Some(owner) = self.mutexes[id.index()].owner {
            self.recompute_prio(owner);
        }
    }
}

/// Statically allocatable mutex handle
///
/// ```ignore
/// static UART_LOCK: Mutex = Mutex::new();
///
/// UART_LOCK.create("UART")?;
/// if UART_LOCK.take(Timeout::Forever).is_acquired() {
///     // ...
///     UART_LOCK.give();
/// }
/// ```
pub struct Mutex {
    id: HandleCell,
}

impl Mutex {
    pub const fn new() -> Self {
        Mutex { id: HandleCell::new() }
    }

    /// Create the mutex in the given kernel and bind this handle to it
    pub fn create_in(&self, k: &mut Kernel, name: &'static str) -> OsResult<MutexId> {
        self.id.ensure_unbound()?;
        let id = k.mutex_create(name)?;
        self.id.bind(id.0);
        Ok(id)
    }

    pub fn create(&self, name: &'static str) -> OsResult<()> {
        os_call(|k| self.create_in(k, name)).map(|_| ())
    }

    /// Kernel handle of this mutex
    pub fn id(&self) -> MutexId {
        match self.id.get() {
            Some(raw) => MutexId(raw),
            None => os_fatal(OsError::ObjInvalid),
        }
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.id.get().is_some()
    }

    /// Acquire the mutex
    pub fn take(&self, timeout: impl Into<Timeout>) -> TakeResult {
        let id = self.id();
        let timeout = timeout.into();
        os_pend_finish(os_call(|k| k.mutex_take(id, timeout)))
    }

    /// Release the mutex; only the owner may
    ///
    /// Always `GiveResult::Ok`: a mutex is never given while free, since a
    /// give by anyone but the owner stops the system.
    pub fn give(&self) -> GiveResult {
        let id = self.id();
        match os_call(|k| k.mutex_give(id)) {
            Ok(()) => GiveResult::Ok,
            Err(err) => os_fatal(err),
        }
    }

    /// Task holding the mutex
    pub fn owner(&self) -> Option<TaskId> {
        let id = self.id();
        os_call(|k| k.mutex_owner(id)).unwrap_or_else(|err| os_fatal(err))
    }

    #[inline]
    pub fn is_owned(&self) -> bool {
        self.owner().is_some()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
