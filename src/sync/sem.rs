//! Semaphore implementation
//!
//! Binary and counting semaphores for task synchronization, resource
//! counting and interrupt-to-task signalling.
//!
//! A give with a task waiting hands the unit straight to the most urgent
//! waiter, so the count stays at zero and the waiter's take succeeds
//! without racing any other taker. A give at the maximum count is a no-op
//! reported as [`GiveResult::AlreadyFull`].

use crate::config::CFG_MAX_SEMS;
use crate::error::{OsError, OsResult};
use crate::kernel::{os_call, os_fatal, os_pend_finish, Kernel};
use crate::sync::pend_list::PendList;
use crate::sync::HandleCell;
use crate::types::{GiveResult, OsPendOn, OsPendStatus, OsSemCtr, Pend, SemId, TakeResult, TaskId, Timeout};

/// Counting semaphore
pub struct OsSem {
    /// List of tasks waiting on this semaphore
    pub(crate) pend_list: PendList,
    /// Current count
    count: OsSemCtr,
    /// Maximum count (1 for a binary semaphore)
    max: OsSemCtr,
    /// Name for debugging
    name: &'static str,
    created: bool,
}

impl OsSem {
    pub const fn new() -> Self {
        OsSem {
            pend_list: PendList::new(),
            count: 0,
            max: 0,
            name: "",
            created: false,
        }
    }

    #[inline(always)]
    pub fn count(&self) -> OsSemCtr {
        self.count
    }

    #[inline(always)]
    pub fn max(&self) -> OsSemCtr {
        self.max
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Default for OsSem {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Create a semaphore counting in `[0, max]`, starting at `initial`
    pub fn sem_create(&mut self, name: &'static str, max: OsSemCtr, initial: OsSemCtr) -> OsResult<SemId> {
        if self.in_isr() {
            return Err(OsError::CreateIsr);
        }
        if max == 0 || initial > max {
            return Err(OsError::SemCountInvalid);
        }
        if self.sem_cnt >= CFG_MAX_SEMS {
            return Err(OsError::ObjNoMore);
        }

        let id = SemId(self.sem_cnt as u8);
        self.sem_cnt += 1;
        self.sems[id.index()] = OsSem {
            pend_list: PendList::new(),
            count: initial,
            max,
            name,
            created: true,
        };
        crate::debug!("semaphore {} created, max {}", name, max);
        Ok(id)
    }

    fn sem(&mut self, id: SemId) -> OsResult<&mut OsSem> {
        self.sems
            .get_mut(id.index())
            .filter(|sem| sem.created)
            .ok_or(OsError::ObjInvalid)
    }

    /// Semaphore table entry
    pub fn sem_ref(&self, id: SemId) -> OsResult<&OsSem> {
        self.sems
            .get(id.index())
            .filter(|sem| sem.created)
            .ok_or(OsError::ObjInvalid)
    }

    /// Current count
    pub fn sem_count(&self, id: SemId) -> OsResult<OsSemCtr> {
        self.sem_ref(id).map(OsSem::count)
    }

    /// Wait on (pend) the semaphore
    ///
    /// Interrupt handlers may only poll with `Timeout::NoWait`.
    ///
    /// # Returns
    /// * `Ok(Pend::Acquired)` - A unit was taken
    /// * `Ok(Pend::TimedOut)` - Unavailable and the caller may not block
    /// * `Ok(Pend::Blocked)` - The caller is now waiting
    /// * `Err(OsError::PendIsr)` - Blocking take from an ISR
    pub fn sem_take(&mut self, id: SemId, timeout: Timeout) -> OsResult<Pend> {
        let sem = self.sem(id)?;
        if sem.count > 0 {
            sem.count -= 1;
            return Ok(Pend::Acquired);
        }

        if !timeout.may_block() {
            return Ok(Pend::TimedOut);
        }
        if self.in_isr() {
            return Err(OsError::PendIsr);
        }

        let me = self.cur_task()?;
        self.pend_current(me, OsPendOn::Semaphore(id), timeout);
        self.schedule();
        Ok(Pend::Blocked)
    }

    /// Release one unit, waking the top waiter if there is one
    ///
    /// Returns the woken task, or `SemOvf` when already at the maximum.
    fn sem_post(&mut self, id: SemId) -> OsResult<Option<TaskId>> {
        if let Some(waiter) = self.sem(id)?.pend_list.head() {
            self.pend_wake(waiter, OsPendStatus::Ok);
            return Ok(Some(waiter));
        }

        let sem = self.sem(id)?;
        if sem.count >= sem.max {
            return Err(OsError::SemOvf);
        }
        sem.count += 1;
        Ok(None)
    }

    /// Signal (post) the semaphore from task context
    pub fn sem_give(&mut self, id: SemId) -> OsResult<GiveResult> {
        match self.sem_post(id) {
            Ok(woken) => {
                if woken.is_some() {
                    self.schedule();
                }
                Ok(GiveResult::Ok)
            }
            Err(OsError::SemOvf) => Ok(GiveResult::AlreadyFull),
            Err(err) => Err(err),
        }
    }

    /// Signal the semaphore from an interrupt handler
    ///
    /// Never blocks and never switches. Returns `true` when the woken task
    /// is more urgent than the interrupted one; the switch then happens at
    /// interrupt exit.
    pub fn sem_give_from_isr(&mut self, id: SemId) -> OsResult<bool> {
        match self.sem_post(id) {
            Ok(Some(woken)) => {
                let higher = self
                    .cur
                    .is_none_or(|cur| self.tasks[woken.index()].prio > self.tasks[cur.index()].prio);
                if higher {
                    self.switch_pending = true;
                }
                Ok(higher)
            }
            Ok(None) | Err(OsError::SemOvf) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Statically allocatable semaphore handle
///
/// ```ignore
/// static BUTTON: Semaphore = Semaphore::new();
///
/// BUTTON.binary("Button")?;
/// if BUTTON.take(Timeout::Forever).is_acquired() { ... }
/// ```
pub struct Semaphore {
    id: HandleCell,
}

impl Semaphore {
    pub const fn new() -> Self {
        Semaphore { id: HandleCell::new() }
    }

    /// Create the semaphore in the given kernel and bind this handle to it
    pub fn create_in(
        &self,
        k: &mut Kernel,
        name: &'static str,
        max: OsSemCtr,
        initial: OsSemCtr,
    ) -> OsResult<SemId> {
        self.id.ensure_unbound()?;
        let id = k.sem_create(name, max, initial)?;
        self.id.bind(id.0);
        Ok(id)
    }

    /// Create a counting semaphore
    pub fn create(&self, name: &'static str, max: OsSemCtr, initial: OsSemCtr) -> OsResult<()> {
        os_call(|k| self.create_in(k, name, max, initial)).map(|_| ())
    }

    /// Create a binary semaphore, initially taken
    pub fn binary(&self, name: &'static str) -> OsResult<()> {
        self.create(name, 1, 0)
    }

    /// Kernel handle of this semaphore
    pub fn id(&self) -> SemId {
        match self.id.get() {
            Some(raw) => SemId(raw),
            None => os_fatal(OsError::ObjInvalid),
        }
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.id.get().is_some()
    }

    /// Wait for a unit
    pub fn take(&self, timeout: impl Into<Timeout>) -> TakeResult {
        let id = self.id();
        let timeout = timeout.into();
        os_pend_finish(os_call(|k| k.sem_take(id, timeout)))
    }

    /// Release a unit
    pub fn give(&self) -> GiveResult {
        let id = self.id();
        os_call(|k| k.sem_give(id)).unwrap_or_else(|err| os_fatal(err))
    }

    /// Release a unit from an interrupt handler
    ///
    /// Must be bracketed by `os_int_enter`/`os_int_exit`.
    pub fn give_from_isr(&self) -> bool {
        let id = self.id();
        os_call(|k| k.sem_give_from_isr(id)).unwrap_or_else(|err| os_fatal(err))
    }

    /// Current count
    pub fn count(&self) -> OsSemCtr {
        let id = self.id();
        os_call(|k| k.sem_count(id)).unwrap_or_else(|err| os_fatal(err))
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
