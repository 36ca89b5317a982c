//! Synchronization primitives
//!
//! Contains semaphores, mutexes and message queues. The kernel-level
//! operations live on [`Kernel`](crate::kernel::Kernel) and work on object
//! handles; the `Semaphore`, `Mutex` and `Queue` types wrap them as
//! statically allocatable handles for task code.

pub mod pend_list;

#[cfg(feature = "sem")]
pub mod sem;

#[cfg(feature = "mutex")]
pub mod mutex;

#[cfg(feature = "queue")]
pub mod queue;

use portable_atomic::{AtomicU8, Ordering};

#[cfg(any(feature = "sem", feature = "mutex", feature = "queue"))]
use crate::error::{OsError, OsResult};

/// Kernel object slot a static handle is bound to
pub(crate) struct HandleCell(AtomicU8);

#[cfg_attr(not(any(feature = "sem", feature = "mutex", feature = "queue")), allow(dead_code))]
impl HandleCell {
    const UNBOUND: u8 = u8::MAX;

    pub(crate) const fn new() -> Self {
        HandleCell(AtomicU8::new(Self::UNBOUND))
    }

    /// Fail with `ObjCreated` if already bound
    #[cfg(any(feature = "sem", feature = "mutex", feature = "queue"))]
    pub(crate) fn ensure_unbound(&self) -> OsResult<()> {
        match self.0.load(Ordering::Acquire) {
            Self::UNBOUND => Ok(()),
            _ => Err(OsError::ObjCreated),
        }
    }

    pub(crate) fn bind(&self, raw: u8) {
        self.0.store(raw, Ordering::Release);
    }

    pub(crate) fn get(&self) -> Option<u8> {
        match self.0.load(Ordering::Acquire) {
            Self::UNBOUND => None,
            raw => Some(raw),
        }
    }
}
