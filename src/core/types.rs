//! Core type definitions
//!
//! These types provide strong typing for RTOS primitives.

/// Task priority (higher value = more urgent, 0 = idle)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Semaphore counter type
pub type OsSemCtr = u32;

/// Nesting counter
pub type OsNestingCtr = u8;

/// Stack element type
pub type OsStkElement = u32;

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(pub(crate) u8);

        impl $name {
            /// Slot of this object in its kernel table
            #[inline(always)]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

object_id!(
    /// Handle of a task
    TaskId
);
object_id!(
    /// Handle of a binary or counting semaphore
    SemId
);
object_id!(
    /// Handle of a mutex
    MutexId
);
object_id!(
    /// Handle of a message queue
    QueueId
);

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsTaskState {
    /// Task is ready to run
    Ready = 0,
    /// Task owns the CPU
    Running = 1,
    /// Task is waiting on a kernel object
    Blocked = 2,
    /// Task is sleeping until a tick deadline
    Delayed = 3,
}

/// What the task is pending on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OsPendOn {
    Nothing,
    Semaphore(SemId),
    Mutex(MutexId),
    /// Waiting for a free slot
    QueueSend(QueueId),
    /// Waiting for an item
    QueueRecv(QueueId),
}

/// Pend status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsPendStatus {
    /// Pend succeeded
    Ok = 0,
    /// Timeout occurred
    Timeout = 1,
}

/// How long a blocking call may wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Never block, fail immediately if the resource is unavailable
    NoWait,
    /// Block for at most this many ticks
    Ticks(OsTick),
    /// Block until the resource becomes available
    Forever,
}

impl Timeout {
    /// Whether this timeout allows the caller to block at all
    #[inline]
    pub const fn may_block(self) -> bool {
        !matches!(self, Timeout::NoWait | Timeout::Ticks(0))
    }
}

impl From<OsTick> for Timeout {
    fn from(ticks: OsTick) -> Self {
        match ticks {
            0 => Timeout::NoWait,
            n => Timeout::Ticks(n),
        }
    }
}

/// Result of a wait that may time out
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TakeResult {
    /// The resource was obtained
    Acquired,
    /// The timeout expired first
    TimedOut,
}

impl TakeResult {
    #[inline]
    pub const fn is_acquired(self) -> bool {
        matches!(self, TakeResult::Acquired)
    }
}

/// Result of a semaphore give
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GiveResult {
    /// The count was incremented or a waiter was released
    Ok,
    /// The semaphore was already at its maximum; nothing changed
    AlreadyFull,
}

/// Kernel-level outcome of a call that may block the current task
///
/// `Blocked` means the caller has been moved off the ready lists and a
/// context switch is pending; the final [`TakeResult`] is read back with
/// `Kernel::pend_result` once the task runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pend {
    Acquired,
    TimedOut,
    Blocked,
}

impl Pend {
    /// The result, when the call completed without blocking
    #[inline]
    pub const fn resolved(self) -> Option<TakeResult> {
        match self {
            Pend::Acquired => Some(TakeResult::Acquired),
            Pend::TimedOut => Some(TakeResult::TimedOut),
            Pend::Blocked => None,
        }
    }
}
