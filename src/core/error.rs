//! Error types for the RTOS core
//!
//! Uses Rust's Result pattern instead of C-style error pointers. Each error
//! belongs to one [`ErrorKind`], which decides how the handle-level API
//! treats it: resource exhaustion and timeouts are ordinary return values,
//! usage errors and stack overflow are fatal.

/// RTOS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ ISR errors ============
    /// Cannot create object from ISR
    CreateIsr = 12001,

    // ============ Object errors ============
    /// Object already created
    ObjCreated = 24001,
    /// Handle does not name a created object
    ObjInvalid = 24004,
    /// Object table is full
    ObjNoMore = 24005,

    // ============ OS state errors ============
    /// OS is not running
    OsNotRunning = 24201,
    /// OS is already running
    OsRunning = 24202,
    /// OS not initialized
    OsNotInit = 24203,
    /// No application task created
    OsNoAppTask = 24204,

    // ============ Pend errors ============
    /// Cannot block from ISR
    PendIsr = 25006,

    // ============ Mutex errors ============
    /// Caller is not the mutex owner
    MutexNotOwner = 22401,
    /// Task already owns the mutex (mutexes are not recursive)
    MutexOwner = 22402,

    // ============ Priority errors ============
    /// Invalid priority
    PrioInvalid = 25203,

    // ============ Queue errors ============
    /// Queue is full
    QFull = 26001,
    /// Queue is empty
    QEmpty = 26002,
    /// Capacity is zero
    QSizeInvalid = 26005,
    /// Item does not match the queue's item size
    QItemSize = 26006,
    /// Queue storage pool is exhausted
    QPoolEmpty = 26007,

    // ============ Semaphore errors ============
    /// Semaphore overflow
    SemOvf = 28101,
    /// Maximum is zero or initial count exceeds it
    SemCountInvalid = 28102,

    // ============ Stack errors ============
    /// Invalid stack size
    StkSizeInvalid = 28208,
    /// Stack overflow detected
    StkOvf = 28210,
    /// Stack pool is exhausted
    StkPoolEmpty = 28211,

    // ============ Task errors ============
    /// Cannot create task from ISR
    TaskCreateIsr = 29002,
    /// No more TCBs available
    TaskNoMoreTcb = 29008,

    // ============ Time errors ============
    /// Cannot delay from ISR
    TimeDlyIsr = 29301,

    // ============ Timeout ============
    /// Operation timed out
    Timeout = 29401,

    // ============ Yield errors ============
    /// Cannot yield from ISR
    YieldIsr = 34001,
}

/// Result type alias for RTOS operations
pub type OsResult<T> = Result<T, OsError>;

/// Error classes and their propagation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// A bounded resource is full or empty; the caller decides
    ResourceExhausted,
    /// A wait expired; the caller decides
    Timeout,
    /// The caller broke an API contract; programming defect
    UsageError,
    /// A task ran past its stack; unrecoverable
    StackOverflow,
    /// Setup or lifecycle misconfiguration
    Config,
}

impl OsError {
    /// Classify the error
    pub const fn kind(self) -> ErrorKind {
        match self {
            OsError::QFull
            | OsError::QEmpty
            | OsError::SemOvf
            | OsError::ObjNoMore
            | OsError::QPoolEmpty
            | OsError::StkPoolEmpty
            | OsError::TaskNoMoreTcb => ErrorKind::ResourceExhausted,
            OsError::Timeout => ErrorKind::Timeout,
            OsError::StkOvf => ErrorKind::StackOverflow,
            OsError::OsNotInit
            | OsError::OsRunning
            | OsError::OsNoAppTask
            | OsError::OsNotRunning
            | OsError::StkSizeInvalid
            | OsError::SemCountInvalid
            | OsError::QSizeInvalid => ErrorKind::Config,
            OsError::CreateIsr
            | OsError::ObjCreated
            | OsError::ObjInvalid
            | OsError::PendIsr
            | OsError::MutexNotOwner
            | OsError::MutexOwner
            | OsError::PrioInvalid
            | OsError::QItemSize
            | OsError::TaskCreateIsr
            | OsError::TimeDlyIsr
            | OsError::YieldIsr => ErrorKind::UsageError,
        }
    }

    /// Whether the error must stop the system rather than be handled
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(self.kind(), ErrorKind::UsageError | ErrorKind::StackOverflow)
    }

    /// Numeric error code
    #[inline]
    pub const fn code(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(OsError::SemOvf.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(OsError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(OsError::MutexNotOwner.kind(), ErrorKind::UsageError);
        assert_eq!(OsError::StkOvf.kind(), ErrorKind::StackOverflow);
    }

    #[test]
    fn test_fatal() {
        assert!(OsError::MutexOwner.is_fatal());
        assert!(OsError::StkOvf.is_fatal());
        assert!(!OsError::QFull.is_fatal());
        assert!(!OsError::Timeout.is_fatal());
        assert!(!OsError::OsNoAppTask.is_fatal());
    }
}
