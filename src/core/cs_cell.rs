//! Critical section protected cell
//!
//! Zero-overhead wrapper for data that must be accessed within critical sections.

use core::cell::UnsafeCell;
use crate::critical::CriticalSection;

/// A cell that can only be accessed within a critical section.
pub struct CsCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    /// Create a new CsCell
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Get a mutable reference to the inner value
    ///
    /// The borrow is tied to the guard; callers must not hold two borrows of
    /// the same cell at once.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get<'a>(&'a self, _cs: &'a CriticalSection) -> &'a mut T {
        unsafe { &mut *self.0.get() }
    }

    /// Get a mutable reference without requiring a CriticalSection guard
    ///
    /// # Safety
    /// Interrupts must already be masked (e.g. inside PendSV after `cpsid i`)
    /// and no other reference to the value may be live.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_unchecked(&self) -> &mut T {
        unsafe { &mut *self.0.get() }
    }
}
