//! Critical section handling
//!
//! All kernel state is mutated with interrupts masked. The guard saves the
//! previous interrupt state through the `critical-section` crate, so nested
//! sections (a kernel call made from an ISR, or a section opened inside
//! another) restore exactly what they found.

use critical_section::RestoreState;

/// RAII guard for critical sections
///
/// When this guard is created, interrupts are disabled.
/// When it is dropped, interrupts are restored to their previous state.
pub struct CriticalSection {
    restore: RestoreState,
}

impl CriticalSection {
    /// Enter a critical section by disabling interrupts.
    ///
    /// Returns a guard that will restore interrupt state when dropped.
    #[inline(always)]
    pub fn enter() -> Self {
        // SAFETY: released exactly once, in `Drop`, in LIFO order with
        // any guard created after this one.
        let restore = unsafe { critical_section::acquire() };
        CriticalSection { restore }
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        // SAFETY: `restore` came from the matching `acquire` in `enter`.
        unsafe { critical_section::release(self.restore) };
    }
}

/// Execute a closure with interrupts disabled
///
/// The closure receives a reference to the critical section guard,
/// which can be used to access [`CsCell`](crate::core::cs_cell::CsCell)
/// protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Check if currently executing in an ISR context
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_sections() {
        let v = critical_section(|_outer| critical_section(|_inner| 7));
        assert_eq!(v, 7);
    }
}
