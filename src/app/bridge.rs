//! Interrupt-to-task signal bridge
//!
//! Maps edge-triggered interrupt lines to semaphores. The handler
//! acknowledges the fired lines at the source before signalling, so a
//! still-asserted line cannot re-enter the handler before the tasks react,
//! and leaves any task switch to the single exit point in `os_int_exit`.
//!
//! Several lines may share one semaphore. The two buttons of the scenario
//! do, so one waiting task reacts to either; routing each line to its own
//! semaphore lets the consumer tell them apart.

use crate::bsp::EdgeSource;
use crate::error::OsResult;
use crate::kernel::{os_call, os_check, os_int_enter, os_int_exit, Kernel};
use crate::sync::sem::Semaphore;

/// Lines routed to one semaphore
pub struct Route<'a> {
    pub mask: u32,
    pub sem: &'a Semaphore,
}

impl<'a> Route<'a> {
    pub const fn new(mask: u32, sem: &'a Semaphore) -> Self {
        Route { mask, sem }
    }
}

/// Routing table of an edge interrupt
pub struct SignalBridge<'a, const N: usize> {
    routes: [Route<'a>; N],
}

impl<'a, const N: usize> SignalBridge<'a, N> {
    pub const fn new(routes: [Route<'a>; N]) -> Self {
        SignalBridge { routes }
    }

    /// Every routed line
    pub fn mask(&self) -> u32 {
        self.routes.iter().fold(0, |acc, r| acc | r.mask)
    }

    /// Acknowledge the fired lines and give their semaphores
    ///
    /// Must run between `int_enter` and `int_exit`. Each route with a fired
    /// line gives its semaphore once; a semaphore already at its maximum
    /// drops the give, and so does one not created yet. Returns whether a
    /// more urgent task was woken.
    pub fn dispatch(&self, k: &mut Kernel, src: &mut impl EdgeSource) -> OsResult<bool> {
        let fired = src.pending() & self.mask();
        src.clear(fired);

        let mut woken = false;
        for route in self.routes.iter().filter(|r| fired & r.mask != 0) {
            // Edges before the semaphore exists are dropped
            if !route.sem.is_created() {
                crate::debug!("edge lines {=u32:#x} dropped, semaphore not created", fired & route.mask);
                continue;
            }
            woken |= k.sem_give_from_isr(route.sem.id())?;
        }
        if fired != 0 {
            crate::trace!("edge lines {=u32:#x} fired", fired);
        }
        Ok(woken)
    }

    /// Complete interrupt handler body
    ///
    /// ```ignore
    /// #[no_mangle]
    /// extern "C" fn EXTI0() {
    ///     BUTTONS.on_interrupt(&mut ButtonLines);
    /// }
    /// ```
    pub fn on_interrupt(&self, src: &mut impl EdgeSource) -> bool {
        os_int_enter();
        let woken = os_check(os_call(|k| self.dispatch(k, src))).unwrap_or(false);
        os_int_exit();
        woken
    }
}
