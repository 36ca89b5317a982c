//! Time management module
//!
//! Provides tick handling, time delays, and timeout management.

pub mod tick_list;

use crate::config::CFG_TICK_RATE_HZ;
use crate::error::{OsError, OsResult};
use crate::kernel::{os_call, os_fatal, os_int_enter, os_int_exit, Kernel};
use crate::types::{OsPendOn, OsPendStatus, OsTaskState, OsTick};

use tick_list::{deadline_after, deadline_reached};

/// Convert milliseconds to ticks, rounding up
///
/// A non-zero duration never rounds down to zero ticks.
pub const fn ms_to_ticks(ms: u32) -> OsTick {
    let ticks = (ms as u64 * CFG_TICK_RATE_HZ as u64).div_ceil(1000);
    if ticks > OsTick::MAX as u64 {
        OsTick::MAX
    } else {
        ticks as OsTick
    }
}

impl Kernel {
    /// Delay the running task for `ticks` ticks
    ///
    /// The task leaves its ready list and is placed on the tick list. A
    /// delay of zero ticks is a yield; delays longer than
    /// [`MAX_WAIT`](tick_list::MAX_WAIT) are clamped to it.
    pub fn time_dly(&mut self, ticks: OsTick) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::TimeDlyIsr);
        }
        let me = self.cur_task()?;

        if ticks == 0 {
            return self.yield_now();
        }

        self.rdy_remove(me);
        self.tasks[me.index()].state = OsTaskState::Delayed;
        let wake_at = deadline_after(self.tick, ticks);
        self.tick_list.insert(me, wake_at, self.tick, &mut self.tasks);

        self.schedule();
        Ok(())
    }

    /// Advance the clock by one tick
    ///
    /// Wakes every task whose delay or pend timeout expired, charges the
    /// running task's time slice and reschedules. Returns `true` when a
    /// switch can be requested right away (outside interrupt context).
    pub fn tick(&mut self) -> bool {
        self.tick = self.tick.wrapping_add(1);
        if !self.running {
            return false;
        }

        while let Some(id) = self.tick_list.head() {
            if !deadline_reached(self.tick, self.tasks[id.index()].wake_at) {
                break;
            }
            self.tick_list.remove(id, &mut self.tasks);

            match self.tasks[id.index()].state {
                OsTaskState::Delayed => {
                    self.tasks[id.index()].state = OsTaskState::Ready;
                    self.rdy_insert(id);
                }
                OsTaskState::Blocked => {
                    let on: OsPendOn = self.tasks[id.index()].pend_on;
                    self.pend_wake(id, OsPendStatus::Timeout);
                    crate::debug!("task {} pend timeout", id);

                    #[cfg(feature = "mutex")]
                    if let OsPendOn::Mutex(mutex) = on {
                        self.mutex_waiter_left(mutex);
                    }
                    #[cfg(not(feature = "mutex"))]
                    let _ = on;
                }
                OsTaskState::Ready | OsTaskState::Running => {}
            }
        }

        self.round_robin();
        self.schedule()
    }
}

/// Time delay in ticks
///
/// Delays the calling task for the specified number of system ticks.
/// A delay of 0 ticks yields to ready tasks of equal priority.
///
/// Only a running task may delay: a call from an ISR or before
/// [`os_start`](crate::kernel::os_start) stops the system.
pub fn os_time_dly(ticks: OsTick) {
    if let Err(err) = os_call(|k| k.time_dly(ticks)) {
        os_fatal(err);
    }
}

/// Time delay in milliseconds
pub fn os_time_dly_ms(ms: u32) {
    os_time_dly(ms_to_ticks(ms));
}

/// Get current tick count
#[inline]
pub fn os_time_get() -> OsTick {
    os_call(|k| k.tick_get())
}

/// Tick handler
///
/// Called from the system timer interrupt.
pub fn os_tick_handler() {
    os_int_enter();
    os_call(|k| {
        k.tick();
    });
    os_int_exit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_ticks() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1), 1);
        assert_eq!(ms_to_ticks(500), 500 * CFG_TICK_RATE_HZ / 1000);
    }
}
