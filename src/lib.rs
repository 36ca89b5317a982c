//! A small priority-preemptive RTOS core for Cortex-M
//!
//! A real-time kernel providing:
//! - Fixed-priority preemptive scheduling with round-robin among equals
//! - Binary and counting semaphores, usable from interrupt handlers
//! - Mutexes with chained priority inheritance
//! - Bounded FIFO message queues
//! - Tick-based delays and wait timeouts
//! - Context switching for ARM Cortex-M4
//!
//! The [`app`] module carries the two-lock deadlock and priority-inversion
//! scenario the kernel is validated with, plus the console and the
//! interrupt-to-semaphore bridge it uses.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod sync;
pub mod port;
pub mod bsp;

#[cfg(all(feature = "sem", feature = "mutex"))]
pub mod app;

// ============ Re-exports ============

pub use core::config;
pub use core::config::*;
pub use core::critical;
pub use core::error;
pub use core::error::{ErrorKind, OsError, OsResult};
pub use core::kernel;
pub use core::kernel::{os_init, os_int_enter, os_int_exit, os_start, Kernel};
pub use core::prio;
pub use core::types;
pub use core::types::*;
pub use core::task;
pub use core::task::os_task_create;
pub use core::sched;
pub use core::sched::{os_sched, os_yield};
pub use core::time;
pub use core::time::{ms_to_ticks, os_time_dly, os_time_dly_ms, os_time_get};

#[cfg(feature = "sem")]
pub use sync::sem::{self, Semaphore};
#[cfg(feature = "mutex")]
pub use sync::mutex::{self, Mutex};
#[cfg(feature = "queue")]
pub use sync::queue::{self, Queue, QueueItem};

#[cfg(feature = "pac")]
pub use stm32_metapac as pac;
