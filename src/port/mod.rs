//! CPU port
//!
//! The kernel reaches the hardware only through the functions re-exported
//! here: starting the first task, requesting a switch from task or
//! interrupt level, programming the tick timer and idling. On the host the
//! switch requests do nothing and tests complete switches themselves with
//! [`Kernel::complete_switch`](crate::kernel::Kernel::complete_switch).

pub mod frame;

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::*;

#[cfg(not(target_arch = "arm"))]
pub mod host {
    /// # Safety
    /// Never sound to call on the host; there is no task to start.
    pub unsafe fn os_start_high_rdy() -> ! {
        panic!("no port to start tasks on this target");
    }

    pub fn os_ctx_sw() {}

    pub fn os_int_ctx_sw() {}

    pub fn os_cpu_systick_init(_reload: u32) {}

    pub fn os_idle_hook() {
        core::hint::spin_loop();
    }

    pub fn os_task_return() -> ! {
        panic!("task returned from its entry point");
    }
}

#[cfg(not(target_arch = "arm"))]
pub use host::*;
