//! Core RTOS modules
//!
//! The kernel context and everything it is built from: scheduling, tasks,
//! time and the critical-section plumbing underneath.

pub mod config;
pub mod critical;
pub mod cs_cell;
pub mod error;
pub mod kernel;
pub mod prio;
pub mod types;
pub mod task;
pub mod sched;
pub mod time;
