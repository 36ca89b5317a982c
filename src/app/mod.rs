//! Application layer
//!
//! The serial console shared by every task, the interrupt-to-semaphore
//! bridge for the buttons, and the scripted two-lock scenario the kernel is
//! validated with.

pub mod bridge;
pub mod console;
pub mod scenario;

pub use bridge::{Route, SignalBridge};
pub use console::{Console, CONSOLE};
pub use scenario::{LockId, Milestone, TraceSnapshot, Scenario, ScenarioTrace, Step, TaskScript};
