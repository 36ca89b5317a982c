//! Compile-time configuration for the RTOS core
//!
//! These constants control the behavior and resource limits of the kernel.
//! Every object lives in a fixed-size table inside the kernel, so the limits
//! below are hard limits.

/// Number of priority levels (0 = lowest, `CFG_PRIO_MAX - 1` = most urgent)
pub const CFG_PRIO_MAX: usize = 16;

/// Maximum number of tasks, including the idle task
pub const CFG_MAX_TASKS: usize = 8;

/// Maximum number of semaphores (binary and counting)
pub const CFG_MAX_SEMS: usize = 8;

/// Maximum number of mutexes (at most 32, held sets are a bitmask)
pub const CFG_MAX_MUTEXES: usize = 8;

/// Maximum number of queues
pub const CFG_MAX_QUEUES: usize = 4;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Core clock feeding SysTick
pub const CFG_CPU_CLOCK_HZ: u32 = 16_000_000;

/// Ticks a task may run before it is rotated behind its equal-priority peers
pub const CFG_TIME_QUANTA_DEFAULT: u32 = 1;

/// Enable round-robin scheduling for same-priority tasks
pub const CFG_SCHED_ROUND_ROBIN_EN: bool = true;

/// Words in the static stack pool all task stacks are carved from
pub const CFG_STK_POOL_WORDS: usize = 2048;

/// Minimum task stack size in words
pub const CFG_STK_SIZE_MIN: usize = 64;

/// Words at the bottom of each stack the saved stack pointer may never enter
pub const CFG_STK_GUARD_WORDS: usize = 8;

/// Idle task stack size in words
pub const CFG_IDLE_STK_WORDS: usize = 128;

/// Bytes in the static pool queue ring buffers are carved from
pub const CFG_QUEUE_POOL_BYTES: usize = 256;

/// Largest queue item in bytes
pub const CFG_QUEUE_ITEM_MAX: usize = 16;

/// Idle task priority
pub const CFG_PRIO_IDLE: u8 = 0;

const _: () = assert!(CFG_MAX_MUTEXES <= 32);
const _: () = assert!(CFG_PRIO_MAX <= 256);
const _: () = assert!(CFG_MAX_TASKS < u8::MAX as usize);
