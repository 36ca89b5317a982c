//! Logging macros for the kernel
//!
//! Forward to `defmt` when the `defmt` feature is enabled on a bare-metal
//! target. Otherwise they compile to nothing, but still evaluate their
//! arguments by reference so call sites stay warning-free on the host.

/// Trace message
#[cfg(all(feature = "defmt", target_os = "none"))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}

/// Debug message
#[cfg(all(feature = "defmt", target_os = "none"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

/// Info message
#[cfg(all(feature = "defmt", target_os = "none"))]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { defmt::info!($($arg)*) };
}

/// Warning message
#[cfg(all(feature = "defmt", target_os = "none"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}

/// Error message
#[cfg(all(feature = "defmt", target_os = "none"))]
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}

// No-op versions for the host and for builds without defmt
#[cfg(not(all(feature = "defmt", target_os = "none")))]
#[macro_export]
macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
}
#[cfg(not(all(feature = "defmt", target_os = "none")))]
#[macro_export]
macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
}
#[cfg(not(all(feature = "defmt", target_os = "none")))]
#[macro_export]
macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
}
#[cfg(not(all(feature = "defmt", target_os = "none")))]
#[macro_export]
macro_rules! warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
}
#[cfg(not(all(feature = "defmt", target_os = "none")))]
#[macro_export]
macro_rules! error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{ $( let _ = &$arg; )* }};
}
