//! Mutex-protected serial console
//!
//! Every task prints through [`CONSOLE`]; a whole line is written while the
//! console mutex is held so output from different tasks never interleaves.
//! Before the scheduler runs (or before the mutex exists) output goes
//! straight to the port.

use core::cell::UnsafeCell;
use core::fmt;

use crate::bsp::SerialPort;
use crate::critical::critical_section;
use crate::error::OsResult;
use crate::kernel::os_call;
use crate::sync::mutex::Mutex;
use crate::types::Timeout;

/// Serial console shared between tasks
pub struct Console {
    lock: Mutex,
    port: UnsafeCell<Option<&'static mut dyn SerialPort>>,
}

// SAFETY: the port is only touched while holding `lock`, or before the
// scheduler runs when there is a single thread of execution.
unsafe impl Sync for Console {}

impl Console {
    pub const fn new() -> Self {
        Console {
            lock: Mutex::new(),
            port: UnsafeCell::new(None),
        }
    }

    /// Attach the output port
    ///
    /// Call before the scheduler starts.
    pub fn attach(&self, port: &'static mut dyn SerialPort) {
        critical_section(|_| {
            // SAFETY: no task runs yet, nobody else holds the port.
            unsafe { *self.port.get() = Some(port) };
        });
    }

    /// Attach the port and create the console mutex
    pub fn init(&self, port: &'static mut dyn SerialPort) -> OsResult<()> {
        self.attach(port);
        self.lock.create("UART")
    }

    /// The console mutex
    pub fn lock(&self) -> &Mutex {
        &self.lock
    }

    /// Write `s` under the console mutex
    pub fn print(&self, s: &str) {
        self.locked(|port| port.write_string(s));
    }

    /// Write `s` and a line break under one hold of the console mutex
    pub fn println(&self, s: &str) {
        self.locked(|port| {
            port.write_string(s);
            port.write_string("\n");
        });
    }

    /// Write formatted output under the console mutex
    pub fn print_fmt(&self, args: fmt::Arguments<'_>) {
        self.locked(|port| {
            let _ = fmt::write(&mut PortWriter(port), args);
        });
    }

    fn locked(&self, f: impl FnOnce(&mut dyn SerialPort)) {
        let shared = self.lock.is_created() && os_call(|k| k.is_running());
        if !shared {
            self.with_port(f);
            return;
        }

        if self.lock.take(Timeout::Forever).is_acquired() {
            self.with_port(f);
            self.lock.give();
        }
    }

    fn with_port(&self, f: impl FnOnce(&mut dyn SerialPort)) {
        // SAFETY: see the `Sync` impl.
        if let Some(port) = unsafe { (*self.port.get()).as_deref_mut() } {
            f(port);
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

struct PortWriter<'a>(&'a mut dyn SerialPort);

impl fmt::Write for PortWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_string(s);
        Ok(())
    }
}

/// The board console
pub static CONSOLE: Console = Console::new();

/// Print formatted text on the board console
#[macro_export]
macro_rules! console_print {
    ($($arg:tt)*) => {
        $crate::app::CONSOLE.print_fmt(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    struct Capture(Arc<StdMutex<Vec<u8>>>);

    impl SerialPort for Capture {
        fn write_byte(&mut self, byte: u8) {
            self.0.lock().unwrap().push(byte);
        }
    }

    #[test]
    fn test_print_before_start() {
        let out = Arc::new(StdMutex::new(Vec::new()));
        let console = Console::new();
        console.attach(Box::leak(Box::new(Capture(out.clone()))));

        console.println("Low Priority Task Started");
        console.print_fmt(format_args!("count {}\n", 3));

        assert_eq!(
            out.lock().unwrap().as_slice(),
            b"Low Priority Task Started\r\ncount 3\r\n"
        );
    }

    #[test]
    fn test_print_without_port() {
        let console = Console::new();
        console.print("dropped");
    }
}
