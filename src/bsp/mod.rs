//! Board support interfaces
//!
//! The kernel and the application tasks only see these traits. A board
//! implements them once; the STM32F401 Nucleo implementation lives in
//! [`stm32f401`] and host tests use mocks.

#[cfg(all(feature = "pac", target_arch = "arm"))]
pub mod stm32f401;

/// One-time peripheral bring-up, done before the scheduler starts
pub trait Board {
    /// Configure the button inputs and status LEDs, edge interrupts masked
    fn init_gpio(&mut self);

    /// Configure the console UART for 8N1 at `baud`
    fn init_uart(&mut self, baud: u32);

    /// Unmask the edge interrupts configured by `init_gpio`
    ///
    /// Call once the semaphores the handlers give have been created.
    fn enable_edge_irqs(&mut self);
}

/// Byte-oriented serial output
///
/// Only used under the console mutex; implementations need no locking of
/// their own.
pub trait SerialPort {
    /// Write one byte, spinning until the transmitter accepts it
    fn write_byte(&mut self, byte: u8);

    /// Write a string, expanding `\n` to `\r\n`
    fn write_string(&mut self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }
}

/// Source of edge-triggered interrupt lines, one bit per line
pub trait EdgeSource {
    /// Lines with a latched edge
    fn pending(&self) -> u32;

    /// Acknowledge the given lines at the source
    fn clear(&mut self, mask: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Capture(Vec<u8>);

    impl SerialPort for Capture {
        fn write_byte(&mut self, byte: u8) {
            self.0.push(byte);
        }
    }

    #[test]
    fn test_write_string_crlf() {
        let mut port = Capture(Vec::new());
        port.write_string("a\nb\n");
        assert_eq!(port.0, b"a\r\nb\r\n");
    }
}
