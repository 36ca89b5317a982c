//! STM32F401 Nucleo board support
//!
//! Console on USART2 (PA2/PA3, routed to the ST-LINK virtual COM port),
//! buttons on PC13 (blue user button) and PA0 with pull-ups, falling-edge
//! EXTI lines 13 and 0, status LED on PA5. Runs from the 16 MHz HSI reset
//! clock.

use cortex_m::peripheral::NVIC;

use crate::bsp::{Board, EdgeSource, SerialPort};
use crate::config::CFG_CPU_CLOCK_HZ;
use crate::pac;
use crate::pac::gpio::vals::{Moder, Ot, Pupdr};

/// EXTI line of SW1 (PC13)
pub const SW1_LINE: u32 = 1 << 13;
/// EXTI line of SW2 (PA0)
pub const SW2_LINE: u32 = 1 << 0;

const GPIO_AF_USART2: u8 = 7;
const SYSCFG_PORT_A: u8 = 0;
const SYSCFG_PORT_C: u8 = 2;

/// The Nucleo-F401RE board
pub struct Nucleo;

impl Board for Nucleo {
    fn init_gpio(&mut self) {
        pac::RCC.ahb1enr().modify(|w| {
            w.set_gpioaen(true);
            w.set_gpiocen(true);
        });
        pac::RCC.apb2enr().modify(|w| w.set_syscfgen(true));

        // LED
        pac::GPIOA.moder().modify(|w| w.set_moder(5, Moder::OUTPUT));
        pac::GPIOA.otyper().modify(|w| w.set_ot(5, Ot::PUSHPULL));

        // Buttons
        pac::GPIOA.moder().modify(|w| w.set_moder(0, Moder::INPUT));
        pac::GPIOA.pupdr().modify(|w| w.set_pupdr(0, Pupdr::PULLUP));
        pac::GPIOC.moder().modify(|w| w.set_moder(13, Moder::INPUT));
        pac::GPIOC.pupdr().modify(|w| w.set_pupdr(13, Pupdr::PULLUP));

        pac::SYSCFG.exticr(0).modify(|w| w.set_exti(0, SYSCFG_PORT_A));
        pac::SYSCFG.exticr(3).modify(|w| w.set_exti(1, SYSCFG_PORT_C));

        for line in [0usize, 13] {
            pac::EXTI.ftsr(0).modify(|w| w.set_line(line, true));
            pac::EXTI.rtsr(0).modify(|w| w.set_line(line, false));
        }
        pac::EXTI.pr(0).write(|w| w.0 = SW1_LINE | SW2_LINE);
        pac::EXTI.imr(0).modify(|w| {
            w.set_line(0, true);
            w.set_line(13, true);
        });
    }

    fn enable_edge_irqs(&mut self) {
        // Drop presses latched while booting
        pac::EXTI.pr(0).write(|w| w.0 = SW1_LINE | SW2_LINE);
        NVIC::unpend(pac::Interrupt::EXTI0);
        NVIC::unpend(pac::Interrupt::EXTI15_10);

        // SAFETY: both handlers only use the from-ISR kernel API.
        unsafe {
            NVIC::unmask(pac::Interrupt::EXTI0);
            NVIC::unmask(pac::Interrupt::EXTI15_10);
        }
    }

    fn init_uart(&mut self, baud: u32) {
        pac::RCC.ahb1enr().modify(|w| w.set_gpioaen(true));
        pac::RCC.apb1enr().modify(|w| w.set_usart2en(true));

        for pin in [2usize, 3] {
            pac::GPIOA.moder().modify(|w| w.set_moder(pin, Moder::ALTERNATE));
            pac::GPIOA.afr(0).modify(|w| w.set_afr(pin, GPIO_AF_USART2));
        }

        // 16x oversampling: mantissa and fraction together are clk / baud
        let div = (CFG_CPU_CLOCK_HZ + baud / 2) / baud;
        pac::USART2.cr1().modify(|w| w.set_ue(false));
        pac::USART2.brr().write(|w| w.0 = div);
        pac::USART2.cr1().modify(|w| {
            w.set_te(true);
            w.set_re(true);
            w.set_ue(true);
        });
    }
}

/// Drive the status LED
pub fn set_led(on: bool) {
    pac::GPIOA.bsrr().write(|w| {
        if on {
            w.set_bs(5, true)
        } else {
            w.set_br(5, true)
        }
    });
}

/// Console UART
pub struct Usart2;

impl SerialPort for Usart2 {
    fn write_byte(&mut self, byte: u8) {
        while !pac::USART2.sr().read().txe() {}
        pac::USART2.dr().write(|w| w.set_dr(byte as u16));
    }
}

/// Pending EXTI lines of both buttons
pub struct ButtonLines;

impl EdgeSource for ButtonLines {
    fn pending(&self) -> u32 {
        pac::EXTI.pr(0).read().0 & (SW1_LINE | SW2_LINE)
    }

    fn clear(&mut self, mask: u32) {
        // write-one-to-clear
        pac::EXTI.pr(0).write(|w| w.0 = mask);
    }
}
