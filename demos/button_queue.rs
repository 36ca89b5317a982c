//! Button Queue Demo - counting presses and passing them through a queue
//!
//! SW1 increments a counter. SW2 sends the counter to a queue of five and
//! resets it. The UART task prints whatever arrives. Each button has its own
//! semaphore so the tasks can tell the presses apart.

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use core::sync::atomic::{AtomicU8, Ordering};

use cortex_m_rt::entry;
use rtcore::app::{Route, SignalBridge, CONSOLE};
use rtcore::bsp::stm32f401::{set_led, ButtonLines, Nucleo, Usart2, SW1_LINE, SW2_LINE};
use rtcore::bsp::Board;
use rtcore::kernel::os_fatal;
use rtcore::time::os_time_dly_ms;
use rtcore::types::Timeout;
use rtcore::{console_print, ms_to_ticks, os_task_create, OsResult, Queue, Semaphore};

static SW1: Semaphore = Semaphore::new();
static SW2: Semaphore = Semaphore::new();
static PRESSES: Queue<u8> = Queue::new();

static COUNTER: AtomicU8 = AtomicU8::new(b'0');

static BUTTONS: SignalBridge<'static, 2> =
    SignalBridge::new([Route::new(SW1_LINE, &SW1), Route::new(SW2_LINE, &SW2)]);

static mut UART: Usart2 = Usart2;

#[no_mangle]
extern "C" fn EXTI0() {
    BUTTONS.on_interrupt(&mut ButtonLines);
}

#[no_mangle]
extern "C" fn EXTI15_10() {
    BUTTONS.on_interrupt(&mut ButtonLines);
}

fn btn1_task() -> ! {
    loop {
        if SW1.take(Timeout::Forever).is_acquired() {
            COUNTER.fetch_add(1, Ordering::Relaxed);
            CONSOLE.println("SW1 pressed. Counter incremented.");
            // Debounce
            os_time_dly_ms(150);
        }
    }
}

fn btn2_task() -> ! {
    loop {
        if SW2.take(Timeout::Forever).is_acquired() {
            CONSOLE.println("SW2 pressed. Counter sent to queue. Reset to 0.");
            let value = COUNTER.load(Ordering::Relaxed);
            if PRESSES.send(value, ms_to_ticks(100)).is_acquired() {
                COUNTER.store(b'0', Ordering::Relaxed);
            } else {
                rtcore::warn!("queue full, counter kept");
            }
            os_time_dly_ms(150);
        }
    }
}

fn uart_task() -> ! {
    let mut led = false;
    loop {
        if let Some(value) = PRESSES.receive(ms_to_ticks(100)) {
            console_print!("UART Task: Received value from queue: {}\n", value as char);
            led = !led;
            set_led(led);
        }
        os_time_dly_ms(100);
    }
}

fn setup() -> OsResult<()> {
    CONSOLE.init(unsafe { &mut UART })?;
    SW1.binary("SW1")?;
    SW2.binary("SW2")?;
    PRESSES.create("Presses", 5)?;

    os_task_create("Button1 Task", btn1_task, 1, 256)?;
    os_task_create("Button2 Task", btn2_task, 1, 256)?;
    os_task_create("UART Task", uart_task, 1, 256)?;
    Ok(())
}

#[entry]
fn main() -> ! {
    let mut board = Nucleo;
    board.init_gpio();
    board.init_uart(115_200);

    if let Err(err) = rtcore::os_init().and_then(|_| setup()) {
        os_fatal(err);
    }
    CONSOLE.println("System initialized.");

    // Handlers may fire from here on
    board.enable_edge_irqs();

    if let Err(err) = rtcore::os_start() {
        os_fatal(err);
    }

    loop {
        cortex_m::asm::wfi();
    }
}
