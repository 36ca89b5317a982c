//! Deadlock Demo - two tasks taking two mutexes in opposite order
//!
//! Low(1) cycles Mutex1 -> Mutex2 on its own. A button press wakes
//! High(3), which takes Mutex2 -> Mutex1. A press while Low sleeps holding
//! Mutex1 leaves both tasks blocked on each other; the monitor reports it
//! on the console.

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use cortex_m_rt::entry;
use rtcore::app::scenario::{spawn_deadlock, SCENARIO};
use rtcore::app::{Route, SignalBridge, CONSOLE};
use rtcore::bsp::stm32f401::{ButtonLines, Nucleo, Usart2, SW1_LINE, SW2_LINE};
use rtcore::bsp::Board;
use rtcore::kernel::os_fatal;

/// Both buttons wake the same task
static BUTTONS: SignalBridge<'static, 2> = SignalBridge::new([
    Route::new(SW1_LINE, SCENARIO.signal()),
    Route::new(SW2_LINE, SCENARIO.signal()),
]);

static mut UART: Usart2 = Usart2;

#[no_mangle]
extern "C" fn EXTI0() {
    BUTTONS.on_interrupt(&mut ButtonLines);
}

#[no_mangle]
extern "C" fn EXTI15_10() {
    BUTTONS.on_interrupt(&mut ButtonLines);
}

#[entry]
fn main() -> ! {
    let mut board = Nucleo;
    board.init_gpio();
    board.init_uart(115_200);

    if let Err(err) = rtcore::os_init() {
        os_fatal(err);
    }

    let setup = CONSOLE
        .init(unsafe { &mut UART })
        .and_then(|_| spawn_deadlock());
    if let Err(err) = setup {
        os_fatal(err);
    }

    CONSOLE.println("System initialized.");
    rtcore::info!("Deadlock demo: Low(1) Mutex1->Mutex2, High(3) Mutex2->Mutex1");

    // Handlers may fire from here on
    board.enable_edge_irqs();

    if let Err(err) = rtcore::os_start() {
        os_fatal(err);
    }

    loop {
        cortex_m::asm::wfi();
    }
}
