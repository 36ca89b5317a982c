//! Priority Inversion Demo - mutex priority inheritance
//!
//! Three tasks: High(3), Medium(2), Low(1)
//! Low holds Mutex1 -> High waits -> Low boosted to prio 3, so Medium's
//! long computation cannot delay High.

#![no_std]
#![no_main]
#![allow(static_mut_refs)]

use cortex_m_rt::entry;
use rtcore::app::scenario::{spawn_inversion, SCENARIO};
use rtcore::app::{Milestone, CONSOLE};
use rtcore::bsp::stm32f401::{Nucleo, Usart2};
use rtcore::bsp::Board;
use rtcore::kernel::os_fatal;
use rtcore::os_task_create;
use rtcore::time::os_time_dly_ms;

static mut UART: Usart2 = Usart2;

/// Reports when High got through, relative to Medium's work
fn report_task() -> ! {
    let trace = SCENARIO.trace();
    loop {
        os_time_dly_ms(2000);

        let high = trace.last_tick(Milestone::HighReleased);
        let medium = trace.last_tick(Milestone::MediumDone);
        rtcore::info!(
            "[REPORT] high x{} medium x{}",
            trace.count(Milestone::HighReleased),
            trace.count(Milestone::MediumDone)
        );
        if let (Some(high), Some(medium)) = (high, medium) {
            if high > medium {
                rtcore::warn!("[REPORT] high finished after medium ({} > {})", high, medium);
            }
        }
    }
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
        .and_then(|_| spawn_inversion())
        .and_then(|_| os_task_create("Report", report_task, 1, 256).map(|_| ()));
    if let Err(err) = setup {
        os_fatal(err);
    }

    CONSOLE.println("Priority Inversion Demo: H(3) M(2) L(1)");

    if let Err(err) = rtcore::os_start() {
        os_fatal(err);
    }

    loop {
        cortex_m::asm::wfi();
    }
}
