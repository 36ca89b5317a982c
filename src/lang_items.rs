//! Language items and default exception handlers

// With defmt: RTT transport, and panic-probe prints the panic message
#[cfg(all(feature = "defmt", target_os = "none"))]
use defmt_rtt as _;

#[cfg(all(feature = "defmt", target_os = "none"))]
use panic_probe as _;

// Without defmt a panic just halts
#[cfg(all(not(feature = "defmt"), target_os = "none"))]
use panic_halt as _;

// Defmt panic handler
#[cfg(all(feature = "defmt", target_os = "none"))]
#[defmt::panic_handler]
fn defmt_panic() -> ! {
    cortex_m::asm::udf()
}

// Default HardFault handler
#[cfg(target_arch = "arm")]
#[cortex_m_rt::exception]
unsafe fn HardFault(_ef: &cortex_m_rt::ExceptionFrame) -> ! {
    crate::error!("hard fault");
    loop {
        cortex_m::asm::udf();
    }
}

// Defmt timestamp: kernel ticks
#[cfg(all(feature = "defmt", target_os = "none"))]
defmt::timestamp!("{=u32}", crate::kernel::os_tick_peek());
