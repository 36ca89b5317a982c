//! Cortex-M4 port implementation
//!
//! Provides context switching via PendSV exception handler.

#![allow(named_asm_labels)]

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use portable_atomic::{AtomicU32, Ordering};

use crate::kernel::{os_fatal, KERNEL};
use crate::task::stack::STACK_POOL;

/// Interrupt stack for MSP
#[no_mangle]
static mut INTERRUPT_STACK: [u64; 256] = [0xDEADBEEF_DEADBEEF; 256];

/// Non-zero once a task context exists that PendSV must save
#[no_mangle]
static CTX_ACTIVE: AtomicU32 = AtomicU32::new(0);

/// Initialize SysTick timer for system tick generation
///
/// # Arguments
/// * `cnts` - Reload value
///
/// # Example
/// For 16MHz clock with 1000Hz tick rate: cnts = 16_000_000 / 1000 = 16_000
pub fn os_cpu_systick_init(cnts: u32) {
    let mut p = unsafe { cortex_m::Peripherals::steal() };

    p.SYST.set_reload(cnts - 1);
    p.SYST.clear_current();
    p.SYST.set_clock_source(SystClkSource::Core);
    p.SYST.enable_interrupt();
    p.SYST.enable_counter();
}

/// Start the highest priority ready task
///
/// # Safety
/// The kernel must be running and the first task's stack frame built.
#[allow(static_mut_refs)]
pub unsafe fn os_start_high_rdy() -> ! {
    unsafe {
        let mut scb = cortex_m::Peripherals::steal().SCB;

        // Set PendSV and SysTick priority to lowest
        scb.set_priority(SystemHandler::PendSV, 0xF0);
        scb.set_priority(SystemHandler::SysTick, 0xF0);

        // Switch MSP to dedicated interrupt stack
        let msp_top = &INTERRUPT_STACK as *const _ as u32 + core::mem::size_of_val(&INTERRUPT_STACK) as u32;

        asm!("msr msp, {0}", in(reg) msp_top);
        asm!("msr psp, {0}", in(reg) 0);

        CTX_ACTIVE.store(0, Ordering::Release);

        cortex_m::interrupt::enable();
        cortex_m::peripheral::SCB::set_pendsv();
    }

    loop {
        cortex_m::asm::wfi();
    }
}

/// Trigger context switch from task level
#[inline(always)]
pub fn os_ctx_sw() {
    cortex_m::peripheral::SCB::set_pendsv();
}

/// Trigger context switch from interrupt level
#[inline(always)]
pub fn os_int_ctx_sw() {
    cortex_m::peripheral::SCB::set_pendsv();
}

/// Idle task body
#[inline(always)]
pub fn os_idle_hook() {
    cortex_m::asm::wfi();
}

/// Helper function called from PendSV to perform TCB switching
///
/// Saves and checks the outgoing task's stack pointer, lets the kernel pick
/// the incoming task and returns its stack pointer.
#[inline(never)]
#[no_mangle]
unsafe extern "C" fn pendsv_switch_context(cur_sp: u32) -> u32 {
    // SAFETY: PendSV runs with interrupts masked and preempts no kernel call.
    let k = unsafe { KERNEL.get_unchecked() };

    if CTX_ACTIVE.load(Ordering::Acquire) != 0 {
        if let Some(cur) = k.cur {
            let tcb = &mut k.tasks[cur.index()];
            tcb.stk_ptr = cur_sp as usize;

            let sp_offset = STACK_POOL.offset_of(cur_sp as usize);
            let bottom = STACK_POOL.word(tcb.stk.base());
            if let Err(err) = tcb.stk.check(sp_offset, bottom) {
                crate::error!("stack overflow in task {}", tcb.name);
                os_fatal(err);
            }
        }
    }
    CTX_ACTIVE.store(1, Ordering::Release);

    match k.complete_switch() {
        Some(next) => k.tasks[next.index()].stk_ptr as u32,
        None => cur_sp,
    }
}

/// PendSV exception handler - performs full context switch
///
/// 1. Save R4-R11, LR to current task's PSP (skip if first task)
/// 2. Call switch_context to pick the next task
/// 3. Restore R4-R11, LR from new task's stack
/// 4. Exception return
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "dsb",
        "isb",

        "mrs r0, psp",

        "ldr r1, ={ctx_active}",
        "ldr r1, [r1]",
        "cbz r1, 1f",

        "stmdb r0!, {{r4-r11, lr}}",

        "1:",
        "bl pendsv_switch_context",

        "ldmia r0!, {{r4-r11, lr}}",

        "msr psp, r0",

        "cpsie i",
        "dsb",
        "isb",

        "bx lr",

        ctx_active = sym CTX_ACTIVE,
    );
}

/// SysTick interrupt handler
#[no_mangle]
pub extern "C" fn SysTick() {
    crate::time::os_tick_handler();
}

/// Task return handler
#[no_mangle]
pub fn os_task_return() -> ! {
    crate::error!("task returned from its entry point");
    loop {
        cortex_m::asm::wfi();
    }
}
