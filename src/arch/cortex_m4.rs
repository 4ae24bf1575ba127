//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor.
//! Implements context switching via PendSV, the SysTick tick source, and
//! interrupt priority setup.
//!
//! ## Context Switch Mechanism
//!
//! Tasks run in Thread mode on the PSP; the kernel and exception handlers
//! use the MSP. On exception entry the hardware stacks R0–R3, R12, LR, PC
//! and xPSR on the task's stack; PendSV saves R4–R11 below them and hands
//! the resulting stack pointer to `Kernel::switch_context`, which returns
//! the stack pointer of the context the EDF scheduler selected.
//!
//! The scheduling *decision* is always taken synchronously, inside the
//! kernel's critical section, by the event that caused it (activation,
//! self-block, tick). PendSV only carries it out.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: Priority 0xFF (lowest)
//! - PendSV: Priority 0xFF (lowest) — runs only when no other ISR is active

use core::arch::{asm, naked_asm};

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;

use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};
use crate::kernel;

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure SysTick to fire at `TICK_HZ` from the processor clock.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// PendSV trigger
// ---------------------------------------------------------------------------

/// Pend a context switch. It happens as soon as no other exception is
/// active, i.e. immediately when called from thread mode.
#[inline]
pub fn request_context_switch() {
    cortex_m::peripheral::SCB::set_pendsv();
}

#[inline]
pub fn wait_for_interrupt() {
    cortex_m::asm::wfi();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Set PendSV and SysTick to the lowest interrupt priority so a context
/// switch never preempts application-level ISRs.
pub fn set_interrupt_priorities() {
    // System Handler Priority Register 3 (SHPR3): 0xE000_ED20
    // Bits [23:16] = PendSV priority, bits [31:24] = SysTick priority
    const SHPR3: *mut u32 = 0xE000_ED20 as *mut u32;
    unsafe {
        let val = core::ptr::read_volatile(SHPR3);
        core::ptr::write_volatile(SHPR3, val | (0xFF << 16) | (0xFF << 24));
    }
}

// ---------------------------------------------------------------------------
// First task launch
// ---------------------------------------------------------------------------

/// Switch Thread mode to the PSP and enter the first context by unwinding
/// its prepared frame by hand.
///
/// # Safety
/// Must only be called once, with the stack pointer of a frame prepared by
/// `StackPool::prepare_frame`.
pub unsafe fn start_first_task(psp: *const u32) -> ! {
    asm!(
        // Skip the software-saved R4-R11 (8 × 4 bytes)
        "adds r0, #32",
        "msr psp, r0",

        // CONTROL.SPSEL = 1: Thread mode uses PSP
        "movs r0, #2",
        "msr control, r0",
        "isb",

        // Pop the hardware frame; R0 carries the task parameter
        "pop {{r0-r3, r12}}",
        "pop {{r4}}",          // LR (exit trap, unused)
        "pop {{r5}}",          // PC (task entry point)
        "pop {{r6}}",          // xPSR (discarded)

        "cpsie i",
        "bx r5",

        in("r0") psp,
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV exception handler — performs the context switch.
///
/// ## Sequence
/// 1. Save R4–R11 onto the outgoing context's stack (PSP)
/// 2. Hand that stack pointer to the kernel, get the incoming one back
/// 3. Restore R4–R11 from the incoming stack
/// 4. Return from exception onto the PSP
///
/// # Safety
/// Naked exception handler; follows the Cortex-M exception entry/exit
/// convention exactly.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",
        "bl {switch}",             // r0 = switch_context_trampoline(r0)
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "ldr r0, =0xFFFFFFFD",     // EXC_RETURN: thread mode, PSP
        "bx r0",
        switch = sym switch_context_trampoline,
    );
}

extern "C" fn switch_context_trampoline(outgoing: *mut u32) -> *mut u32 {
    kernel::with_kernel(|k| k.switch_context(outgoing as usize)) as *mut u32
}

// ---------------------------------------------------------------------------
// SysTick handler
// ---------------------------------------------------------------------------

/// SysTick exception handler — tick source for the kernel. Wakes due
/// tasks, records deadline misses, and pends a switch if EDF picked a
/// different task.
#[no_mangle]
pub extern "C" fn SysTick() {
    if kernel::with_kernel(|k| k.on_tick()) {
        request_context_switch();
    }
}
