//! # Cortex-M4 Port
//!
//! Hardware backing for the kernel's platform contract on ARM Cortex-M4
//! (Thumb-2): SysTick as the tick source, PendSV as the context-switch
//! trap, and the PSP/MSP split-stack model.
//!
//! ## Context-Switch Trap
//!
//! On exception entry the hardware stacks R0–R3, R12, LR, PC and xPSR onto
//! the process stack. The PendSV handler saves the remaining R4–R11, hands
//! the resulting stack position to [`Kernel::switch_context`] to commit the
//! standby task, then unwinds the same way for the incoming task. Both
//! PendSV and SysTick run at the lowest exception priority, so the trap
//! never interrupts another handler and always observes settled kernel
//! state.

use cortex_m::peripheral::syst::SystClkSource;
use core::arch::{asm, naked_asm};

use crate::kernel::{Kernel, KernelError};

/// Interrupt Control and State Register; bit 28 pends PendSV.
const ICSR: *mut u32 = 0xE000_ED04 as *mut u32;

/// System Handler Priority Register 3: PendSV priority in bits 23:16,
/// SysTick in bits 31:24.
const SHPR3: *mut u32 = 0xE000_ED20 as *mut u32;

// ---------------------------------------------------------------------------
// Tick source
// ---------------------------------------------------------------------------

/// Program SysTick to fire every `interval_ms` milliseconds off the core
/// clock. Fails with [`KernelError::ConfigurationOverflow`] if the interval
/// exceeds the 24-bit counter's range.
pub fn start_tick_source(interval_ms: u32) -> Result<(), KernelError> {
    let reload = super::systick_reload_value(interval_ms)?;

    let mut syst = unsafe { cortex_m::Peripherals::steal() }.SYST;
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(reload);
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();
    Ok(())
}

// ---------------------------------------------------------------------------
// Trap plumbing
// ---------------------------------------------------------------------------

/// Pend the PendSV exception: the context switch runs as soon as no other
/// handler is active.
#[inline]
pub fn trigger_context_switch() {
    unsafe {
        core::ptr::write_volatile(ICSR, 1 << 28);
    }
}

/// Drop PendSV and SysTick to the lowest exception priority. The trap must
/// never preempt another handler, and the tick must not be able to re-enter
/// kernel state a trap is mid-way through committing.
pub fn set_trap_priorities() {
    unsafe {
        let value = core::ptr::read_volatile(SHPR3) | (0xFF << 16) | (0xFF << 24);
        core::ptr::write_volatile(SHPR3, value);
    }
}

/// Low-power wait used by the idle task.
#[inline]
pub fn wait_for_event() {
    cortex_m::asm::wfe();
}

// ---------------------------------------------------------------------------
// First task launch
// ---------------------------------------------------------------------------

/// Point PSP at the first task's stack, switch Thread mode onto PSP and
/// jump into the task. Called once from `kernel::launch`; never returns.
///
/// # Safety
/// `psp` must be the stack position prepared for a created task, and the
/// scheduler must already consider that task active.
pub unsafe fn launch_first_task(psp: *const u32, entry: fn()) -> ! {
    asm!(
        "msr psp, {sp}",
        "msr control, {ctl}", // CONTROL.SPSEL = 1: Thread mode on PSP
        "isb",
        sp = in(reg) psp,
        ctl = in(reg) 2u32,
    );
    entry();

    // Task entries loop forever by contract; idle out if one returns.
    loop {
        cortex_m::asm::wfe();
    }
}

// ---------------------------------------------------------------------------
// Exception handlers
// ---------------------------------------------------------------------------

/// PendSV handler — the context-switch trap.
///
/// Saves R4–R11 below the hardware-stacked frame, commits the standby task
/// through [`Kernel::switch_context`], restores the incoming task's R4–R11
/// and returns to Thread mode on its process stack.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",           // outgoing task's stack position
        "stmdb r0!, {{r4-r11}}", // complete the frame with R4-R11
        "bl {switch}",           // returns the incoming stack position in r0
        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "ldr r0, =0xFFFFFFFD",   // EXC_RETURN: Thread mode, PSP
        "bx r0",
        switch = sym pendsv_switch,
    )
}

/// Commit half of the PendSV trap, in Rust. Translates the saved PSP into
/// an arena offset, lets the kernel swap `active`, and hands back the new
/// PSP.
///
/// # Safety
/// Called only from the PendSV handler, after `kernel::init`.
#[no_mangle]
unsafe extern "C" fn pendsv_switch(psp: *mut u32) -> *const u32 {
    let kernel: &mut Kernel = &mut *crate::kernel::KERNEL_PTR;
    let base = kernel.stack_base();
    let saved = psp.offset_from(base) as usize;
    let next = kernel.switch_context(saved);
    base.add(next) as *const u32
}

/// SysTick handler — the scheduler's tick entry point. Runs the tick
/// decision and pends the trap when it asked for one.
#[no_mangle]
pub unsafe extern "C" fn SysTick() {
    let kernel: &mut Kernel = &mut *crate::kernel::KERNEL_PTR;
    kernel.scheduler_tick();
    if kernel.take_switch_pending() {
        trigger_context_switch();
    }
}
