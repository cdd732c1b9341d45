//! # Host Stand-ins
//!
//! Inert implementations of the platform contract for off-target builds.
//! Unit tests drive the scheduler synchronously — calling
//! `Kernel::scheduler_tick` and `Kernel::switch_context` directly — so
//! nothing here needs to do real work; it only needs to exist and keep the
//! same signatures as the Cortex-M4 port.

use crate::kernel::KernelError;

/// Validates the interval exactly like the real port, without touching
/// hardware.
pub fn start_tick_source(interval_ms: u32) -> Result<(), KernelError> {
    super::systick_reload_value(interval_ms).map(|_| ())
}

pub fn trigger_context_switch() {}

pub fn set_trap_priorities() {}

pub fn wait_for_event() {
    core::hint::spin_loop();
}

/// There is no Thread mode to enter off-target.
pub unsafe fn launch_first_task(_psp: *const u32, _entry: fn()) -> ! {
    unimplemented!("task launch requires the embedded target")
}
