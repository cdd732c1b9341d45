//! # Platform Layer
//!
//! The narrow hardware contract the kernel consumes: a periodic tick
//! source, a way to request the context-switch trap, the trap itself, and
//! the mode-switch bootstrap for the first task.
//!
//! The Cortex-M4 port implements all of it against SysTick and PendSV.
//! Off-target builds (host unit tests) get inert stand-ins so the core
//! compiles and the scheduler can be driven synchronously.

use crate::config::SYSTEM_CLOCK_HZ;
use crate::kernel::KernelError;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use cortex_m4 as port;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub mod host;
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub use host as port;

/// Largest value the 24-bit SysTick reload register accepts.
const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Reload value that makes SysTick fire every `interval_ms` milliseconds,
/// or [`KernelError::ConfigurationOverflow`] if the interval does not fit
/// the counter at the configured core clock.
pub fn systick_reload_value(interval_ms: u32) -> Result<u32, KernelError> {
    const TICKS_PER_MS: u32 = SYSTEM_CLOCK_HZ / 1000;

    let reload = interval_ms
        .checked_mul(TICKS_PER_MS)
        .and_then(|ticks| ticks.checked_sub(1))
        .ok_or(KernelError::ConfigurationOverflow)?;

    if reload > SYSTICK_MAX_RELOAD {
        return Err(KernelError::ConfigurationOverflow);
    }
    Ok(reload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_millisecond_fits_comfortably() {
        // 16 MHz core clock → 16 000 ticks per millisecond.
        assert_eq!(systick_reload_value(1), Ok(15_999));
    }

    #[test]
    fn the_counter_limit_is_enforced() {
        // At 16 MHz the 24-bit counter tops out just above a second.
        assert_eq!(systick_reload_value(1_000), Ok(15_999_999));
        assert_eq!(
            systick_reload_value(1_100),
            Err(KernelError::ConfigurationOverflow)
        );
        assert_eq!(
            systick_reload_value(u32::MAX),
            Err(KernelError::ConfigurationOverflow)
        );
    }
}
