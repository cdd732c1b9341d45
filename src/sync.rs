//! # Critical Sections
//!
//! The kernel has no lock of its own — it cannot use its own mutexes to
//! protect itself. Instead, every mutation of kernel state from task
//! context runs inside a scoped interrupt-free section, so the tick
//! handler can never observe a queue mid-update. On the Cortex-M4 this is
//! a PRIMASK disable/restore pair; the guard shape keeps that contract
//! explicit even on ports where disabling is a no-op.

use cortex_m::interrupt;

/// Run `f` with interrupts disabled, restoring them on exit.
///
/// Keep the enclosed work short: everything inside delays the scheduler
/// tick. The kernel primitives confine themselves to queue relinks and
/// counter updates, which are bounded by the compile-time task count.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&interrupt::CriticalSection) -> R,
{
    interrupt::free(f)
}
