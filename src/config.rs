//! # PriOS Configuration
//!
//! Compile-time constants governing the kernel. All capacities are fixed at
//! compile time — the kernel performs no dynamic allocation.

/// Scheduler tick period in milliseconds. The SysTick reload value is
/// derived from this and [`SYSTEM_CLOCK_HZ`]; a period that does not fit
/// the 24-bit SysTick counter is rejected at launch.
pub const TICK_INTERVAL_MS: u32 = 1;

/// Maximum number of user tasks. The idle task is accounted for
/// separately, so the task table holds [`TOTAL_TASKS`] entries.
pub const MAX_TASKS: usize = 8;

/// Total task-table capacity, idle task included.
pub const TOTAL_TASKS: usize = MAX_TASKS + 1;

/// Maximum number of mutexes that can be created.
pub const MAX_MUTEXES: usize = 8;

/// Largest per-task stack request, in 32-bit words.
pub const MAX_STACK_WORDS: u16 = 256;

/// Smallest per-task stack, in 32-bit words. Sixteen words are consumed by
/// the initial exception frame alone; the rest is working headroom.
/// The idle task runs on a stack of exactly this size.
pub const MIN_STACK_WORDS: u16 = 32;

/// Size of the single kernel stack arena, in 32-bit words. Every task
/// stack is carved from this region at creation time and never reclaimed.
pub const KERNEL_STACK_WORDS: usize =
    MAX_TASKS * MAX_STACK_WORDS as usize + MIN_STACK_WORDS as usize;

/// Enables time-driven preemption in the tick handler. With this off the
/// kernel still honors forced transitions (delay/yield/contended acquire),
/// but a running task is never displaced by the tick.
pub const PREEMPTIVE: bool = true;

/// CPU core clock in Hz (STM32F4-class part on the 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Priority assigned to the idle task. Numerically largest, therefore the
/// lowest precedence in the system: every user task outranks it.
pub const IDLE_PRIORITY: u8 = u8::MAX;
