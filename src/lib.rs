//! # PriOS — a fixed-priority preemptive RTOS kernel
//!
//! A small real-time kernel for single-core ARM Cortex-M4 parts. Firmware
//! declares a fixed set of tasks at boot; the kernel time-slices them under
//! the SysTick interrupt and guarantees that the highest-priority runnable
//! task is the one executing, subject to a once-per-tick scheduling
//! decision. Priority contention over shared resources is resolved
//! deterministically through priority-ordered mutexes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Application Tasks                    │
//! ├──────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                   │
//! │   init · create_task · launch · delay · yield ·          │
//! │   suspend/resume · create/acquire/release mutex          │
//! ├───────────────┬────────────────────┬─────────────────────┤
//! │  Scheduler    │   Mutex            │  Ordered Queue      │
//! │  scheduler.rs │   mutex.rs         │  queue.rs           │
//! │  ─ tick       │   ─ acquire        │  ─ insert (sorted)  │
//! │  ─ forced     │   ─ release        │  ─ remove           │
//! │    transition │     (hand-off)     │    (priority/wake)  │
//! ├───────────────┴────────────────────┴─────────────────────┤
//! │       Task Model (task.rs) · Stack Arena (memory.rs)     │
//! ├──────────────────────────────────────────────────────────┤
//! │              Port (arch/cortex_m4.rs)                    │
//! │      PendSV trap · SysTick tick · first-task launch      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scheduling Model
//!
//! - One queue abstraction, three orderings: the ready queue is keyed by
//!   priority, the delay queue by absolute wake tick, and each mutex's
//!   wait queue by priority again.
//! - The SysTick tick wakes expired delays and preempts the active task
//!   whenever the ready queue's head is of equal or better priority.
//! - `delay`, `yield` and a contended mutex `acquire` force an immediate
//!   transition through the same PendSV trap the tick uses, so the
//!   register swap has exactly one trigger point.
//! - The idle task (id 0, lowest priority) is pinned in the ready queue
//!   for the life of the system, which keeps every scheduling decision
//!   total: there is always a head to pick.
//!
//! ## Memory Model
//!
//! - **No heap, no `alloc`**: tasks, mutexes and all stacks live in
//!   fixed-capacity arenas sized at compile time (`config.rs`).
//! - Task stacks are carved once from a single kernel stack arena and are
//!   never reclaimed; tasks are never destroyed.
//! - Kernel state is mutated only inside critical sections
//!   (`sync::critical_section`) or from the lowest-priority exception
//!   handlers, never concurrently.

#![no_std]

pub mod arch;
pub mod config;
pub mod kernel;
pub mod memory;
pub mod mutex;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod task;
