//! # Kernel
//!
//! The kernel context and the firmware-facing API.
//!
//! All scheduler, task and mutex state lives in one explicitly owned
//! [`Kernel`] value. The firmware API at the bottom of this module wraps a
//! single static instance, guarding every operation with a critical section
//! so task-context calls cannot interleave with the tick handler; unit
//! tests construct their own `Kernel` values instead and drive ticks
//! synchronously, with no hardware involved.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()          ← reset state, create idle task,
//!         │                             set trap priorities
//!         ├─► kernel::create_task()   ← register tasks (×N)
//!         ├─► kernel::create_mutex()  ← optional
//!         └─► kernel::launch()        ← start SysTick, jump to the
//!                                       highest-priority task (no return)
//! ```

use crate::arch;
use crate::config::{IDLE_PRIORITY, MIN_STACK_WORDS, TICK_INTERVAL_MS};
use crate::memory::StackArena;
use crate::mutex::MutexTable;
use crate::queue::TaskQueue;
use crate::sync;
use crate::task::{TaskId, TaskState, TaskTable};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by creation and configuration paths.
///
/// Runtime misuse that the original-style design tolerates (release by a
/// non-owner, suspending an ineligible task) stays a silent no-op; only
/// boot-time allocation and configuration report failure, and internal
/// invariant violations panic rather than misschedule silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A fixed pool (task table, mutex pool or stack arena) is exhausted.
    CapacityExceeded,
    /// A creation parameter is out of range.
    InvalidArgument,
    /// The requested tick interval does not fit the hardware timer.
    ConfigurationOverflow,
}

// ---------------------------------------------------------------------------
// Kernel context
// ---------------------------------------------------------------------------

/// Process-wide kernel state: every queue, table and counter the scheduler
/// operates on.
///
/// Holding all of it in one value makes the interrupt-versus-task-context
/// aliasing explicit: the static instance below is touched either from a
/// critical section or from the tick/trap handlers, never concurrently.
#[derive(Debug)]
pub struct Kernel {
    pub(crate) tasks: TaskTable,
    pub(crate) mutexes: MutexTable,
    /// Tasks eligible to run, ordered by priority.
    pub(crate) ready_queue: TaskQueue,
    /// Sleeping tasks, ordered by absolute wake tick.
    pub(crate) blocked_queue: TaskQueue,
    /// The task logically executing right now.
    pub(crate) active: Option<TaskId>,
    /// The task selected to run next; meaningful only between a scheduling
    /// decision and the context-switch trap that consumes it.
    pub(crate) standby: Option<TaskId>,
    /// Cached emptiness of `blocked_queue`, checked every tick.
    pub(crate) blocked_empty: bool,
    /// Free-running tick count; rewinds to zero whenever the delay queue
    /// empties, so it spans only the window of outstanding delays.
    pub(crate) tick_counter: u64,
    /// A scheduling decision has requested the context-switch trap.
    pub(crate) switch_pending: bool,
    pub(crate) stack_arena: StackArena,
}

impl Kernel {
    pub const fn new() -> Self {
        Self {
            tasks: TaskTable::new(),
            mutexes: MutexTable::new(),
            ready_queue: TaskQueue::new(),
            blocked_queue: TaskQueue::new(),
            active: None,
            standby: None,
            blocked_empty: true,
            tick_counter: 0,
            switch_pending: false,
            stack_arena: StackArena::new(),
        }
    }

    /// Reset all kernel state and create the idle task.
    ///
    /// The idle task gets id 0, the numerically largest (least urgent)
    /// priority and the minimum stack; it never blocks, so the ready queue
    /// is never empty once this returns.
    pub fn init(&mut self) {
        self.tasks = TaskTable::new();
        self.mutexes = MutexTable::new();
        self.ready_queue = TaskQueue::new();
        self.blocked_queue = TaskQueue::new();
        self.active = None;
        self.standby = None;
        self.blocked_empty = true;
        self.tick_counter = 0;
        self.switch_pending = false;
        self.stack_arena.reset();

        let idle = self
            .create_task(idle_task, MIN_STACK_WORDS, IDLE_PRIORITY, 0)
            .expect("kernel init: idle task allocation cannot fail on a fresh kernel");
        debug_assert_eq!(idle, TaskId::IDLE);
    }

    /// Promote the highest-priority ready task to active in preparation
    /// for the jump into task code. Returns the chosen task.
    pub fn prepare_launch(&mut self) -> TaskId {
        let first = match self.ready_queue.head() {
            Some(head) => head,
            None => panic!("kernel launch: ready queue empty (init not called?)"),
        };
        self.dequeue_ready(first);
        self.tasks[first].state = TaskState::Active;
        self.active = Some(first);
        first
    }

    /// The task currently executing. Every blocking primitive starts here;
    /// before launch there is no active task and calling one is a fatal
    /// sequencing error.
    pub(crate) fn active_id(&self) -> TaskId {
        match self.active {
            Some(id) => id,
            None => panic!("kernel: no active task (primitive called before launch)"),
        }
    }

    /// Number of created tasks, idle included.
    pub fn task_count(&self) -> usize {
        self.tasks.count()
    }

    /// Base address of the stack arena; TCB stack offsets are relative to
    /// this. Used by the port layer to translate offsets to PSP values.
    pub(crate) fn stack_base(&mut self) -> *mut u32 {
        self.stack_arena.base_ptr()
    }

    /// Absolute PSP value for a task's saved stack pointer.
    pub(crate) fn task_sp_ptr(&mut self, id: TaskId) -> *mut u32 {
        let offset = self.tasks[id].sp;
        // Offsets are produced by the arena itself and bounded by its size.
        unsafe { self.stack_base().add(offset) }
    }
}

#[cfg(test)]
impl Kernel {
    /// Test stand-in for the context-switch trap: commit the pending
    /// hand-over, if any, reusing the outgoing task's saved stack pointer.
    pub(crate) fn commit_pending_switch(&mut self) {
        if self.take_switch_pending() {
            let saved = self.tasks[self.active_id()].sp;
            self.switch_context(saved);
        }
    }
}

/// Idle task body: sleep until the next event. Runs whenever no user task
/// is ready; never calls a blocking primitive.
fn idle_task() {
    loop {
        arch::port::wait_for_event();
    }
}

// ---------------------------------------------------------------------------
// Static kernel instance and firmware API
// ---------------------------------------------------------------------------

/// The kernel instance backing the firmware API.
static mut KERNEL: Kernel = Kernel::new();

/// Raw pointer to the kernel for the SysTick and PendSV handlers, which
/// cannot take references through the safe API.
///
/// # Safety
/// Set once during [`init`], read from handler context afterwards.
#[no_mangle]
pub static mut KERNEL_PTR: *mut Kernel = core::ptr::null_mut();

/// Initialize the kernel: reset state, create the idle task and configure
/// the trap priorities. Must be called exactly once, before any other
/// kernel function.
pub fn init() {
    unsafe {
        KERNEL_PTR = core::ptr::addr_of_mut!(KERNEL);
        (*KERNEL_PTR).init();
    }
    arch::port::set_trap_priorities();
}

/// Create a task. See [`Kernel::create_task`].
pub fn create_task(
    entry: fn(),
    stack_words: u16,
    priority: u8,
    periodicity: u32,
) -> Result<TaskId, KernelError> {
    sync::critical_section(|_cs| unsafe {
        (*KERNEL_PTR).create_task(entry, stack_words, priority, periodicity)
    })
}

/// Create a mutex. See [`Kernel::create_mutex`].
pub fn create_mutex() -> Result<crate::mutex::MutexHandle, KernelError> {
    sync::critical_section(|_cs| unsafe { (*KERNEL_PTR).create_mutex() })
}

/// Launch the kernel. **Does not return.**
///
/// Starts the SysTick tick source at [`TICK_INTERVAL_MS`], switches the
/// CPU to the process stack of the highest-priority ready task and jumps
/// into it. Preemption is live from the first tick onward.
///
/// # Panics
/// If the configured tick interval overflows the SysTick counter — a
/// compile-time configuration mistake surfaced at the first moment it can
/// be diagnosed.
pub fn launch() -> ! {
    let (first_sp, entry) = sync::critical_section(|_cs| unsafe {
        let kernel = &mut *KERNEL_PTR;
        let first = kernel.prepare_launch();
        let entry = kernel.tasks[first]
            .entry
            .expect("kernel launch: task without an entry point");
        (kernel.task_sp_ptr(first) as *const u32, entry)
    });

    if let Err(e) = arch::port::start_tick_source(TICK_INTERVAL_MS) {
        panic!("kernel launch: tick interval rejected: {:?}", e);
    }

    unsafe { arch::port::launch_first_task(first_sp, entry) }
}

/// Delay the calling task for `ticks` scheduler ticks. Returns after the
/// delay has expired and the task has been scheduled again.
pub fn task_delay(ticks: u32) {
    let switch = sync::critical_section(|_cs| unsafe {
        let kernel = &mut *KERNEL_PTR;
        kernel.delay_current(ticks);
        kernel.take_switch_pending()
    });
    if switch {
        arch::port::trigger_context_switch();
    }
}

/// Yield the calling task, re-arming it with its periodicity.
pub fn task_yield() {
    let switch = sync::critical_section(|_cs| unsafe {
        let kernel = &mut *KERNEL_PTR;
        kernel.yield_current();
        kernel.take_switch_pending()
    });
    if switch {
        arch::port::trigger_context_switch();
    }
}

/// Suspend a task by handle. See [`Kernel::suspend_task`].
pub fn suspend_task(id: TaskId) {
    sync::critical_section(|_cs| unsafe { (*KERNEL_PTR).suspend_task(id) });
}

/// Resume a suspended task by handle. See [`Kernel::resume_task`].
pub fn resume_task(id: TaskId) {
    sync::critical_section(|_cs| unsafe { (*KERNEL_PTR).resume_task(id) });
}

/// Acquire a mutex; blocks the calling task while the mutex is held
/// elsewhere. See [`Kernel::acquire_mutex`].
pub fn acquire_mutex(handle: crate::mutex::MutexHandle) {
    let switch = sync::critical_section(|_cs| unsafe {
        let kernel = &mut *KERNEL_PTR;
        kernel.acquire_mutex(handle);
        kernel.take_switch_pending()
    });
    if switch {
        arch::port::trigger_context_switch();
    }
}

/// Release a mutex held by the calling task. See [`Kernel::release_mutex`].
pub fn release_mutex(handle: crate::mutex::MutexHandle) {
    sync::critical_section(|_cs| unsafe { (*KERNEL_PTR).release_mutex(handle) });
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
