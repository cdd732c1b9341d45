//! # Task Control Block
//!
//! Defines the task model for PriOS. Each task is a fixed-priority unit of
//! work with its own stack extent, carved once from the kernel stack arena,
//! and a lifecycle driven entirely by the scheduler and the blocking
//! primitives.
//!
//! Tasks are created at boot time only and are never destroyed; their slots
//! in the [`TaskTable`] and their stack extents live for the whole program.

use crate::config::{MAX_STACK_WORDS, MIN_STACK_WORDS, TOTAL_TASKS};
use crate::kernel::{Kernel, KernelError};
use crate::queue::SortKey;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
///
/// ```text
///              ┌────────┐  promotion  ┌────────┐
///   create ──► │ Ready  │ ──────────► │ Active │
///              └────────┘             └────────┘
///                ▲  ▲  ▲     delay / yield │ │
///     wake tick  │  │  └───────────────────┘ │ contended acquire
///     reached ┌──┴──┴───┐                    ▼
///             │ Blocked │              ┌─────────┐
///             └─────────┘   hand-off   │ Waiting │ ◄┘
///                ▲    suspend/resume   └─────────┘
///                └── (Ready/Blocked only)
/// ```
///
/// A task is a member of at most one queue at any time, and its state must
/// agree with that membership: Ready ↔ ready queue, Blocked ↔ delay queue,
/// Waiting ↔ exactly one mutex wait queue, Active/Suspended ↔ no queue.
/// The idle task is the single exception: it is pinned in the ready queue
/// even while it is the active task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible to run; enqueued in the ready queue by priority.
    Ready,
    /// Currently executing (or selected to execute at launch).
    Active,
    /// Sleeping in the delay queue until an absolute wake tick.
    Blocked,
    /// Parked in a mutex wait queue until ownership is handed over.
    Waiting,
    /// Withdrawn from scheduling until explicitly resumed.
    Suspended,
}

// ---------------------------------------------------------------------------
// Task identity
// ---------------------------------------------------------------------------

/// Opaque task handle returned by task creation.
///
/// Wraps the task's slot index in the [`TaskTable`]. Ids are assigned in
/// creation order and are stable for the life of the program; id 0 is
/// permanently reserved for the idle task. Using a handle instead of the
/// entry-point address for suspend/resume keeps lookup O(1) and allows the
/// same entry function to back several tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// The idle task's reserved handle.
    pub const IDLE: TaskId = TaskId(0);

    /// Slot index in the task table.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Task control block
// ---------------------------------------------------------------------------

/// Per-task bookkeeping record.
///
/// Stack positions are stored as word offsets into the kernel stack arena
/// rather than raw pointers; the port layer converts them to addresses at
/// context-switch time. This keeps the core free of pointer state and lets
/// host tests inspect stack frames directly.
#[derive(Debug)]
pub struct Tcb {
    /// This task's own handle.
    pub id: TaskId,
    /// Scheduling priority; lower numeric value = higher precedence.
    /// Immutable after creation.
    pub priority: u8,
    /// Self-re-armed delay applied by `yield`, in ticks. Zero is legal and
    /// yields with no sleep beyond the next tick boundary.
    pub periodicity: u32,
    /// Dual-purpose tick field: holds the requested delay while a delay is
    /// being requested, and is rewritten to the absolute wake tick
    /// (`request + current tick`) when the task enters the delay queue.
    pub delay_ticks: u64,
    /// Stack extent length, in words.
    pub stack_words: u16,
    /// Word offset one past the highest word of this task's stack extent.
    pub stack_top: usize,
    /// Saved stack pointer, as a word offset into the arena. Valid only
    /// while the task is not executing.
    pub sp: usize,
    /// Current lifecycle state. Must agree with queue membership.
    pub state: TaskState,
    /// Task entry function. `None` only in vacant table slots.
    pub entry: Option<fn()>,
    /// Intrusive link used by whichever single queue holds this task.
    pub(crate) next: Option<TaskId>,
}

impl Tcb {
    /// A vacant table slot.
    pub const VACANT: Tcb = Tcb {
        id: TaskId(0),
        priority: 0,
        periodicity: 0,
        delay_ticks: 0,
        stack_words: 0,
        stack_top: 0,
        sp: 0,
        state: TaskState::Suspended,
        entry: None,
        next: None,
    };

    /// The ordering key this task contributes under the given comparator.
    #[inline]
    pub(crate) fn sort_key(&self, key: SortKey) -> u64 {
        match key {
            SortKey::Priority => self.priority as u64,
            SortKey::WakeTick => self.delay_ticks,
        }
    }
}

// ---------------------------------------------------------------------------
// Task table
// ---------------------------------------------------------------------------

/// Fixed-capacity arena of task control blocks.
///
/// Slots are handed out in creation order and never reclaimed. The counter
/// is the single source of truth for how many tasks exist.
#[derive(Debug)]
pub struct TaskTable {
    pub(crate) blocks: [Tcb; TOTAL_TASKS],
    pub(crate) count: usize,
}

impl TaskTable {
    pub const fn new() -> Self {
        Self {
            blocks: [Tcb::VACANT; TOTAL_TASKS],
            count: 0,
        }
    }

    /// Number of created tasks, idle included.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count >= TOTAL_TASKS
    }

    /// True if `id` names a created task.
    #[inline]
    pub fn is_valid(&self, id: TaskId) -> bool {
        id.0 < self.count
    }

    /// Claims the next slot. Caller must have checked capacity.
    pub(crate) fn allocate(&mut self) -> TaskId {
        let id = TaskId(self.count);
        self.count += 1;
        id
    }
}

impl core::ops::Index<TaskId> for TaskTable {
    type Output = Tcb;

    #[inline]
    fn index(&self, id: TaskId) -> &Tcb {
        &self.blocks[id.0]
    }
}

impl core::ops::IndexMut<TaskId> for TaskTable {
    #[inline]
    fn index_mut(&mut self, id: TaskId) -> &mut Tcb {
        &mut self.blocks[id.0]
    }
}

// ---------------------------------------------------------------------------
// Task operations
// ---------------------------------------------------------------------------

impl Kernel {
    /// Create a new task and enqueue it ready.
    ///
    /// The task's stack extent is carved from the kernel stack arena and an
    /// initial exception frame is written so the first context switch into
    /// the task lands on `entry`.
    ///
    /// # Errors
    /// - [`KernelError::CapacityExceeded`] — the task table or the stack
    ///   arena is exhausted; system state is unchanged.
    /// - [`KernelError::InvalidArgument`] — `stack_words` is outside
    ///   `MIN_STACK_WORDS..=MAX_STACK_WORDS`.
    pub fn create_task(
        &mut self,
        entry: fn(),
        stack_words: u16,
        priority: u8,
        periodicity: u32,
    ) -> Result<TaskId, KernelError> {
        if self.tasks.is_full() {
            return Err(KernelError::CapacityExceeded);
        }
        if stack_words < MIN_STACK_WORDS || stack_words > MAX_STACK_WORDS {
            return Err(KernelError::InvalidArgument);
        }

        let stack_top = self
            .stack_arena
            .carve(stack_words)
            .ok_or(KernelError::CapacityExceeded)?;
        let sp = self.stack_arena.write_initial_frame(stack_top, entry);

        let id = self.tasks.allocate();
        self.tasks[id] = Tcb {
            id,
            priority,
            periodicity,
            delay_ticks: 0,
            stack_words,
            stack_top,
            sp,
            state: TaskState::Ready,
            entry: Some(entry),
            next: None,
        };
        self.enqueue_ready(id);

        Ok(id)
    }

    /// Withdraw a task from scheduling.
    ///
    /// Only Ready and Blocked tasks can be suspended; an Active, Waiting or
    /// already-Suspended task is left untouched, as is the idle task and any
    /// id that names no created task. Suspending a Blocked task has the same
    /// delay-queue side effects as a normal wake (the tick counter resets if
    /// the queue empties).
    pub fn suspend_task(&mut self, id: TaskId) {
        if id == TaskId::IDLE || !self.tasks.is_valid(id) {
            return;
        }
        match self.tasks[id].state {
            TaskState::Ready => {
                self.dequeue_ready(id);
                self.tasks[id].state = TaskState::Suspended;
            }
            TaskState::Blocked => {
                self.dequeue_blocked(id);
                self.tasks[id].state = TaskState::Suspended;
            }
            _ => {}
        }
    }

    /// Return a suspended task to the ready queue.
    ///
    /// Ignored for tasks in any other state: re-enqueueing a task that is
    /// already in a queue would corrupt that queue's links.
    pub fn resume_task(&mut self, id: TaskId) {
        if !self.tasks.is_valid(id) {
            return;
        }
        if self.tasks[id].state == TaskState::Suspended {
            self.enqueue_ready(id);
        }
    }

    /// Put the active task to sleep for `ticks` scheduler ticks.
    ///
    /// Does not return to the caller until the delay has expired and the
    /// task is scheduled again.
    pub fn delay_current(&mut self, ticks: u32) {
        let active = self.active_id();
        self.tasks[active].delay_ticks = ticks as u64;
        self.force_task_transition();
    }

    /// Yield the active task, re-arming it with its own periodicity.
    pub fn yield_current(&mut self) {
        let active = self.active_id();
        self.tasks[active].delay_ticks = self.tasks[active].periodicity as u64;
        self.force_task_transition();
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
