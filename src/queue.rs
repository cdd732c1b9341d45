//! # Ordered Task Queue
//!
//! A single ordered-insert list abstraction backs every queue in the
//! kernel: the ready queue (keyed by priority), the delay queue (keyed by
//! absolute wake tick) and each mutex's wait queue (keyed by priority).
//!
//! The queue is an ownership-free view over [`Tcb`] nodes living in the
//! [`TaskTable`]: it stores only head/rear handles and a length, and links
//! members through the intrusive `next` field inside each TCB. A task is a
//! member of at most one queue at a time.
//!
//! The queue itself never touches `Tcb::state`; the kernel-level enqueue
//! helpers at the bottom of this module stamp state alongside membership so
//! the two can never drift apart.

use crate::kernel::Kernel;
use crate::mutex::MutexHandle;
use crate::task::{TaskId, TaskState, TaskTable};

// ---------------------------------------------------------------------------
// Comparator selection
// ---------------------------------------------------------------------------

/// Which key a queue orders by.
///
/// A tagged choice rather than a bare integer: inserting with the wrong
/// comparator is a type-visible mistake at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Ascending task priority (numerically lower runs first).
    Priority,
    /// Ascending absolute wake tick (earliest deadline first).
    WakeTick,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Priority-or-deadline ordered singly-linked list of tasks.
///
/// Invariant: members are in ascending order of the comparator key; equal
/// keys keep arrival order (a new task is inserted after its equals, so
/// ordering is stable and non-preemptive among peers).
#[derive(Debug)]
pub struct TaskQueue {
    head: Option<TaskId>,
    rear: Option<TaskId>,
    len: usize,
}

impl TaskQueue {
    pub const fn new() -> Self {
        Self {
            head: None,
            rear: None,
            len: 0,
        }
    }

    #[inline]
    pub fn head(&self) -> Option<TaskId> {
        self.head
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert `id` at the position that keeps the queue sorted ascending by
    /// `key`. Runs in time linear in the queue length, which is bounded by
    /// the compile-time task capacity — acceptable in tick-interrupt
    /// context.
    pub fn insert(&mut self, tasks: &mut TaskTable, key: SortKey, id: TaskId) {
        let item_key = tasks[id].sort_key(key);

        match self.head {
            // Empty queue.
            None => {
                tasks[id].next = None;
                self.head = Some(id);
                self.rear = Some(id);
            }
            // New head: strictly better than the current head. Equal keys
            // fall through so existing members keep their turn.
            Some(head) if tasks[head].sort_key(key) > item_key => {
                tasks[id].next = Some(head);
                self.head = Some(id);
            }
            // Walk to the first member that sorts strictly after the new
            // task and splice in front of it, or append at the rear.
            Some(head) => {
                let mut cursor = head;
                while let Some(next) = tasks[cursor].next {
                    if tasks[next].sort_key(key) > item_key {
                        break;
                    }
                    cursor = next;
                }
                tasks[id].next = tasks[cursor].next;
                tasks[cursor].next = Some(id);
                if tasks[id].next.is_none() {
                    self.rear = Some(id);
                }
            }
        }

        self.len += 1;
    }

    /// Unlink `id` if present. Removing from an empty queue, or a task that
    /// is not a member, is a no-op rather than an error.
    pub fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let Some(head) = self.head else {
            return;
        };

        if head == id {
            self.head = tasks[id].next;
            if self.head.is_none() {
                self.rear = None;
            }
            tasks[id].next = None;
            self.len -= 1;
            return;
        }

        let mut cursor = head;
        while let Some(next) = tasks[cursor].next {
            if next == id {
                tasks[cursor].next = tasks[id].next;
                if self.rear == Some(id) {
                    self.rear = Some(cursor);
                }
                tasks[id].next = None;
                self.len -= 1;
                return;
            }
            cursor = next;
        }
    }

    /// Membership probe, linear scan.
    pub fn contains(&self, tasks: &TaskTable, id: TaskId) -> bool {
        let mut cursor = self.head;
        while let Some(member) = cursor {
            if member == id {
                return true;
            }
            cursor = tasks[member].next;
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Kernel-level queue helpers
// ---------------------------------------------------------------------------

/// These helpers pair every queue mutation with the matching state stamp
/// and the kernel-state side effects (delay-list quiescence flag, tick
/// counter reset), so callers cannot get one without the other.
impl Kernel {
    /// Mark `id` Ready and insert it into the ready queue by priority.
    pub(crate) fn enqueue_ready(&mut self, id: TaskId) {
        self.tasks[id].state = TaskState::Ready;
        self.ready_queue.insert(&mut self.tasks, SortKey::Priority, id);
    }

    /// Remove `id` from the ready queue. The idle task is pinned there for
    /// the life of the system; removing it is silently refused.
    pub(crate) fn dequeue_ready(&mut self, id: TaskId) {
        if id == TaskId::IDLE {
            return;
        }
        self.ready_queue.remove(&mut self.tasks, id);
    }

    /// Mark `id` Blocked, rewrite its delay request into an absolute wake
    /// tick and insert it into the delay queue.
    pub(crate) fn enqueue_blocked(&mut self, id: TaskId) {
        self.blocked_empty = false;
        self.tasks[id].state = TaskState::Blocked;
        self.tasks[id].delay_ticks += self.tick_counter;
        self.blocked_queue.insert(&mut self.tasks, SortKey::WakeTick, id);
    }

    /// Remove `id` from the delay queue. When the queue empties, the
    /// quiescence flag is set and the tick counter rewinds to zero, which
    /// bounds its range to the span of outstanding delays.
    pub(crate) fn dequeue_blocked(&mut self, id: TaskId) {
        self.blocked_queue.remove(&mut self.tasks, id);
        if self.blocked_queue.is_empty() {
            self.blocked_empty = true;
            self.tick_counter = 0;
        }
    }

    /// Mark `id` Waiting and park it in the mutex's wait queue by priority.
    pub(crate) fn enqueue_waiting(&mut self, handle: MutexHandle, id: TaskId) {
        self.tasks[id].state = TaskState::Waiting;
        self.mutexes[handle]
            .wait_queue
            .insert(&mut self.tasks, SortKey::Priority, id);
    }

    /// Remove `id` from the mutex's wait queue.
    pub(crate) fn dequeue_waiting(&mut self, handle: MutexHandle, id: TaskId) {
        self.mutexes[handle].wait_queue.remove(&mut self.tasks, id);
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
