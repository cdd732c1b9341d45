//! # Mutex
//!
//! Priority-ordered mutexes for task synchronization. A contended acquire
//! parks the caller in the mutex's wait queue and forces a reschedule; a
//! release hands ownership straight to the highest-priority waiter, so the
//! mutex never passes through an unlocked window while tasks are queued.
//!
//! There is no priority inheritance: a low-priority owner can still delay a
//! high-priority waiter for as long as it holds the lock.

use crate::config::MAX_MUTEXES;
use crate::kernel::{Kernel, KernelError};
use crate::queue::TaskQueue;
use crate::task::TaskId;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lock state. `Locked` holds exactly when an owner is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexState {
    Unlocked,
    Locked,
}

/// Opaque mutex handle returned by [`Kernel::create_mutex`]. Wraps the
/// slot index in the mutex pool; unique and stable for the program's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexHandle(pub(crate) usize);

/// One synchronization point.
#[derive(Debug)]
pub struct Mutex {
    /// Task currently holding the mutex, if any.
    pub owner: Option<TaskId>,
    pub state: MutexState,
    /// Tasks parked on this mutex, ordered by priority.
    pub wait_queue: TaskQueue,
}

impl Mutex {
    pub const VACANT: Mutex = Mutex {
        owner: None,
        state: MutexState::Unlocked,
        wait_queue: TaskQueue::new(),
    };
}

/// Fixed pool of mutexes. Slots are handed out in creation order and never
/// reclaimed.
#[derive(Debug)]
pub struct MutexTable {
    pool: [Mutex; MAX_MUTEXES],
    count: usize,
}

impl MutexTable {
    pub const fn new() -> Self {
        Self {
            pool: [Mutex::VACANT; MAX_MUTEXES],
            count: 0,
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count >= MAX_MUTEXES
    }

    pub(crate) fn allocate(&mut self) -> MutexHandle {
        let handle = MutexHandle(self.count);
        self.count += 1;
        handle
    }
}

impl core::ops::Index<MutexHandle> for MutexTable {
    type Output = Mutex;

    #[inline]
    fn index(&self, handle: MutexHandle) -> &Mutex {
        &self.pool[handle.0]
    }
}

impl core::ops::IndexMut<MutexHandle> for MutexTable {
    #[inline]
    fn index_mut(&mut self, handle: MutexHandle) -> &mut Mutex {
        &mut self.pool[handle.0]
    }
}

// ---------------------------------------------------------------------------
// Mutex operations
// ---------------------------------------------------------------------------

impl Kernel {
    /// Allocate a mutex from the pool, initialized unlocked with an empty
    /// wait queue.
    ///
    /// # Errors
    /// [`KernelError::CapacityExceeded`] once the pool is exhausted.
    pub fn create_mutex(&mut self) -> Result<MutexHandle, KernelError> {
        if self.mutexes.is_full() {
            return Err(KernelError::CapacityExceeded);
        }
        let handle = self.mutexes.allocate();
        self.mutexes[handle] = Mutex::VACANT;
        Ok(handle)
    }

    /// Acquire the mutex for the active task.
    ///
    /// Uncontended: ownership is taken in O(1) and the task keeps running.
    /// Contended: the active task moves to the wait queue and a forced
    /// transition is requested; on real hardware the call returns only once
    /// a release has made this task the owner.
    pub fn acquire_mutex(&mut self, handle: MutexHandle) {
        let active = self.active_id();
        if self.mutexes[handle].state == MutexState::Unlocked {
            self.mutexes[handle].owner = Some(active);
            self.mutexes[handle].state = MutexState::Locked;
        } else {
            self.enqueue_waiting(handle, active);
            self.force_task_transition();
        }
    }

    /// Release the mutex held by the active task.
    ///
    /// A release by any task other than the owner is silently ignored.
    /// With waiters present, the wait queue's head becomes the owner before
    /// it is made ready — the mutex stays locked across the hand-off, so no
    /// other task can sneak in between release and wakeup. Without waiters
    /// the mutex unlocks and the owner is cleared.
    pub fn release_mutex(&mut self, handle: MutexHandle) {
        let active = self.active_id();
        if self.mutexes[handle].owner != Some(active) {
            return;
        }

        match self.mutexes[handle].wait_queue.head() {
            Some(next_owner) => {
                self.mutexes[handle].owner = Some(next_owner);
                self.dequeue_waiting(handle, next_owner);
                self.enqueue_ready(next_owner);
            }
            None => {
                self.mutexes[handle].owner = None;
                self.mutexes[handle].state = MutexState::Unlocked;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;

    fn entry() {}

    fn booted_kernel() -> Kernel {
        let mut k = Kernel::new();
        k.init();
        k
    }

    #[test]
    fn creation_exhausts_the_pool() {
        let mut k = booted_kernel();
        for i in 0..MAX_MUTEXES {
            let handle = k.create_mutex().unwrap();
            assert_eq!(handle.0, i);
        }
        assert_eq!(k.create_mutex(), Err(KernelError::CapacityExceeded));
    }

    #[test]
    fn uncontended_acquire_takes_ownership_without_blocking() {
        let mut k = booted_kernel();
        let a = k.create_task(entry, 64, 1, 0).unwrap();
        k.prepare_launch();
        let m = k.create_mutex().unwrap();

        k.acquire_mutex(m);
        assert_eq!(k.mutexes[m].state, MutexState::Locked);
        assert_eq!(k.mutexes[m].owner, Some(a));
        assert_eq!(k.tasks[a].state, TaskState::Active);
        assert!(!k.take_switch_pending());
    }

    #[test]
    fn contended_acquire_parks_the_caller() {
        let mut k = booted_kernel();
        let owner = k.create_task(entry, 64, 0, 0).unwrap();
        let waiter = k.create_task(entry, 64, 1, 0).unwrap();
        k.prepare_launch();
        let m = k.create_mutex().unwrap();
        k.acquire_mutex(m);

        k.delay_current(10);
        k.commit_pending_switch();
        assert_eq!(k.active, Some(waiter));

        k.acquire_mutex(m);
        k.commit_pending_switch();

        // The waiter is parked on the mutex, not in the delay queue, and
        // the idle task has taken over the CPU.
        assert_eq!(k.tasks[waiter].state, TaskState::Waiting);
        assert_eq!(k.mutexes[m].wait_queue.head(), Some(waiter));
        assert!(!k.blocked_queue.contains(&k.tasks, waiter));
        assert_eq!(k.mutexes[m].owner, Some(owner));
        assert_eq!(k.active, Some(TaskId::IDLE));
    }

    #[test]
    fn release_hands_off_to_the_highest_priority_waiter() {
        let mut k = booted_kernel();
        let owner = k.create_task(entry, 64, 0, 0).unwrap();
        let low = k.create_task(entry, 64, 2, 0).unwrap();
        let high = k.create_task(entry, 64, 1, 0).unwrap();
        k.prepare_launch();
        let m = k.create_mutex().unwrap();
        k.acquire_mutex(m);

        // Park the low-priority task first: hold `high` aside so `low`
        // gets the CPU when the owner goes to sleep.
        k.suspend_task(high);
        k.delay_current(2);
        k.commit_pending_switch();
        assert_eq!(k.active, Some(low));
        k.acquire_mutex(m);
        k.commit_pending_switch();

        // Now let the high-priority task arrive second.
        k.resume_task(high);
        k.scheduler_tick();
        k.commit_pending_switch();
        assert_eq!(k.active, Some(high));
        k.acquire_mutex(m);
        k.commit_pending_switch();

        // Despite arriving last, the higher-priority task heads the queue.
        assert_eq!(k.mutexes[m].wait_queue.head(), Some(high));

        // Tick 2 wakes the owner, which then releases.
        k.scheduler_tick();
        k.commit_pending_switch();
        assert_eq!(k.active, Some(owner));
        k.release_mutex(m);

        // Hand-off with no unlocked window: still locked, new owner set,
        // the winner is ready again and the loser keeps waiting.
        assert_eq!(k.mutexes[m].state, MutexState::Locked);
        assert_eq!(k.mutexes[m].owner, Some(high));
        assert_eq!(k.tasks[high].state, TaskState::Ready);
        assert!(k.ready_queue.contains(&k.tasks, high));
        assert_eq!(k.tasks[low].state, TaskState::Waiting);
        assert!(k.mutexes[m].wait_queue.contains(&k.tasks, low));
    }

    #[test]
    fn release_without_waiters_unlocks() {
        let mut k = booted_kernel();
        k.create_task(entry, 64, 1, 0).unwrap();
        k.prepare_launch();
        let m = k.create_mutex().unwrap();

        k.acquire_mutex(m);
        k.release_mutex(m);
        assert_eq!(k.mutexes[m].state, MutexState::Unlocked);
        assert_eq!(k.mutexes[m].owner, None);
    }

    #[test]
    fn release_by_non_owner_changes_nothing() {
        let mut k = booted_kernel();
        let owner = k.create_task(entry, 64, 0, 0).unwrap();
        let waiter = k.create_task(entry, 64, 1, 0).unwrap();
        let outsider = k.create_task(entry, 64, 2, 0).unwrap();
        k.prepare_launch();
        let m = k.create_mutex().unwrap();
        k.acquire_mutex(m);

        // Owner sleeps; the waiter runs and parks on the mutex; the
        // outsider then gets the CPU and tries to release a lock it does
        // not hold.
        k.delay_current(10);
        k.commit_pending_switch();
        assert_eq!(k.active, Some(waiter));
        k.acquire_mutex(m);
        k.commit_pending_switch();
        assert_eq!(k.active, Some(outsider));

        k.release_mutex(m);

        assert_eq!(k.mutexes[m].state, MutexState::Locked);
        assert_eq!(k.mutexes[m].owner, Some(owner));
        assert_eq!(k.mutexes[m].wait_queue.len(), 1);
        assert_eq!(k.tasks[waiter].state, TaskState::Waiting);
    }
}
