//! # Scheduler
//!
//! The two entry points that move tasks between queues and pick the next
//! task to run:
//!
//! - [`Kernel::scheduler_tick`] — invoked from the SysTick handler once per
//!   tick. Wakes expired delays and, when preemption is enabled, displaces
//!   the active task if the ready queue's head is at least as urgent.
//! - [`Kernel::force_task_transition`] — invoked synchronously from task
//!   context by `delay`, `yield` and a contended mutex acquire. Always
//!   selects a new task.
//!
//! Both paths only *select* a standby task and request the context-switch
//! trap; the register swap itself happens in the PendSV handler, which
//! calls back into [`Kernel::switch_context`] to commit the hand-over.
//! Funnelling every cause of a switch through that single trigger keeps the
//! trap the one place where `active` changes.

use crate::config;
use crate::kernel::Kernel;
use crate::task::{TaskId, TaskState};

impl Kernel {
    /// Per-tick scheduling decision. Runs in interrupt context.
    ///
    /// The global tick counter only advances while the delay queue is
    /// occupied; with nothing asleep, a tick leaves the kernel untouched
    /// (aside from the preemption check) and the counter stays pinned at
    /// zero.
    pub fn scheduler_tick(&mut self) {
        if !self.blocked_empty {
            self.wake_expired_delays();
        }

        if config::PREEMPTIVE {
            self.preemption_check();
        }
    }

    /// Advance the tick counter and promote every delay-queue head whose
    /// wake tick has arrived. A `while`, not an `if`: any number of tasks
    /// sharing a wake tick are all released on the same tick.
    fn wake_expired_delays(&mut self) {
        self.tick_counter += 1;

        while let Some(head) = self.blocked_queue.head() {
            if self.tasks[head].delay_ticks > self.tick_counter {
                break;
            }
            self.dequeue_blocked(head);
            self.enqueue_ready(head);
        }
    }

    /// Displace the active task if the ready queue's head is not strictly
    /// worse. Equal priority preempts: a peer of the active task gets the
    /// CPU on the next tick rather than waiting for a voluntary yield.
    fn preemption_check(&mut self) {
        let active = self.active_id();
        let head = match self.ready_queue.head() {
            Some(head) => head,
            None => panic!("scheduler: ready queue empty at tick decision, active {:?}", active),
        };

        if self.tasks[head].priority <= self.tasks[active].priority {
            self.standby = Some(head);
            self.dequeue_ready(head);
            if active != TaskId::IDLE {
                self.enqueue_ready(active);
            }
            self.switch_pending = true;
        }
    }

    /// Event-driven reschedule, called from task context by the blocking
    /// primitives. Unconditionally selects the ready queue's head as the
    /// standby task and retires the caller:
    ///
    /// - a task that just parked itself on a mutex (Waiting) stays where it
    ///   is — it must not also land in the delay queue;
    /// - the idle task is never enqueued anywhere;
    /// - any other caller moves to the delay queue, keyed by the wake tick
    ///   derived from its pending delay request.
    pub fn force_task_transition(&mut self) {
        let active = self.active_id();
        let head = match self.ready_queue.head() {
            Some(head) => head,
            None => panic!("scheduler: ready queue empty at forced transition, active {:?}", active),
        };

        self.standby = Some(head);
        self.dequeue_ready(head);

        if self.tasks[active].state != TaskState::Waiting && active != TaskId::IDLE {
            self.enqueue_blocked(active);
        }

        self.switch_pending = true;
    }

    /// Commit the pending hand-over. Called from the context-switch trap
    /// with the outgoing task's saved stack position; returns the incoming
    /// task's stack position for the restore path.
    pub fn switch_context(&mut self, saved_sp: usize) -> usize {
        let outgoing = self.active_id();
        self.tasks[outgoing].sp = saved_sp;

        let incoming = match self.standby.take() {
            Some(id) => id,
            None => panic!("scheduler: context-switch trap with no standby task"),
        };
        self.tasks[incoming].state = TaskState::Active;
        self.active = Some(incoming);
        self.switch_pending = false;

        self.tasks[incoming].sp
    }

    /// Consume the pending-switch request. The SysTick handler uses this to
    /// decide whether to pend the trap; the API wrappers use it after a
    /// primitive that may have forced a transition.
    pub fn take_switch_pending(&mut self) -> bool {
        core::mem::replace(&mut self.switch_pending, false)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() {}

    fn booted_kernel() -> Kernel {
        let mut k = Kernel::new();
        k.init();
        k
    }

    /// Simulate one hardware tick: run the tick handler, then the trap if
    /// one was requested.
    fn tick(k: &mut Kernel) {
        k.scheduler_tick();
        k.commit_pending_switch();
    }

    #[test]
    fn ticking_with_an_empty_delay_queue_changes_nothing() {
        let mut k = booted_kernel();
        let a = k.create_task(entry, 64, 1, 0).unwrap();
        k.prepare_launch();

        for _ in 0..5 {
            k.scheduler_tick();
            k.commit_pending_switch();
            assert_eq!(k.tick_counter, 0);
            assert!(k.blocked_empty);
            assert_eq!(k.active, Some(a));
            assert!(k.blocked_queue.is_empty());
        }
    }

    #[test]
    fn delays_expire_at_their_absolute_wake_tick() {
        let mut k = booted_kernel();
        let a = k.create_task(entry, 64, 1, 0).unwrap();
        let b = k.create_task(entry, 64, 2, 0).unwrap();
        let c = k.create_task(entry, 64, 3, 0).unwrap();
        k.prepare_launch();

        // Each task in turn delays itself: 5, 5 and 7 ticks from tick 0.
        k.delay_current(5);
        k.commit_pending_switch();
        k.delay_current(5);
        k.commit_pending_switch();
        k.delay_current(7);
        k.commit_pending_switch();
        assert_eq!(k.active, Some(TaskId::IDLE));

        for _ in 0..4 {
            tick(&mut k);
        }
        assert_eq!(k.tasks[a].state, TaskState::Blocked);
        assert_eq!(k.tasks[b].state, TaskState::Blocked);

        // Tick 5: both 5-tick sleepers wake together; the 7-tick one stays.
        tick(&mut k);
        assert_eq!(k.active, Some(a));
        assert_eq!(k.tasks[b].state, TaskState::Ready);
        assert_eq!(k.tasks[c].state, TaskState::Blocked);
        assert_eq!(k.tick_counter, 5);

        tick(&mut k);
        assert_eq!(k.tasks[c].state, TaskState::Blocked);

        // Tick 7: the last sleeper wakes, the delay queue empties, and the
        // tick counter rewinds exactly then.
        tick(&mut k);
        assert_ne!(k.tasks[c].state, TaskState::Blocked);
        assert!(k.blocked_empty);
        assert_eq!(k.tick_counter, 0);
    }

    #[test]
    fn zero_tick_delay_wakes_on_the_next_tick() {
        let mut k = booted_kernel();
        let a = k.create_task(entry, 64, 1, 0).unwrap();
        k.prepare_launch();

        k.delay_current(0);
        k.commit_pending_switch();
        assert_eq!(k.tasks[a].state, TaskState::Blocked);

        tick(&mut k);
        assert_eq!(k.active, Some(a));
    }

    #[test]
    fn higher_priority_arrival_preempts_on_the_next_tick() {
        let mut k = booted_kernel();
        let slow = k.create_task(entry, 64, 5, 0).unwrap();
        k.prepare_launch();
        assert_eq!(k.active, Some(slow));

        let urgent = k.create_task(entry, 64, 1, 0).unwrap();
        k.scheduler_tick();
        assert_eq!(k.standby, Some(urgent));
        assert!(k.tasks[slow].state == TaskState::Ready);
        assert!(k.ready_queue.contains(&k.tasks, slow));

        k.commit_pending_switch();
        assert_eq!(k.active, Some(urgent));
        assert_eq!(k.tasks[urgent].state, TaskState::Active);
    }

    #[test]
    fn equal_priority_also_preempts() {
        let mut k = booted_kernel();
        let first = k.create_task(entry, 64, 4, 0).unwrap();
        k.prepare_launch();

        let peer = k.create_task(entry, 64, 4, 0).unwrap();
        tick(&mut k);
        // Run-to-completion does not hold between equals here: the peer
        // takes over and the previous task goes back to ready.
        assert_eq!(k.active, Some(peer));
        assert_eq!(k.tasks[first].state, TaskState::Ready);
    }

    #[test]
    fn lower_priority_ready_task_does_not_preempt() {
        let mut k = booted_kernel();
        let urgent = k.create_task(entry, 64, 1, 0).unwrap();
        k.prepare_launch();
        k.create_task(entry, 64, 6, 0).unwrap();

        for _ in 0..3 {
            tick(&mut k);
            assert_eq!(k.active, Some(urgent));
        }
    }

    #[test]
    fn forced_transition_skips_the_delay_queue_for_waiting_tasks() {
        let mut k = booted_kernel();
        k.create_task(entry, 64, 1, 0).unwrap();
        let b = k.create_task(entry, 64, 2, 0).unwrap();
        k.prepare_launch();
        let m = k.create_mutex().unwrap();
        k.acquire_mutex(m);

        k.delay_current(10);
        k.commit_pending_switch();
        assert_eq!(k.active, Some(b));

        // `b` parks on the mutex: it must end up Waiting, not Blocked.
        k.acquire_mutex(m);
        k.commit_pending_switch();
        assert_eq!(k.tasks[b].state, TaskState::Waiting);
        assert!(!k.blocked_queue.contains(&k.tasks, b));
        assert_eq!(k.blocked_queue.len(), 1);
    }

    #[test]
    fn idle_task_invariants_hold_across_a_busy_schedule() {
        let mut k = booted_kernel();
        k.create_task(entry, 64, 1, 3).unwrap();
        k.create_task(entry, 64, 2, 5).unwrap();
        k.prepare_launch();

        for round in 0..50 {
            // Whoever is active goes to sleep on its periodicity, until
            // only the idle task is left; ticks then wake the sleepers.
            if k.active != Some(TaskId::IDLE) {
                k.yield_current();
                k.commit_pending_switch();
            } else {
                tick(&mut k);
            }

            let idle = &k.tasks[TaskId::IDLE];
            assert_ne!(idle.state, TaskState::Suspended, "round {}", round);
            assert_ne!(idle.state, TaskState::Waiting, "round {}", round);
            assert!(!k.blocked_queue.contains(&k.tasks, TaskId::IDLE));
            assert!(
                k.ready_queue.contains(&k.tasks, TaskId::IDLE)
                    || k.active == Some(TaskId::IDLE)
            );
        }
    }

    #[test]
    fn state_and_queue_membership_agree() {
        let mut k = booted_kernel();
        let a = k.create_task(entry, 64, 1, 2).unwrap();
        let b = k.create_task(entry, 64, 2, 4).unwrap();
        let c = k.create_task(entry, 64, 3, 0).unwrap();
        k.prepare_launch();
        k.suspend_task(c);

        k.delay_current(2);
        k.commit_pending_switch();
        k.delay_current(4);
        k.commit_pending_switch();

        for _ in 0..12 {
            tick(&mut k);
            for id in [a, b, c] {
                let state = k.tasks[id].state;
                let in_ready = k.ready_queue.contains(&k.tasks, id);
                let in_blocked = k.blocked_queue.contains(&k.tasks, id);
                match state {
                    TaskState::Ready => assert!(in_ready && !in_blocked),
                    TaskState::Blocked => assert!(in_blocked && !in_ready),
                    TaskState::Active | TaskState::Suspended => {
                        assert!(!in_ready && !in_blocked)
                    }
                    TaskState::Waiting => unreachable!("no mutex in play"),
                }
            }
        }
    }
}
