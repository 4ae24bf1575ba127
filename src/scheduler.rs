//! # Scheduler
//!
//! Earliest-Deadline-First dispatch for EDF OS. Priority is not a number
//! fixed at creation: among all ready tasks, the one whose absolute
//! deadline comes first runs, and ties go to the task created first.
//!
//! ## Scheduling Events
//!
//! The ordering is re-evaluated synchronously on every event that can
//! change it, never deferred:
//!
//! 1. **Activation** (`activate`): a blocked task becomes ready with
//!    `absolute_deadline = now + relative_deadline`. If it now precedes the
//!    running task, the running task is preempted on the spot. The
//!    preempted task keeps its absolute deadline.
//! 2. **Self-block** (`block_self` / `sleep_until`): the running task
//!    suspends, its slice is charged to its runtime, and the earliest
//!    remaining ready task is dispatched. With nothing ready, the idle
//!    context runs.
//! 3. **Tick** (`tick`): sleepers whose wake tick has been reached are
//!    activated, then deadline misses are recorded.
//!
//! ## Deadline Misses
//!
//! A ready or running task whose absolute deadline has passed is logged
//! and counted in the snapshot, once per activation. It is never aborted
//! or demoted: under transient overload EDF keeps scheduling by deadline.

use log::{debug, info, trace, warn};

use crate::error::KernelError;
use crate::instrument::SchedulerSnapshot;
use crate::registry::TaskRegistry;
use crate::task::{TaskDescriptor, TaskParams, TaskState};
use crate::tick::Tick;

/// Outcome of activating a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The CPU was idle; the task was dispatched immediately.
    Dispatched,
    /// The task preempted the previously running task.
    Preempted { previous: usize },
    /// The running task still precedes it; it waits in the ready set.
    Queued,
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The EDF scheduler state for a system of at most `N` tasks.
///
/// ## Design Notes
///
/// - Tasks are stored in a fixed-size registry (no heap); slots double as
///   sequence numbers for tie-breaking
/// - `current` is the running task; `None` means the idle context
/// - The snapshot is updated only from inside this type
pub struct Scheduler<const N: usize> {
    tasks: TaskRegistry<N>,
    current: Option<usize>,
    snapshot: SchedulerSnapshot<N>,
}

impl<const N: usize> Scheduler<N> {
    pub const fn new() -> Self {
        Self {
            tasks: TaskRegistry::new(),
            current: None,
            snapshot: SchedulerSnapshot::new(),
        }
    }

    /// Register a new deadline task. The task starts out blocked.
    ///
    /// # Errors
    /// - [`KernelError::InvalidDeadline`] if `relative_deadline` is zero
    /// - [`KernelError::CapacityExceeded`] if all `N` slots are taken
    pub fn create_task(
        &mut self,
        name: &str,
        relative_deadline: u32,
        params: TaskParams,
    ) -> Result<usize, KernelError> {
        let descriptor = TaskDescriptor::new(name, relative_deadline, params)?;
        self.register(descriptor)
    }

    /// Register an already-built descriptor.
    pub fn register(&mut self, descriptor: TaskDescriptor) -> Result<usize, KernelError> {
        let slot = self.tasks.register(descriptor)?;
        let task = self.tasks.lookup(slot)?;
        self.snapshot.record_registration(slot, task);
        info!(
            "task {} created in slot {} (relative deadline {} ticks)",
            task.name(),
            slot,
            task.relative_deadline()
        );
        Ok(slot)
    }

    /// Blocked → Ready at `now`, preempting the running task if the
    /// activated task now has the earliest deadline.
    ///
    /// # Errors
    /// - [`KernelError::InvalidSlot`] for an unknown slot
    /// - [`KernelError::NotBlocked`] if the task is already ready or running
    pub fn activate(&mut self, slot: usize, now: Tick) -> Result<Activation, KernelError> {
        let task = self.tasks.lookup_mut(slot)?;
        if task.state().is_ready() {
            return Err(KernelError::NotBlocked(slot));
        }
        task.release(now);
        self.snapshot.record_activation(slot, task, now);
        trace!("activate {} at {}, deadline {}", task.name(), now, task.absolute_deadline().unwrap_or(now));

        let Some(running) = self.current else {
            self.dispatch(slot, now)?;
            return Ok(Activation::Dispatched);
        };

        if self.tasks.lookup(slot)?.precedes(self.tasks.lookup(running)?) {
            self.preempt(running, now)?;
            self.dispatch(slot, now)?;
            Ok(Activation::Preempted { previous: running })
        } else {
            Ok(Activation::Queued)
        }
    }

    /// The running task suspends itself. Its slice is charged to its
    /// runtime and the earliest remaining ready task is dispatched.
    ///
    /// # Returns
    /// The slot now running, or `None` for the idle context.
    ///
    /// # Errors
    /// [`KernelError::NotRunning`] unless `slot` is the running task.
    pub fn block_self(&mut self, slot: usize, now: Tick) -> Result<Option<usize>, KernelError> {
        self.ensure_running(slot)?;
        self.tasks.lookup_mut(slot)?.set_state(TaskState::Blocked);
        self.end_slice(slot, now)?;
        self.reschedule(now)
    }

    /// [`block_self`](Self::block_self) until `wake`; [`tick`](Self::tick)
    /// activates the task once the wake tick is reached.
    pub fn sleep_until(&mut self, slot: usize, wake: Tick, now: Tick) -> Result<Option<usize>, KernelError> {
        self.ensure_running(slot)?;
        self.tasks.lookup_mut(slot)?.sleep_until(wake);
        self.end_slice(slot, now)?;
        self.reschedule(now)
    }

    /// The running task starts its next activation at `now` without
    /// blocking first (its wake tick has already passed). Its slice is
    /// charged and its deadline renewed; only if another ready task now
    /// precedes it does the CPU change hands.
    ///
    /// # Returns
    /// The slot now running.
    ///
    /// # Errors
    /// [`KernelError::NotRunning`] unless `slot` is the running task.
    pub fn reactivate_self(&mut self, slot: usize, now: Tick) -> Result<Option<usize>, KernelError> {
        self.ensure_running(slot)?;
        let task = self.tasks.lookup_mut(slot)?;
        task.release(now);
        task.set_state(TaskState::Running);
        self.snapshot.record_reactivation(slot, task, now);
        trace!("reactivate {} at {}, deadline {}", task.name(), now, task.absolute_deadline().unwrap_or(now));

        if let Some(next) = self.earliest_ready().filter(|&next| next != slot) {
            self.preempt(slot, now)?;
            self.dispatch(next, now)?;
        }
        Ok(self.current)
    }

    /// Process one tick at `now`: activate due sleepers in creation order,
    /// then record deadline misses.
    ///
    /// # Returns
    /// `true` if the running task changed.
    pub fn tick(&mut self, now: Tick) -> bool {
        let before = self.current;

        let mut due = [false; N];
        for (slot, task) in self.tasks.iter() {
            due[slot] = task.state() == TaskState::Blocked
                && task.wake_at().is_some_and(|wake| now.has_reached(wake));
        }
        for slot in (0..N).filter(|&slot| due[slot]) {
            if let Err(err) = self.activate(slot, now) {
                warn!("cannot wake slot {} at {}: {}", slot, now, err);
            }
        }

        self.record_misses(now);
        self.current != before
    }

    /// The ready task EDF would run right now.
    pub fn earliest_ready(&self) -> Option<usize> {
        self.tasks
            .iter()
            .filter(|(_, task)| task.state().is_ready())
            .reduce(|best, candidate| {
                if candidate.1.precedes(best.1) {
                    candidate
                } else {
                    best
                }
            })
            .map(|(slot, _)| slot)
    }

    /// The running task, or `None` while idle.
    #[inline]
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn task(&self, slot: usize) -> Result<&TaskDescriptor, KernelError> {
        self.tasks.lookup(slot)
    }

    pub fn registry(&self) -> &TaskRegistry<N> {
        &self.tasks
    }

    pub fn snapshot(&self) -> &SchedulerSnapshot<N> {
        &self.snapshot
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.tasks.is_full()
    }

    // -----------------------------------------------------------------------
    // Internal update path
    // -----------------------------------------------------------------------

    fn ensure_running(&self, slot: usize) -> Result<(), KernelError> {
        self.tasks.lookup(slot)?;
        if self.current == Some(slot) {
            Ok(())
        } else {
            Err(KernelError::NotRunning(slot))
        }
    }

    /// Put `slot` on the CPU and publish it in the snapshot.
    fn dispatch(&mut self, slot: usize, now: Tick) -> Result<(), KernelError> {
        let task = self.tasks.lookup_mut(slot)?;
        task.set_state(TaskState::Running);
        self.snapshot.record_dispatch(slot, task, now);
        self.current = Some(slot);
        debug!("dispatch {} at {}", task.name(), now);
        Ok(())
    }

    /// Running → Ready. The absolute deadline is left untouched.
    fn preempt(&mut self, slot: usize, now: Tick) -> Result<(), KernelError> {
        self.tasks.lookup_mut(slot)?.set_state(TaskState::Ready);
        debug!("preempt {} at {}", self.tasks.lookup(slot)?.name(), now);
        self.end_slice(slot, now)
    }

    fn end_slice(&mut self, slot: usize, now: Tick) -> Result<(), KernelError> {
        let task = self.tasks.lookup(slot)?;
        self.snapshot.record_slice_end(slot, task, now);
        if self.current == Some(slot) {
            self.current = None;
        }
        Ok(())
    }

    fn reschedule(&mut self, now: Tick) -> Result<Option<usize>, KernelError> {
        match self.earliest_ready() {
            Some(next) => self.dispatch(next, now)?,
            None => trace!("idle at {}", now),
        }
        Ok(self.current)
    }

    fn record_misses(&mut self, now: Tick) {
        for (slot, task) in self.tasks.iter_mut() {
            if task.note_miss(now) {
                self.snapshot.record_miss(slot);
                warn!(
                    "deadline miss: {} (slot {}) due at {}, now {}",
                    task.name(),
                    slot,
                    task.absolute_deadline().unwrap_or(now),
                    now
                );
            }
        }
    }
}

impl<const N: usize> Default for Scheduler<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::tests::params;
    use proptest::prelude::*;

    fn scheduler_with(deadlines: &[u32]) -> Scheduler<8> {
        let mut scheduler = Scheduler::new();
        for (i, &deadline) in deadlines.iter().enumerate() {
            let name = ["T0", "T1", "T2", "T3", "T4", "T5", "T6", "T7"][i];
            scheduler.create_task(name, deadline, params()).unwrap();
        }
        scheduler
    }

    #[test]
    fn test_tie_goes_to_first_created() {
        // A and B share relative deadline 10 and are released together.
        let mut scheduler = scheduler_with(&[10, 10, 1000]);
        assert_eq!(scheduler.activate(0, Tick::ZERO), Ok(Activation::Dispatched));
        assert_eq!(scheduler.activate(1, Tick::ZERO), Ok(Activation::Queued));
        assert_eq!(scheduler.current(), Some(0));
        assert_eq!(scheduler.snapshot().current_task_name().as_str(), "T0");

        // Activation order does not matter.
        let mut scheduler = scheduler_with(&[10, 10, 1000]);
        scheduler.activate(1, Tick::ZERO).unwrap();
        assert_eq!(
            scheduler.activate(0, Tick::ZERO),
            Ok(Activation::Preempted { previous: 1 })
        );
        assert_eq!(scheduler.current(), Some(0));
    }

    #[test]
    fn test_earlier_deadline_preempts() {
        let mut scheduler = scheduler_with(&[10, 10, 1000]);
        scheduler.activate(2, Tick::new(1000)).unwrap();
        assert_eq!(scheduler.current(), Some(2));

        let outcome = scheduler.activate(0, Tick::new(1003)).unwrap();
        assert_eq!(outcome, Activation::Preempted { previous: 2 });
        assert_eq!(scheduler.current(), Some(0));

        // The preempted task keeps the deadline of its own activation.
        assert_eq!(scheduler.task(2).unwrap().absolute_deadline(), Some(Tick::new(2000)));
        assert_eq!(scheduler.task(2).unwrap().state(), TaskState::Ready);
        assert_eq!(scheduler.snapshot().runtime_of(2), Some(3));
        assert_eq!(scheduler.snapshot().current_deadline(), Some(Tick::new(1013)));
    }

    #[test]
    fn test_later_deadline_waits() {
        let mut scheduler = scheduler_with(&[10, 10, 1000]);
        scheduler.activate(0, Tick::new(1000)).unwrap();
        assert_eq!(scheduler.activate(2, Tick::new(1000)), Ok(Activation::Queued));
        assert_eq!(scheduler.current(), Some(0));

        assert_eq!(scheduler.block_self(0, Tick::new(1004)), Ok(Some(2)));
        assert_eq!(scheduler.snapshot().runtime_of(0), Some(4));
        assert_eq!(scheduler.snapshot().current_begin_time(), Tick::new(1004));
        assert_eq!(scheduler.snapshot().current_deadline(), Some(Tick::new(2000)));
    }

    #[test]
    fn test_block_to_idle() {
        let mut scheduler = scheduler_with(&[10]);
        scheduler.activate(0, Tick::ZERO).unwrap();
        assert_eq!(scheduler.block_self(0, Tick::new(2)), Ok(None));
        assert_eq!(scheduler.current(), None);
        assert!(scheduler.snapshot().current_task_name().is_empty());
        assert_eq!(scheduler.task(0).unwrap().absolute_deadline(), None);
    }

    #[test]
    fn test_api_misuse_is_rejected() {
        let mut scheduler = scheduler_with(&[10, 20]);
        scheduler.activate(0, Tick::ZERO).unwrap();
        assert_eq!(scheduler.activate(0, Tick::new(1)), Err(KernelError::NotBlocked(0)));
        assert_eq!(scheduler.block_self(1, Tick::new(1)), Err(KernelError::NotRunning(1)));
        assert_eq!(scheduler.activate(5, Tick::new(1)), Err(KernelError::InvalidSlot(5)));
        // Rejected calls leave the counters alone.
        assert_eq!(scheduler.snapshot().activation_count_of(0), Some(1));
    }

    #[test]
    fn test_tick_wakes_sleepers() {
        let mut scheduler = scheduler_with(&[10, 1000]);
        scheduler.activate(0, Tick::ZERO).unwrap();
        scheduler.activate(1, Tick::ZERO).unwrap();
        scheduler.sleep_until(0, Tick::new(500), Tick::new(5)).unwrap();
        assert_eq!(scheduler.current(), Some(1));

        assert!(!scheduler.tick(Tick::new(499)));
        assert!(scheduler.tick(Tick::new(500)));
        assert_eq!(scheduler.current(), Some(0));
        assert_eq!(scheduler.snapshot().activation_count_of(0), Some(2));
        assert_eq!(scheduler.task(0).unwrap().absolute_deadline(), Some(Tick::new(510)));
    }

    #[test]
    fn test_deadline_miss_is_recorded_not_fatal() {
        let mut scheduler = scheduler_with(&[10]);
        scheduler.activate(0, Tick::ZERO).unwrap();
        for now in 1..=20 {
            scheduler.tick(Tick::new(now));
        }
        assert_eq!(scheduler.snapshot().deadline_misses_of(0), Some(1));
        assert_eq!(scheduler.current(), Some(0));
        assert!(scheduler.snapshot().is_overdue(0, Tick::new(20)));
    }

    #[test]
    fn test_ordering_across_tick_wrap() {
        let mut scheduler = scheduler_with(&[10, 100]);
        scheduler.activate(0, Tick::new(u32::MAX - 20)).unwrap();
        // T1's deadline wraps past zero: numerically smaller, but later.
        let outcome = scheduler.activate(1, Tick::new(u32::MAX - 15)).unwrap();
        assert_eq!(scheduler.task(1).unwrap().absolute_deadline(), Some(Tick::new(84)));
        assert_eq!(outcome, Activation::Queued);
        assert_eq!(scheduler.current(), Some(0));

        assert_eq!(scheduler.block_self(0, Tick::new(u32::MAX - 12)), Ok(Some(1)));
    }

    #[test]
    fn test_reactivation_without_blocking() {
        let mut scheduler = scheduler_with(&[10, 1000]);
        scheduler.activate(0, Tick::ZERO).unwrap();
        scheduler.activate(1, Tick::ZERO).unwrap();

        // T0's new deadline (40) still beats T1's (1000): T1 is never touched.
        assert_eq!(scheduler.reactivate_self(0, Tick::new(30)), Ok(Some(0)));
        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.context_switches(), 1);
        assert_eq!(snapshot.begin_time_of(1), Some(Tick::ZERO));
        assert_eq!(snapshot.runtime_of(0), Some(30));
        assert_eq!(snapshot.activation_count_of(0), Some(2));
        assert_eq!(snapshot.current_deadline(), Some(Tick::new(40)));
        assert_eq!(scheduler.reactivate_self(1, Tick::new(30)), Err(KernelError::NotRunning(1)));
    }

    #[test]
    fn test_reactivation_yields_to_earlier_deadline() {
        let mut scheduler = scheduler_with(&[10, 30]);
        scheduler.activate(0, Tick::ZERO).unwrap();
        scheduler.activate(1, Tick::ZERO).unwrap();

        // T0 renews to 35, T1 holds 30: exactly one switch to T1.
        assert_eq!(scheduler.reactivate_self(0, Tick::new(25)), Ok(Some(1)));
        let snapshot = scheduler.snapshot();
        assert_eq!(snapshot.context_switches(), 2);
        assert_eq!(snapshot.runtime_of(0), Some(25));
        assert_eq!(snapshot.current_begin_time(), Tick::new(25));
        assert_eq!(scheduler.task(0).unwrap().state(), TaskState::Ready);
        assert_eq!(scheduler.task(0).unwrap().absolute_deadline(), Some(Tick::new(35)));
    }

    proptest! {
        /// Whatever the activation pattern, the running task is the ready
        /// task with the smallest (deadline, sequence) key.
        #[test]
        fn prop_running_task_has_earliest_deadline(
            deadlines in prop::collection::vec(1u32..200, 1..8),
            events in prop::collection::vec((0usize..8, 0u32..5, any::<bool>()), 1..64),
        ) {
            let mut scheduler = scheduler_with(&deadlines);
            let mut now = Tick::ZERO;
            for (slot, advance, block) in events {
                now = now.after(advance);
                let slot = slot % deadlines.len();
                if block {
                    if let Some(running) = scheduler.current() {
                        scheduler.block_self(running, now).unwrap();
                    }
                } else {
                    let _ = scheduler.activate(slot, now);
                }

                let expected = scheduler
                    .registry()
                    .iter()
                    .filter(|(_, t)| t.state().is_ready())
                    .min_by_key(|(slot, t)| (t.absolute_deadline().unwrap().raw(), *slot))
                    .map(|(slot, _)| slot);
                prop_assert_eq!(scheduler.current(), expected);
            }
        }

        /// Runtime never decreases, and only the task that was running
        /// gains any.
        #[test]
        fn prop_runtime_charged_only_to_running_task(
            events in prop::collection::vec((0usize..3, 0u32..7, any::<bool>()), 1..64),
        ) {
            let mut scheduler = scheduler_with(&[10, 10, 1000]);
            let mut now = Tick::ZERO;
            let mut activations = [0u32; 3];
            for (slot, advance, block) in events {
                let before: Vec<u32> = (0..3).map(|s| scheduler.snapshot().runtime_of(s).unwrap()).collect();
                let running = scheduler.current();
                now = now.after(advance);
                if block {
                    if let Some(running) = running {
                        scheduler.block_self(running, now).unwrap();
                    }
                } else if scheduler.activate(slot, now).is_ok() {
                    activations[slot] += 1;
                }
                for s in 0..3 {
                    let after = scheduler.snapshot().runtime_of(s).unwrap();
                    prop_assert!(after >= before[s]);
                    if Some(s) != running {
                        prop_assert_eq!(after, before[s]);
                    }
                    prop_assert_eq!(scheduler.snapshot().activation_count_of(s), Some(activations[s]));
                }
            }
        }
    }
}
