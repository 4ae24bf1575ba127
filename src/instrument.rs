//! # Execution Instrumentation
//!
//! The scheduler snapshot: what is running, since when, against which
//! deadline, and how much CPU every task has consumed so far.
//!
//! The snapshot is owned by the scheduler and written only from its
//! update path, once per dispatch and once per block. Everybody else reads
//! a copy (see `kernel::snapshot()`), so readers never hold a reference
//! into live scheduler state. Values are as of the last scheduling event:
//! in particular a running task's runtime does not include the slice it
//! is currently executing.

use crate::task::{TaskDescriptor, TaskName, TaskState};
use crate::tick::Tick;

/// Per-task timing counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    pub name: TaskName,
    pub state: TaskState,
    /// Tick at which the task's most recent execution slice began.
    pub begin_time: Tick,
    /// Ticks of CPU consumed, cumulative across activations.
    pub runtime: u32,
    /// Absolute deadline of the current activation (stale while blocked).
    pub deadline: Tick,
    pub activations: u32,
    pub deadline_misses: u32,
}

impl TaskStats {
    const EMPTY: TaskStats = TaskStats {
        name: TaskName::EMPTY,
        state: TaskState::Blocked,
        begin_time: Tick::ZERO,
        runtime: 0,
        deadline: Tick::ZERO,
        activations: 0,
        deadline_misses: 0,
    };
}

/// Process-wide scheduling snapshot for a system of `N` tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot<const N: usize> {
    current: Option<usize>,
    current_name: TaskName,
    current_begin: Tick,
    current_deadline: Option<Tick>,
    /// Tick of the last update.
    taken_at: Tick,
    context_switches: u32,
    tasks: [TaskStats; N],
    len: usize,
}

impl<const N: usize> SchedulerSnapshot<N> {
    pub const fn new() -> Self {
        Self {
            current: None,
            current_name: TaskName::EMPTY,
            current_begin: Tick::ZERO,
            current_deadline: None,
            taken_at: Tick::ZERO,
            context_switches: 0,
            tasks: [TaskStats::EMPTY; N],
            len: 0,
        }
    }

    // --- read surface ---

    /// Name of the running task; empty while the idle context runs.
    pub fn current_task_name(&self) -> &TaskName {
        &self.current_name
    }

    pub fn current_slot(&self) -> Option<usize> {
        self.current
    }

    /// Tick at which the present execution slice started.
    pub fn current_begin_time(&self) -> Tick {
        self.current_begin
    }

    /// Absolute deadline of the running task.
    pub fn current_deadline(&self) -> Option<Tick> {
        self.current_deadline
    }

    pub fn taken_at(&self) -> Tick {
        self.taken_at
    }

    /// Number of dispatches that put a task on the CPU which was not
    /// already running there.
    pub fn context_switches(&self) -> u32 {
        self.context_switches
    }

    pub fn task_count(&self) -> usize {
        self.len
    }

    pub fn stats(&self, slot: usize) -> Option<&TaskStats> {
        self.tasks[..self.len].get(slot)
    }

    pub fn runtime_of(&self, slot: usize) -> Option<u32> {
        self.stats(slot).map(|s| s.runtime)
    }

    pub fn begin_time_of(&self, slot: usize) -> Option<Tick> {
        self.stats(slot).map(|s| s.begin_time)
    }

    /// Absolute deadline of the task's current activation. `None` while
    /// the task is blocked, since the value is stale then.
    pub fn deadline_of(&self, slot: usize) -> Option<Tick> {
        self.stats(slot)
            .filter(|s| s.state.is_ready())
            .map(|s| s.deadline)
    }

    pub fn activation_count_of(&self, slot: usize) -> Option<u32> {
        self.stats(slot).map(|s| s.activations)
    }

    pub fn deadline_misses_of(&self, slot: usize) -> Option<u32> {
        self.stats(slot).map(|s| s.deadline_misses)
    }

    pub fn state_of(&self, slot: usize) -> Option<TaskState> {
        self.stats(slot).map(|s| s.state)
    }

    /// Caller-side miss detection: the task is ready or running and `now`
    /// is past its absolute deadline.
    pub fn is_overdue(&self, slot: usize, now: Tick) -> bool {
        self.deadline_of(slot)
            .is_some_and(|deadline| deadline.is_before(now))
    }

    // --- scheduler update path ---

    pub(crate) fn record_registration(&mut self, slot: usize, task: &TaskDescriptor) {
        self.tasks[slot] = TaskStats {
            name: *task.name(),
            ..TaskStats::EMPTY
        };
        self.len = self.len.max(slot + 1);
    }

    pub(crate) fn record_activation(&mut self, slot: usize, task: &TaskDescriptor, now: Tick) {
        let stats = &mut self.tasks[slot];
        stats.activations = stats.activations.wrapping_add(1);
        stats.state = task.state();
        stats.deadline = task.absolute_deadline().unwrap_or(stats.deadline);
        self.taken_at = now;
    }

    pub(crate) fn record_dispatch(&mut self, slot: usize, task: &TaskDescriptor, now: Tick) {
        if self.current != Some(slot) {
            self.context_switches = self.context_switches.wrapping_add(1);
        }
        let stats = &mut self.tasks[slot];
        stats.state = task.state();
        stats.begin_time = now;
        self.current = Some(slot);
        self.current_name = *task.name();
        self.current_begin = now;
        self.current_deadline = task.absolute_deadline();
        self.taken_at = now;
    }

    /// The running task was re-released at `now` without leaving the CPU:
    /// charge its slice, count the activation and start a new slice.
    pub(crate) fn record_reactivation(&mut self, slot: usize, task: &TaskDescriptor, now: Tick) {
        let stats = &mut self.tasks[slot];
        stats.runtime = stats.runtime.saturating_add(now.since(stats.begin_time));
        stats.activations = stats.activations.wrapping_add(1);
        stats.state = task.state();
        stats.begin_time = now;
        stats.deadline = task.absolute_deadline().unwrap_or(stats.deadline);
        if self.current == Some(slot) {
            self.current_begin = now;
            self.current_deadline = task.absolute_deadline();
        }
        self.taken_at = now;
    }

    /// Close the running task's slice at `now`: charge the elapsed ticks and
    /// record the state it leaves in (Ready when preempted, Blocked when it
    /// suspends itself).
    pub(crate) fn record_slice_end(&mut self, slot: usize, task: &TaskDescriptor, now: Tick) {
        let stats = &mut self.tasks[slot];
        stats.runtime = stats.runtime.saturating_add(now.since(stats.begin_time));
        stats.state = task.state();
        if self.current == Some(slot) {
            self.current = None;
            self.current_name = TaskName::EMPTY;
            self.current_deadline = None;
            self.current_begin = now;
        }
        self.taken_at = now;
    }

    pub(crate) fn record_miss(&mut self, slot: usize) {
        let stats = &mut self.tasks[slot];
        stats.deadline_misses = stats.deadline_misses.wrapping_add(1);
    }
}

impl<const N: usize> Default for SchedulerSnapshot<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::tests::params;

    fn released(name: &str, deadline: u32, now: u32) -> TaskDescriptor {
        let mut task = TaskDescriptor::new(name, deadline, params()).unwrap();
        task.release(Tick::new(now));
        task
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = SchedulerSnapshot::<3>::new();
        assert!(snapshot.current_task_name().is_empty());
        assert_eq!(snapshot.current_deadline(), None);
        assert_eq!(snapshot.runtime_of(0), None);
    }

    #[test]
    fn test_dispatch_and_slice_accounting() {
        let mut snapshot = SchedulerSnapshot::<3>::new();
        let mut task = released("TA", 10, 100);
        snapshot.record_registration(0, &task);
        snapshot.record_activation(0, &task, Tick::new(100));

        task.set_state(TaskState::Running);
        snapshot.record_dispatch(0, &task, Tick::new(100));
        assert_eq!(snapshot.current_task_name().as_str(), "TA");
        assert_eq!(snapshot.current_begin_time(), Tick::new(100));
        assert_eq!(snapshot.current_deadline(), Some(Tick::new(110)));
        assert_eq!(snapshot.activation_count_of(0), Some(1));

        task.sleep_until(Tick::new(600));
        snapshot.record_slice_end(0, &task, Tick::new(104));
        assert_eq!(snapshot.runtime_of(0), Some(4));
        assert_eq!(snapshot.deadline_of(0), None);
        assert!(snapshot.current_task_name().is_empty());
        assert_eq!(snapshot.context_switches(), 1);
    }

    #[test]
    fn test_reads_are_stable_between_events() {
        let mut snapshot = SchedulerSnapshot::<2>::new();
        let task = released("TA", 10, 0);
        snapshot.record_registration(0, &task);
        snapshot.record_activation(0, &task, Tick::ZERO);

        let first = (snapshot.runtime_of(0), snapshot.deadline_of(0), snapshot.begin_time_of(0));
        let second = (snapshot.runtime_of(0), snapshot.deadline_of(0), snapshot.begin_time_of(0));
        assert_eq!(first, second);
    }

    #[test]
    fn test_counters_wrap_instead_of_overflowing() {
        let mut snapshot = SchedulerSnapshot::<1>::new();
        let task = released("TA", 10, 0);
        snapshot.record_registration(0, &task);
        snapshot.tasks[0].activations = u32::MAX;
        snapshot.tasks[0].deadline_misses = u32::MAX;
        snapshot.context_switches = u32::MAX;

        snapshot.record_activation(0, &task, Tick::ZERO);
        snapshot.record_miss(0);
        snapshot.record_dispatch(0, &task, Tick::ZERO);
        assert_eq!(snapshot.activation_count_of(0), Some(0));
        assert_eq!(snapshot.deadline_misses_of(0), Some(0));
        assert_eq!(snapshot.context_switches(), 0);
    }

    #[test]
    fn test_reactivation_keeps_the_slice_running() {
        let mut snapshot = SchedulerSnapshot::<1>::new();
        let mut task = released("TA", 10, 0);
        snapshot.record_registration(0, &task);
        snapshot.record_activation(0, &task, Tick::ZERO);
        task.set_state(TaskState::Running);
        snapshot.record_dispatch(0, &task, Tick::ZERO);

        task.release(Tick::new(30));
        task.set_state(TaskState::Running);
        snapshot.record_reactivation(0, &task, Tick::new(30));
        assert_eq!(snapshot.runtime_of(0), Some(30));
        assert_eq!(snapshot.activation_count_of(0), Some(2));
        assert_eq!(snapshot.current_slot(), Some(0));
        assert_eq!(snapshot.current_begin_time(), Tick::new(30));
        assert_eq!(snapshot.current_deadline(), Some(Tick::new(40)));
        assert_eq!(snapshot.context_switches(), 1);
    }

    #[test]
    fn test_overdue_detection() {
        let mut snapshot = SchedulerSnapshot::<1>::new();
        let task = released("TA", 10, 0);
        snapshot.record_registration(0, &task);
        snapshot.record_activation(0, &task, Tick::ZERO);
        assert!(!snapshot.is_overdue(0, Tick::new(10)));
        assert!(snapshot.is_overdue(0, Tick::new(11)));
    }
}
