//! # Task Descriptor
//!
//! Defines the task model for EDF OS. Each task carries a fixed relative
//! deadline chosen at creation; the scheduler turns it into an absolute
//! deadline every time the task is activated.
//!
//! ## Deadline Model
//!
//! - `relative_deadline` is fixed at creation and never changes.
//! - `absolute_deadline = activation tick + relative_deadline`, recomputed
//!   on every activation and *only* on activation. Preemption does not touch
//!   it.
//! - The absolute deadline is meaningful while the task is Ready or Running.
//!   While Blocked it is stale and [`TaskDescriptor::absolute_deadline`]
//!   reports `None`.

use core::cmp::Ordering;
use core::fmt;
use core::num::NonZeroU32;

use crate::config::MAX_TASK_NAME_LEN;
use crate::error::KernelError;
use crate::tick::Tick;

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a deadline task.
///
/// Tasks never terminate: a periodic task alternates between Blocked and
/// Ready forever. Running is the Ready task that currently owns the CPU.
///
/// ```text
///                activate()
///   ┌──────────┐ ──────────► ┌─────────┐  dispatch  ┌─────────┐
///   │ Blocked  │             │  Ready  │ ─────────► │ Running │
///   └──────────┘ ◄────────┐  └─────────┘ ◄───────── └─────────┘
///                         │                preempt       │
///                         └──────────────────────────────┘
///                                  block_self()
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Suspended until its next activation.
    Blocked,
    /// Runnable, waiting for the CPU.
    Ready,
    /// Executing.
    Running,
}

impl TaskState {
    /// Ready or Running: the absolute deadline is live.
    #[inline]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }
}

// ---------------------------------------------------------------------------
// Task name
// ---------------------------------------------------------------------------

/// Short fixed-length task label, for diagnostics only.
///
/// Stored inline so snapshots stay `Copy`. Names longer than
/// [`MAX_TASK_NAME_LEN`] bytes are truncated on a character boundary.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskName {
    bytes: [u8; MAX_TASK_NAME_LEN],
    len: u8,
}

impl TaskName {
    /// The empty name, reported while the idle context runs.
    pub const EMPTY: TaskName = TaskName {
        bytes: [0; MAX_TASK_NAME_LEN],
        len: 0,
    };

    pub fn new(name: &str) -> Self {
        let mut end = name.len().min(MAX_TASK_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; MAX_TASK_NAME_LEN];
        bytes[..end].copy_from_slice(&name.as_bytes()[..end]);
        Self {
            bytes,
            len: end as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from a `&str` cut on a char boundary.
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Creation parameters (opaque to the deadline logic)
// ---------------------------------------------------------------------------

/// Task entry point. Receives the creation-time parameter in `r0` and must
/// never return.
pub type TaskEntry = extern "C" fn(usize) -> !;

/// Standard task-creation parameters. The deadline logic never looks at
/// these; the kernel uses them to build the task's initial stack frame.
#[derive(Debug, Clone, Copy)]
pub struct TaskParams {
    pub entry: TaskEntry,
    pub parameter: usize,
    /// Requested stack size in bytes.
    pub stack_size: usize,
    /// Static priority passed through from the creator. EDF ignores it.
    pub base_priority: u8,
}

/// Handle returned by task creation. Wraps the task's registry slot, which
/// is stable for the lifetime of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub(crate) usize);

impl TaskHandle {
    #[inline]
    pub const fn slot(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Task descriptor
// ---------------------------------------------------------------------------

/// Identity and deadline attributes of one deadline task.
///
/// Only the scheduler mutates a descriptor after registration; everyone
/// else gets shared references.
#[derive(Debug, Clone, Copy)]
pub struct TaskDescriptor {
    name: TaskName,
    relative_deadline: NonZeroU32,
    absolute_deadline: Tick,
    sequence: u32,
    params: TaskParams,
    state: TaskState,
    /// Tick at which a task sleeping in `delay_until` is to be activated.
    wake_at: Option<Tick>,
    /// Set once a miss has been reported for the current activation.
    miss_recorded: bool,
}

impl TaskDescriptor {
    /// Build a descriptor for a new task.
    ///
    /// # Errors
    /// [`KernelError::InvalidDeadline`] if `relative_deadline` is zero.
    pub fn new(name: &str, relative_deadline: u32, params: TaskParams) -> Result<Self, KernelError> {
        let relative_deadline =
            NonZeroU32::new(relative_deadline).ok_or(KernelError::InvalidDeadline)?;
        Ok(Self {
            name: TaskName::new(name),
            relative_deadline,
            absolute_deadline: Tick::ZERO,
            sequence: 0,
            params,
            state: TaskState::Blocked,
            wake_at: None,
            miss_recorded: false,
        })
    }

    #[inline]
    pub fn name(&self) -> &TaskName {
        &self.name
    }

    #[inline]
    pub fn relative_deadline(&self) -> u32 {
        self.relative_deadline.get()
    }

    /// Absolute deadline of the current activation, or `None` while blocked.
    #[inline]
    pub fn absolute_deadline(&self) -> Option<Tick> {
        self.state.is_ready().then_some(self.absolute_deadline)
    }

    /// Creation order. Lower numbers win deadline ties.
    #[inline]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    #[inline]
    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    #[inline]
    pub fn wake_at(&self) -> Option<Tick> {
        self.wake_at
    }

    /// EDF order: earlier absolute deadline first, then lower sequence number.
    pub fn edf_cmp(&self, other: &TaskDescriptor) -> Ordering {
        self.absolute_deadline
            .compare(other.absolute_deadline)
            .then(self.sequence.cmp(&other.sequence))
    }

    /// Whether this task must run before `other` under EDF.
    #[inline]
    pub fn precedes(&self, other: &TaskDescriptor) -> bool {
        self.edf_cmp(other) == Ordering::Less
    }

    /// Ready or running with its deadline already passed at `now`.
    pub fn is_overdue(&self, now: Tick) -> bool {
        self.state.is_ready() && self.absolute_deadline.is_before(now)
    }

    // --- scheduler-only mutation ---

    pub(crate) fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }

    /// Blocked → Ready at `now`, establishing a fresh absolute deadline.
    pub(crate) fn release(&mut self, now: Tick) {
        self.absolute_deadline = now.after(self.relative_deadline.get());
        self.state = TaskState::Ready;
        self.wake_at = None;
        self.miss_recorded = false;
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub(crate) fn sleep_until(&mut self, wake: Tick) {
        self.state = TaskState::Blocked;
        self.wake_at = Some(wake);
    }

    /// Returns `true` the first time a miss is noticed for this activation.
    pub(crate) fn note_miss(&mut self, now: Tick) -> bool {
        if self.miss_recorded || !self.is_overdue(now) {
            return false;
        }
        self.miss_recorded = true;
        true
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
