//! # Kernel Errors
//!
//! Every fallible kernel operation returns [`KernelError`]. The variants fall
//! into three groups:
//!
//! - **Fatal at startup**: [`CapacityExceeded`](KernelError::CapacityExceeded)
//!   and [`OutOfMemory`](KernelError::OutOfMemory). The kernel latches the
//!   first one and refuses to start the scheduler.
//! - **Configuration**: [`InvalidDeadline`](KernelError::InvalidDeadline),
//!   rejected at creation time before anything is registered.
//! - **Misuse of the scheduling API**: activating a task that is not
//!   blocked, blocking a task that is not running, unknown slots.
//!
//! Deadline misses are *not* errors. They are recorded in the scheduler
//! snapshot and logged, and scheduling carries on.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// The task registry already holds its configured number of tasks.
    CapacityExceeded,
    /// The stack pool cannot satisfy the requested stack size.
    OutOfMemory,
    /// A relative deadline of zero ticks was requested.
    InvalidDeadline,
    /// The slot does not name a registered task.
    InvalidSlot(usize),
    /// The task is already ready or running.
    NotBlocked(usize),
    /// The task is not the one currently executing.
    NotRunning(usize),
    /// A task-context call was made while only the idle context runs.
    NoRunningTask,
    /// Start was refused because task creation failed earlier.
    StartupFault(StartupCause),
    /// Start was requested with no tasks registered.
    NoTasks,
    /// The scheduler is already running.
    AlreadyStarted,
}

/// The creation failure latched by the kernel. Kept separate from
/// [`KernelError`] so the refusal can name its cause without recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupCause {
    CapacityExceeded,
    OutOfMemory,
}

impl KernelError {
    /// Whether this error must prevent the scheduler from starting.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CapacityExceeded | Self::OutOfMemory)
    }

    pub(crate) const fn startup_cause(&self) -> Option<StartupCause> {
        match self {
            Self::CapacityExceeded => Some(StartupCause::CapacityExceeded),
            Self::OutOfMemory => Some(StartupCause::OutOfMemory),
            _ => None,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => f.write_str("task registry is full"),
            Self::OutOfMemory => f.write_str("stack pool exhausted"),
            Self::InvalidDeadline => f.write_str("relative deadline must be at least one tick"),
            Self::InvalidSlot(slot) => write!(f, "no task in slot {slot}"),
            Self::NotBlocked(slot) => write!(f, "task {slot} is already ready"),
            Self::NotRunning(slot) => write!(f, "task {slot} is not running"),
            Self::NoRunningTask => f.write_str("no task is running"),
            Self::StartupFault(cause) => write!(f, "scheduler start refused: {cause}"),
            Self::NoTasks => f.write_str("no tasks created"),
            Self::AlreadyStarted => f.write_str("scheduler already started"),
        }
    }
}

impl fmt::Display for StartupCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded => f.write_str("task registry overflowed"),
            Self::OutOfMemory => f.write_str("task stack allocation failed"),
        }
    }
}

impl core::error::Error for KernelError {}
