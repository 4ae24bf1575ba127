//! # EDF OS Configuration
//!
//! Compile-time constants governing the scheduler and system behavior.
//! All limits are fixed at compile time — no dynamic allocation.

/// Number of deadline tasks the system expects to manage.
/// This is the capacity of the global task registry. EDF ordering assumes
/// the full task set is known before the scheduler starts, so creating more
/// tasks than this is a fatal startup error rather than a runtime condition.
pub const EXPECTED_EDF_TASKS: usize = 3;

/// Maximum length of a task name in bytes. Longer names are truncated.
pub const MAX_TASK_NAME_LEN: usize = 16;

/// SysTick frequency in Hz. Determines scheduler tick granularity.
/// Preemption on activation is immediate, but wake-ups from the periodic
/// delay are only observed on tick boundaries.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

/// Default task stack size in bytes. Requests below the initial exception
/// frame (16 words) are rounded up to it by the stack pool.
pub const MINIMAL_STACK_SIZE: usize = 512;

/// Stack reserved for the idle context, which only ever executes `wfi`.
pub const IDLE_STACK_SIZE: usize = 256;

/// Total bytes available for all task stacks plus the idle stack.
/// Exhausting this pool makes task creation fail with `OutOfMemory`.
pub const STACK_POOL_SIZE: usize = 8 * 1024;

/// [`STACK_POOL_SIZE`] expressed in 32-bit words.
pub const STACK_POOL_WORDS: usize = STACK_POOL_SIZE / 4;
