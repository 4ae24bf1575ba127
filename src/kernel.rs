//! # Kernel
//!
//! Top-level kernel state and public API for EDF OS.
//!
//! [`Kernel`] ties the EDF scheduler to the resources a real task needs:
//! a stack from the stack pool, a saved stack pointer for the context
//! switch, and the tick counter. The process-wide instance lives in a
//! [`KernelCell`] and is reached through the free functions at the bottom
//! of this module, all of which run inside a critical section.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::init()                  ← Reset kernel state
//!         ├─► kernel::create_deadline_task()  ← Register tasks (×N)
//!         └─► kernel::start()                 ← Launch scheduler
//!               ├─► Refuse if any creation failed fatally
//!               ├─► Activate every task at the current tick
//!               ├─► Configure SysTick, set interrupt priorities
//!               └─► Enter the earliest-deadline task
//! ```
//!
//! Task creation failures caused by capacity or memory are latched: the
//! scheduler never starts with a partial task set.

use log::{debug, error, info};

use crate::arch;
use crate::config::{EXPECTED_EDF_TASKS, IDLE_STACK_SIZE, STACK_POOL_WORDS};
use crate::error::{KernelError, StartupCause};
use crate::instrument::SchedulerSnapshot;
use crate::periodic::{PeriodicActivation, Wake};
use crate::scheduler::{Activation, Scheduler};
use crate::stack::{StackPool, StackRegion};
use crate::sync::KernelCell;
use crate::task::{TaskDescriptor, TaskEntry, TaskHandle, TaskName, TaskParams};
use crate::tick::Tick;

/// A task's stack and its saved stack pointer while switched out.
#[derive(Debug, Clone, Copy)]
struct Context {
    region: StackRegion,
    sp: usize,
}

/// Kernel state for up to `N` tasks sharing a `WORDS`-word stack pool.
pub struct Kernel<const N: usize, const WORDS: usize> {
    scheduler: Scheduler<N>,
    stacks: StackPool<WORDS>,
    contexts: [Option<Context>; N],
    idle: Option<Context>,
    /// Context whose registers are on the core: a slot, or `None` for idle.
    loaded: Option<usize>,
    tick: Tick,
    fault: Option<StartupCause>,
    started: bool,
}

impl<const N: usize, const WORDS: usize> Kernel<N, WORDS> {
    pub const fn new() -> Self {
        Self {
            scheduler: Scheduler::new(),
            stacks: StackPool::new(),
            contexts: [None; N],
            idle: None,
            loaded: None,
            tick: Tick::ZERO,
            fault: None,
            started: false,
        }
    }

    /// Return to the freshly-constructed state without moving the stack
    /// pool through the caller's stack.
    pub fn reset(&mut self) {
        self.scheduler = Scheduler::new();
        self.stacks.reset();
        self.contexts = [None; N];
        self.idle = None;
        self.loaded = None;
        self.tick = Tick::ZERO;
        self.fault = None;
        self.started = false;
    }

    /// Create a deadline task: register it, give it a stack and prepare
    /// its first context.
    ///
    /// # Errors
    /// - [`KernelError::InvalidDeadline`]: zero relative deadline. Nothing
    ///   is registered, and the kernel may still start.
    /// - [`KernelError::CapacityExceeded`], [`KernelError::OutOfMemory`]:
    ///   fatal. The kernel refuses to start afterwards.
    /// - [`KernelError::AlreadyStarted`]: the task set is closed.
    pub fn create_deadline_task(
        &mut self,
        entry: TaskEntry,
        name: &str,
        stack_size: usize,
        parameter: usize,
        base_priority: u8,
        relative_deadline: u32,
    ) -> Result<TaskHandle, KernelError> {
        if self.started {
            return Err(KernelError::AlreadyStarted);
        }
        let params = TaskParams {
            entry,
            parameter,
            stack_size,
            base_priority,
        };
        let descriptor = TaskDescriptor::new(name, relative_deadline, params)?;
        if self.scheduler.is_full() {
            return Err(self.latch(KernelError::CapacityExceeded, name));
        }
        let region = self
            .stacks
            .allocate(stack_size)
            .map_err(|err| self.latch(err, name))?;
        let slot = self.scheduler.register(descriptor)?;

        let sp = self
            .stacks
            .prepare_frame(region, entry as usize as u32, task_exit as usize as u32, parameter as u32);
        self.contexts[slot] = Some(Context {
            region,
            sp: self.stacks.address_of(region, sp),
        });
        Ok(TaskHandle(slot))
    }

    /// Release every task at the current tick and dispatch the earliest
    /// deadline.
    ///
    /// # Returns
    /// The task that runs first, or `None` if only the idle context is
    /// runnable (cannot happen with at least one task).
    ///
    /// # Errors
    /// [`KernelError::StartupFault`] if a fatal creation error was latched,
    /// [`KernelError::NoTasks`] with an empty task set.
    pub fn start(&mut self) -> Result<Option<TaskHandle>, KernelError> {
        if self.started {
            return Err(KernelError::AlreadyStarted);
        }
        if let Some(cause) = self.fault {
            error!("scheduler start refused: {}", cause);
            return Err(KernelError::StartupFault(cause));
        }
        if self.scheduler.is_empty() {
            return Err(KernelError::NoTasks);
        }

        let idle = self.stacks.allocate(IDLE_STACK_SIZE).map_err(|err| {
            let err = self.latch(err, "idle");
            error!("scheduler start refused: {}", err);
            KernelError::StartupFault(StartupCause::OutOfMemory)
        })?;
        let sp = self
            .stacks
            .prepare_frame(idle, idle_task as usize as u32, task_exit as usize as u32, 0);
        self.idle = Some(Context {
            region: idle,
            sp: self.stacks.address_of(idle, sp),
        });

        self.started = true;
        for slot in 0..self.scheduler.len() {
            self.scheduler.activate(slot, self.tick)?;
        }
        let first = self.scheduler.current().map(TaskHandle);
        info!(
            "scheduler started at tick {} with {} tasks, {} stack bytes free",
            self.tick,
            self.scheduler.len(),
            self.stacks.remaining()
        );
        Ok(first)
    }

    /// Advance the tick counter by one and run the scheduler's tick.
    ///
    /// # Returns
    /// `true` if a context switch is needed.
    pub fn on_tick(&mut self) -> bool {
        self.tick = self.tick.after(1);
        if !self.started {
            return false;
        }
        self.scheduler.tick(self.tick);
        self.needs_switch()
    }

    /// Periodic-delay primitive for the running task: suspend until the
    /// next wake tick of `period`. If that tick has already passed, the
    /// task is re-activated immediately with a fresh deadline instead.
    ///
    /// # Returns
    /// `true` if a context switch is needed.
    pub fn delay_until(&mut self, period: &mut PeriodicActivation) -> Result<bool, KernelError> {
        let slot = self.scheduler.current().ok_or(KernelError::NoRunningTask)?;
        match period.advance(self.tick) {
            Wake::Sleep(wake) => {
                self.scheduler.sleep_until(slot, wake, self.tick)?;
            }
            Wake::Late(wake) => {
                debug!("slot {} missed its wake tick {}, re-activating", slot, wake);
                self.scheduler.reactivate_self(slot, self.tick)?;
            }
        }
        Ok(self.needs_switch())
    }

    /// External activation trigger (timer expiry, queue receive).
    pub fn notify(&mut self, handle: TaskHandle) -> Result<Activation, KernelError> {
        self.scheduler.activate(handle.slot(), self.tick)
    }

    /// Context-switch bookkeeping: save the outgoing stack pointer and
    /// return the stack pointer of the context the scheduler selected.
    pub fn switch_context(&mut self, outgoing_sp: usize) -> usize {
        if let Some(ctx) = self.context_mut(self.loaded) {
            ctx.sp = outgoing_sp;
        }
        self.launch().unwrap_or(outgoing_sp)
    }

    /// Load the scheduler's choice and return its stack pointer.
    pub fn launch(&mut self) -> Option<usize> {
        self.loaded = self.scheduler.current();
        self.context_mut(self.loaded).map(|ctx| ctx.sp)
    }

    /// Whether the context on the core differs from the scheduler's choice.
    pub fn needs_switch(&self) -> bool {
        self.loaded != self.scheduler.current()
    }

    #[inline]
    pub fn tick_count(&self) -> Tick {
        self.tick
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn scheduler(&self) -> &Scheduler<N> {
        &self.scheduler
    }

    /// A copy of the scheduler snapshot.
    pub fn snapshot(&self) -> SchedulerSnapshot<N> {
        *self.scheduler.snapshot()
    }

    /// Stack size actually reserved for a task.
    pub fn stack_bytes(&self, handle: TaskHandle) -> Option<usize> {
        self.contexts
            .get(handle.slot())
            .copied()
            .flatten()
            .map(|ctx| ctx.region.bytes())
    }

    fn context_mut(&mut self, slot: Option<usize>) -> Option<&mut Context> {
        match slot {
            Some(slot) => self.contexts.get_mut(slot)?.as_mut(),
            None => self.idle.as_mut(),
        }
    }

    /// Record the first fatal creation error; later ones are reported but
    /// the original cause is kept.
    fn latch(&mut self, err: KernelError, name: &str) -> KernelError {
        error!("failed to create task {}: {}", name, err);
        if self.fault.is_none() {
            self.fault = err.startup_cause();
        }
        err
    }
}

impl<const N: usize, const WORDS: usize> Default for Kernel<N, WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

/// Landing pad for a task entry that returns (entries are `-> !`, so only
/// reachable through a corrupted frame).
extern "C" fn task_exit() -> ! {
    loop {
        arch::wait_for_interrupt();
    }
}

/// The idle context: runs whenever no deadline task is ready.
extern "C" fn idle_task(_: usize) -> ! {
    loop {
        arch::wait_for_interrupt();
    }
}

// ---------------------------------------------------------------------------
// Global kernel instance
// ---------------------------------------------------------------------------

/// The kernel as configured in [`crate::config`].
pub type SystemKernel = Kernel<EXPECTED_EDF_TASKS, STACK_POOL_WORDS>;

static KERNEL: KernelCell<SystemKernel> = KernelCell::new(Kernel::new());

/// Run `f` on the global kernel inside a critical section. Used by the
/// arch layer's exception handlers.
pub fn with_kernel<R>(f: impl FnOnce(&mut SystemKernel) -> R) -> R {
    KERNEL.with(f)
}

/// Initialize the EDF OS kernel.
///
/// Must be called before any other kernel function. Discards any tasks
/// created earlier.
pub fn init() {
    with_kernel(SystemKernel::reset);
}

/// Create a deadline task and register it with the scheduler.
///
/// # Parameters
/// - `entry`: Task entry function. Receives `parameter` and never returns.
/// - `name`: Diagnostic label, truncated to `MAX_TASK_NAME_LEN` bytes.
/// - `stack_size`: Stack size in bytes.
/// - `parameter`: Passed to `entry` in R0.
/// - `base_priority`: Static priority, carried but ignored by EDF.
/// - `relative_deadline`: Ticks from each activation to its deadline (≥ 1).
///
/// # Example
/// ```ignore
/// kernel::create_deadline_task(task_a, "TA", MINIMAL_STACK_SIZE, 0, 1, 10)
///     .expect("Failed to create TA");
/// ```
pub fn create_deadline_task(
    entry: TaskEntry,
    name: &str,
    stack_size: usize,
    parameter: usize,
    base_priority: u8,
    relative_deadline: u32,
) -> Result<TaskHandle, KernelError> {
    with_kernel(|k| {
        k.create_deadline_task(entry, name, stack_size, parameter, base_priority, relative_deadline)
    })
}

/// Start the EDF OS scheduler. **Returns only if startup is refused.**
///
/// Activates all tasks, configures SysTick and the exception priorities,
/// and enters the earliest-deadline task.
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub fn start(mut syst: cortex_m::peripheral::SYST) -> Result<core::convert::Infallible, KernelError> {
    use crate::arch::cortex_m4;

    let first_sp = with_kernel(|k| {
        k.start()?;
        k.launch().ok_or(KernelError::NoTasks)
    })?;

    cortex_m4::set_interrupt_priorities();
    cortex_m4::configure_systick(&mut syst);

    // SAFETY: called once, with the prepared frame of the first context.
    unsafe { cortex_m4::start_first_task(first_sp as *const u32) }
}

/// Suspend the calling task until the next wake tick of `period`.
///
/// This is the periodic-delay primitive of the activation discipline; see
/// [`crate::periodic`].
pub fn delay_until(period: &mut PeriodicActivation) -> Result<(), KernelError> {
    if with_kernel(|k| k.delay_until(period))? {
        arch::request_context_switch();
    }
    Ok(())
}

/// Activate a blocked task from an event source (timer callback, queue
/// send). Safe to call from interrupt context.
pub fn notify(handle: TaskHandle) -> Result<Activation, KernelError> {
    let (activation, switch) = with_kernel(|k| {
        k.notify(handle).map(|activation| (activation, k.needs_switch()))
    })?;
    if switch {
        arch::request_context_switch();
    }
    Ok(activation)
}

/// Current value of the tick counter.
pub fn tick_count() -> Tick {
    with_kernel(|k| k.tick_count())
}

/// Copy of the scheduler snapshot, consistent as of the last scheduling
/// event.
pub fn snapshot() -> SchedulerSnapshot<EXPECTED_EDF_TASKS> {
    with_kernel(|k| k.snapshot())
}

/// Name of the running task; empty while idle.
pub fn current_task_name() -> TaskName {
    with_kernel(|k| *k.scheduler().snapshot().current_task_name())
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
