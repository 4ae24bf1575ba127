//! # EDF OS — Earliest-Deadline-First Scheduling Extension
//!
//! A deadline scheduler for ARM Cortex-M4 microcontrollers. Tasks carry a
//! relative deadline instead of a priority; every time a task is activated
//! it gets an absolute deadline, and the ready task whose deadline comes
//! first always owns the CPU.
//!
//! ## Overview
//!
//! - **Activation** sets `absolute deadline = now + relative deadline`.
//!   An activated task with an earlier deadline preempts the running one
//!   immediately.
//! - **Ties** go to the task created first.
//! - **Preemption** never changes a task's deadline; it runs again with the
//!   same deadline once it is once more the earliest.
//! - **Deadline misses** are recorded and logged, never fatal.
//! - **Instrumentation** per task: begin time, accumulated runtime, current
//!   deadline, activations and misses.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │  init() · create_deadline_task() · start() · delay_until│
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │  Task Registry     │  Sync Primitives  │
//! │  scheduler.rs│  registry.rs       │  sync.rs          │
//! │  ─ activate()│  ─ register()      │  ─ critical_section│
//! │  ─ block()   │  ─ lookup()        │  ─ KernelCell     │
//! │  ─ tick()    ├────────────────────┤                   │
//! │              │  Instrumentation   │                   │
//! │              │  instrument.rs     │                   │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │   Task Model (task.rs) · Stack Pool (stack.rs)         │
//! │   Descriptor · TaskState · Tick (tick.rs)              │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │    PendSV · SysTick · Context Switch · First Launch    │
//! ├────────────────────────────────────────────────────────┤
//! │         ARM Cortex-M4 Hardware (Thumb-2)                │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Activation Discipline
//!
//! Periodic tasks wait with [`kernel::delay_until`] on a
//! [`periodic::PeriodicActivation`]; event-driven tasks are woken with
//! [`kernel::notify`]. Either way each wake is one activation and yields a
//! fresh deadline.
//!
//! ## Memory Model
//!
//! - **No heap**: All state is statically allocated
//! - **No `alloc`**: Pure `core` only
//! - **Fixed-size registry**: `[Option<TaskDescriptor>; EXPECTED_EDF_TASKS]`
//! - **Stack pool**: one 8-byte aligned arena, carved per task at creation
//! - **Critical sections**: `critical_section::with()` around kernel state
//!
//! On any target other than bare-metal ARM the arch layer is a host shim,
//! which is how the scheduling logic is unit-tested.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod tick;
pub mod task;
pub mod registry;
pub mod instrument;
pub mod stack;
pub mod periodic;
pub mod scheduler;
pub mod arch;
pub mod kernel;
pub mod sync;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod logger;

pub use error::{KernelError, StartupCause};
pub use scheduler::Activation;
pub use task::{TaskHandle, TaskName, TaskState};
pub use tick::Tick;
