//! # Architecture Abstraction Layer
//!
//! Provides a hardware abstraction boundary for the kernel.
//! Currently implements the Cortex-M4 port; every other target gets the
//! host port so the scheduling logic can be built and tested anywhere.
//!
//! Each port provides `request_context_switch` and `wait_for_interrupt`.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;
#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use cortex_m4::{request_context_switch, wait_for_interrupt};

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod host;
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub use host::{request_context_switch, wait_for_interrupt};
