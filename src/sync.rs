//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstractions.
//! All shared kernel state must be accessed within a critical section
//! to prevent data races between tasks and exception handlers.
//!
//! The critical-section implementation is chosen at link time: on the
//! Cortex-M4 it is `cortex-m`'s single-core implementation (interrupts
//! masked); host tests link `critical-section`'s `std` implementation.

use core::cell::RefCell;

use critical_section::{CriticalSection, Mutex};

/// Execute a closure within a critical section (interrupts disabled).
///
/// # Usage
/// ```ignore
/// sync::critical_section(|_cs| {
///     // Access shared state safely
/// });
/// ```
///
/// # Performance
/// Keep critical sections as short as possible to minimize interrupt latency.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// Kernel state shared between thread mode and exception handlers.
///
/// The only way in is [`KernelCell::with`], which holds a critical section
/// for the whole closure. Re-entering the same cell from inside the
/// closure is a bug and panics.
pub struct KernelCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> KernelCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_cell_updates_in_place() {
        static COUNTER: KernelCell<u32> = KernelCell::new(0);
        COUNTER.with(|c| *c += 1);
        COUNTER.with(|c| *c += 1);
        assert_eq!(COUNTER.with(|c| *c), 2);
    }
}
