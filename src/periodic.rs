//! # Periodic Activation Discipline
//!
//! The contract every deadline task follows. It is not scheduler code, but
//! EDF only works if tasks honor it:
//!
//! 1. Compute the first wake tick once.
//! 2. Loop forever:
//!    a. suspend until the wake tick (`kernel::delay_until`), which is the
//!       block/activate boundary the scheduler sees;
//!    b. do bounded work, much shorter than the relative deadline;
//!    c. optionally report instrumentation;
//!    d. go back to (a).
//!
//! A task that never reaches (a) again keeps the CPU from every task with a
//! later deadline. The scheduler cannot detect or prevent that.
//!
//! ```ignore
//! extern "C" fn sampler(_: usize) -> ! {
//!     let mut period = PeriodicActivation::new(kernel::tick_count(), 500);
//!     loop {
//!         if let Err(err) = kernel::delay_until(&mut period) {
//!             log::error!("sampler cannot wait for its next period: {}", err);
//!         }
//!         sample_sensor();
//!     }
//! }
//! ```
//!
//! Wake ticks advance by exactly one period from the previous *wake tick*,
//! not from the time the task got around to calling `delay_until`, so the
//! activation pattern never drifts.

use crate::tick::Tick;

/// What the periodic-delay primitive should do for this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Block until the given tick.
    Sleep(Tick),
    /// The wake tick has already passed: the task overran its period and is
    /// re-activated immediately.
    Late(Tick),
}

/// Absolute-time periodic release state held by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicActivation {
    next_wake: Tick,
    period: u32,
    /// Offset applied to the first wake only.
    pending_offset: Option<u32>,
}

impl PeriodicActivation {
    /// Periodic release every `period` ticks, counted from `start`.
    pub const fn new(start: Tick, period: u32) -> Self {
        Self {
            next_wake: start,
            period,
            pending_offset: None,
        }
    }

    /// Like [`new`](Self::new), but the first wake is `offset` ticks after
    /// `start` instead of one period.
    pub const fn with_offset(start: Tick, offset: u32, period: u32) -> Self {
        Self {
            next_wake: start,
            period,
            pending_offset: Some(offset),
        }
    }

    #[inline]
    pub fn period(&self) -> u32 {
        self.period
    }

    /// The most recent wake tick handed out by [`advance`](Self::advance).
    #[inline]
    pub fn last_wake(&self) -> Tick {
        self.next_wake
    }

    /// Step to the next wake tick and decide whether to block at `now`.
    pub fn advance(&mut self, now: Tick) -> Wake {
        let step = self.pending_offset.take().unwrap_or(self.period);
        self.next_wake = self.next_wake.after(step);
        if now.is_before(self.next_wake) {
            Wake::Sleep(self.next_wake)
        } else {
            Wake::Late(self.next_wake)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_ticks_do_not_drift() {
        let mut period = PeriodicActivation::new(Tick::ZERO, 500);
        assert_eq!(period.advance(Tick::new(3)), Wake::Sleep(Tick::new(500)));
        // Work finished late within the period: next wake is still 1000.
        assert_eq!(period.advance(Tick::new(517)), Wake::Sleep(Tick::new(1000)));
        assert_eq!(period.last_wake(), Tick::new(1000));
    }

    #[test]
    fn test_first_wake_offset() {
        let mut period = PeriodicActivation::with_offset(Tick::ZERO, 1000, 500);
        assert_eq!(period.advance(Tick::ZERO), Wake::Sleep(Tick::new(1000)));
        assert_eq!(period.advance(Tick::new(1001)), Wake::Sleep(Tick::new(1500)));
    }

    #[test]
    fn test_overrun_is_late() {
        let mut period = PeriodicActivation::new(Tick::ZERO, 10);
        assert_eq!(period.advance(Tick::new(10)), Wake::Late(Tick::new(10)));
        assert_eq!(period.advance(Tick::new(25)), Wake::Late(Tick::new(20)));
        assert_eq!(period.advance(Tick::new(25)), Wake::Sleep(Tick::new(30)));
    }

    #[test]
    fn test_period_across_counter_wrap() {
        let mut period = PeriodicActivation::new(Tick::new(u32::MAX - 100), 500);
        let now = Tick::new(u32::MAX - 90);
        assert_eq!(period.advance(now), Wake::Sleep(Tick::new(399)));
    }
}
