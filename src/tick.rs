//! # Ticks
//!
//! The scheduler's notion of time. A [`Tick`] is a point on a 32-bit
//! counter that is allowed to wrap; durations are plain `u32` tick counts.
//!
//! ## Wraparound
//!
//! Ticks are never compared with `<` on the raw value. Ordering uses the
//! signed difference of the two counters, so `a.is_before(b)` is correct
//! whenever `a` and `b` lie within 2^31 ticks of each other. With a 1 kHz
//! tick that is about 24 days between two deadlines being compared, which
//! relative deadlines of a periodic task set never approach.

use core::cmp::Ordering;
use core::fmt;

use crate::config::TICK_HZ;

/// A point in time, in scheduler ticks since boot (modulo 2^32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tick(u32);

impl Tick {
    /// Tick zero, the value of the counter at boot.
    pub const ZERO: Tick = Tick(0);

    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw counter value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The tick `ticks` after this one, wrapping around the counter.
    #[inline]
    pub const fn after(self, ticks: u32) -> Self {
        Self(self.0.wrapping_add(ticks))
    }

    /// Signed distance from `earlier` to `self`. Negative if `self` is
    /// actually the earlier of the two.
    #[inline]
    pub const fn diff(self, earlier: Tick) -> i32 {
        self.0.wrapping_sub(earlier.0) as i32
    }

    /// Ticks elapsed from `earlier` to `self`, saturating at zero if
    /// `earlier` is in fact later.
    #[inline]
    pub fn since(self, earlier: Tick) -> u32 {
        self.diff(earlier).max(0) as u32
    }

    /// Wrap-safe `self < other`.
    #[inline]
    pub const fn is_before(self, other: Tick) -> bool {
        self.diff(other) < 0
    }

    /// Wrap-safe `self >= other`.
    #[inline]
    pub const fn has_reached(self, other: Tick) -> bool {
        self.diff(other) >= 0
    }

    /// Wrap-safe three-way comparison.
    #[inline]
    pub fn compare(self, other: Tick) -> Ordering {
        self.diff(other).cmp(&0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Convert milliseconds to ticks at [`TICK_HZ`], rounding down.
#[inline]
pub const fn ms_to_ticks(ms: u32) -> u32 {
    ((ms as u64 * TICK_HZ as u64) / 1000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_without_wrap() {
        let a = Tick::new(10);
        let b = Tick::new(20);
        assert!(a.is_before(b));
        assert!(!b.is_before(a));
        assert!(b.has_reached(a));
        assert!(a.has_reached(a));
        assert_eq!(b.since(a), 10);
        assert_eq!(a.since(b), 0);
    }

    #[test]
    fn test_ordering_across_wrap() {
        let late = Tick::new(u32::MAX - 5);
        let wrapped = late.after(10);
        assert_eq!(wrapped.raw(), 4);
        assert!(late.is_before(wrapped));
        assert_eq!(wrapped.since(late), 10);
        assert_eq!(late.compare(wrapped), Ordering::Less);
        assert_eq!(wrapped.compare(late), Ordering::Greater);
    }

    #[test]
    fn test_ms_to_ticks() {
        assert_eq!(ms_to_ticks(500), 500 * TICK_HZ / 1000);
        assert_eq!(ms_to_ticks(0), 0);
    }
}
