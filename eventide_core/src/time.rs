//! Virtual time.
//!
//! A [`SimTime`] is an offset from the simulation origin. It only moves when
//! the simulator pops an event or a run strategy sets it explicitly; nothing
//! reads the wall clock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

/// Seconds per hour, the unit statistics are reported in.
pub const SECS_PER_HOUR: f64 = 3_600.0;

/// A point on the virtual time line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(Duration);

impl SimTime {
    /// The simulation origin.
    pub const ZERO: SimTime = SimTime(Duration::ZERO);

    /// The latest representable instant.
    pub const MAX: SimTime = SimTime(Duration::MAX);

    #[inline]
    pub const fn from_duration(offset: Duration) -> Self {
        SimTime(offset)
    }

    #[inline]
    pub fn from_secs(secs: u64) -> Self {
        SimTime(Duration::from_secs(secs))
    }

    /// Panics on negative or non-finite input, like `Duration::from_secs_f64`.
    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        SimTime(Duration::from_secs_f64(secs))
    }

    #[inline]
    pub fn from_hours(hours: f64) -> Self {
        Self::from_secs_f64(hours * SECS_PER_HOUR)
    }

    /// Offset from the origin.
    #[inline]
    pub fn as_duration(self) -> Duration {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    #[inline]
    pub fn as_hours(self) -> f64 {
        self.0.as_secs_f64() / SECS_PER_HOUR
    }

    /// Time elapsed since `earlier`, or `None` if `earlier` is later.
    #[inline]
    pub fn checked_since(self, earlier: SimTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// Time elapsed since `earlier`, zero if `earlier` is later.
    #[inline]
    pub fn saturating_since(self, earlier: SimTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// `self + delay`, or `None` on overflow.
    #[inline]
    pub fn checked_add(self, delay: Duration) -> Option<SimTime> {
        self.0.checked_add(delay).map(SimTime)
    }
}

/// Hours in a duration.
#[inline]
pub fn hours(span: Duration) -> f64 {
    span.as_secs_f64() / SECS_PER_HOUR
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    /// Saturates at [`SimTime::MAX`].
    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(rhs))
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl From<Duration> for SimTime {
    fn from(offset: Duration) -> Self {
        SimTime(offset)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T+{:.3}s", self.0.as_secs_f64())
    }
}
