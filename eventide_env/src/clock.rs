//! Wall-clock abstraction.
//!
//! Only the speed-throttled run mode looks at real time. Putting it behind a
//! trait lets tests drive that mode with a manual clock.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of monotonic real time.
pub trait WallClock {
    /// Returns the monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;
}

/// Wall clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl SystemClock {
    /// Creates a clock starting now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Wall clock advanced by hand.
///
/// Clones share the same reading, so a test can keep one copy and hand the
/// other to a simulator.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// Creates a clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Sets the reading. Ignored if it would move the clock backwards.
    pub fn set(&self, to: Duration) {
        if to >= self.now.get() {
            self.now.set(to);
        }
    }
}

impl WallClock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}
