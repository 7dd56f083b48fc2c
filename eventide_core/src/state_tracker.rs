//! Time spent in each discrete state of an entity.

use crate::time::{hours, SimTime};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Accumulates durations of an enum-valued state over virtual time.
#[derive(Debug, Clone)]
pub struct StateTracker<S> {
    initial_time: SimTime,
    last_time: SimTime,
    last_state: S,
    durations: HashMap<S, Duration>,
    history: Option<Vec<(SimTime, S)>>,
}

impl<S: Copy + Eq + Hash> StateTracker<S> {
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_time: SimTime::ZERO,
            last_time: SimTime::ZERO,
            last_state: initial_state,
            durations: HashMap::new(),
            history: None,
        }
    }

    /// Records every transition, starting with the initial state.
    pub fn with_history(mut self) -> Self {
        self.history = Some(vec![(self.last_time, self.last_state)]);
        self
    }

    /// Closes the interval of the previous state and enters `state`.
    pub fn update_state(&mut self, state: S, clock: SimTime) {
        if let Some(history) = &mut self.history {
            history.push((clock, state));
        }
        let span = clock.saturating_since(self.last_time);
        *self.durations.entry(self.last_state).or_default() += span;
        self.last_state = state;
        self.last_time = clock.max(self.last_time);
    }

    /// Share of the time since the initial (or warm-up) time spent in
    /// `state`, counting the still-open interval up to `clock`.
    pub fn proportion(&self, state: S, clock: SimTime) -> f64 {
        let total = hours(clock.saturating_since(self.initial_time));
        if total == 0.0 {
            return 0.0;
        }
        let mut spent = self.durations.get(&state).copied().unwrap_or_default();
        if state == self.last_state {
            spent += clock.saturating_since(self.last_time);
        }
        hours(spent) / total
    }

    /// Closed duration accumulated in `state`.
    pub fn duration_in(&self, state: S) -> Duration {
        self.durations.get(&state).copied().unwrap_or_default()
    }

    pub fn state(&self) -> S {
        self.last_state
    }

    pub fn last_time(&self) -> SimTime {
        self.last_time
    }

    pub fn history(&self) -> Option<&[(SimTime, S)]> {
        self.history.as_deref()
    }

    /// Restarts the window at `clock`, keeping the current state.
    pub fn warmed_up(&mut self, clock: SimTime) {
        self.initial_time = clock;
        self.last_time = clock;
        self.durations.clear();
        if let Some(history) = &mut self.history {
            history.clear();
            history.push((clock, self.last_state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Machine {
        Idle,
        Busy,
        Down,
    }

    fn h(x: f64) -> SimTime {
        SimTime::from_hours(x)
    }

    #[test]
    fn test_proportion_includes_open_interval() {
        let mut t = StateTracker::new(Machine::Idle);
        t.update_state(Machine::Busy, h(1.0));
        t.update_state(Machine::Idle, h(3.0));

        assert_relative_eq!(t.proportion(Machine::Busy, h(4.0)), 0.5, epsilon = 1e-12);
        assert_relative_eq!(t.proportion(Machine::Idle, h(4.0)), 0.5, epsilon = 1e-12);
        assert_eq!(t.proportion(Machine::Down, h(4.0)), 0.0);
        assert_eq!(t.duration_in(Machine::Busy), Duration::from_secs(7_200));
    }

    #[test]
    fn test_proportion_at_origin_is_zero() {
        let t = StateTracker::new(Machine::Idle);
        assert_eq!(t.proportion(Machine::Idle, SimTime::ZERO), 0.0);
    }

    #[test]
    fn test_warm_up_keeps_state() {
        let mut t = StateTracker::new(Machine::Idle).with_history();
        t.update_state(Machine::Down, h(1.0));
        t.warmed_up(h(2.0));

        assert_eq!(t.state(), Machine::Down);
        assert_eq!(t.duration_in(Machine::Idle), Duration::ZERO);
        assert_relative_eq!(t.proportion(Machine::Down, h(3.0)), 1.0, epsilon = 1e-12);
        assert_eq!(t.history().unwrap(), &[(h(2.0), Machine::Down)]);
    }

    #[test]
    fn test_history_records_transitions() {
        let mut t = StateTracker::new(Machine::Idle).with_history();
        t.update_state(Machine::Busy, h(1.0));
        assert_eq!(t.history().unwrap().len(), 2);
        assert!(StateTracker::new(Machine::Idle).history().is_none());
    }
}
