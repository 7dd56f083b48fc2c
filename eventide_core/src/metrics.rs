//! Eventide Metrics Module
//! =======================
//!
//! Time-weighted statistics for piecewise-constant signals such as queue
//! length or number of busy servers:
//! - **Average count**: area under the signal divided by elapsed hours
//! - **Rates**: increments / decrements per hour
//! - **Distribution**: hours spent at each level, percentiles and histograms
//!
//! A [`TimeWeightedMetric`] is fed with observations of the signal at the
//! virtual times it changes. Area only accumulates over strictly positive
//! elapsed time and never while paused.

use crate::error::{SimError, SimResult};
use crate::time::{hours, SimTime};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Time-weighted accumulator of a scalar signal.
#[derive(Debug, Clone)]
pub struct TimeWeightedMetric {
    /// Start of the counting window (moved by warm-up)
    initial_time: SimTime,

    /// Time of the latest accounted observation
    last_time: SimTime,

    /// Current value of the signal
    last_count: f64,

    /// Sum of all upward changes
    total_increment: f64,

    /// Sum of all downward changes
    total_decrement: f64,

    /// Σ count · Δhours
    cumulative_count: f64,

    /// Hours accounted (excludes paused intervals)
    total_hours: f64,

    paused: bool,

    /// Hours spent at each level, ascending by level
    hours_for_count: BTreeMap<OrderedFloat<f64>, f64>,

    /// Latest value per instant, if enabled
    history: Option<BTreeMap<SimTime, f64>>,
}

/// Serializable summary of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub last_count: f64,
    pub average_count: f64,
    pub increment_rate: f64,
    pub decrement_rate: f64,
    pub total_hours: f64,
    pub working_time_ratio: f64,
    pub average_hours: f64,
}

/// One fixed-width bucket of a level histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Bucket covers `[lower_bound, lower_bound + width)`
    pub lower_bound: f64,
    pub hours: f64,
    pub probability: f64,
    pub cumulative_probability: f64,
}

impl TimeWeightedMetric {
    /// Creates a metric counting from the simulation origin.
    pub fn new() -> Self {
        Self::starting_at(SimTime::ZERO)
    }

    /// Creates a metric counting from `initial_time`.
    pub fn starting_at(initial_time: SimTime) -> Self {
        Self {
            initial_time,
            last_time: initial_time,
            last_count: 0.0,
            total_increment: 0.0,
            total_decrement: 0.0,
            cumulative_count: 0.0,
            total_hours: 0.0,
            paused: false,
            hours_for_count: BTreeMap::new(),
            history: None,
        }
    }

    /// Keeps every observation for [`history`](Self::history).
    pub fn with_history(mut self) -> Self {
        self.history.get_or_insert_with(BTreeMap::new);
        self
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    /// Records that the signal is `count` from `clock` on.
    pub fn observe_count(&mut self, count: f64, clock: SimTime) {
        if self.paused {
            return;
        }
        if count > self.last_count {
            self.total_increment += count - self.last_count;
        } else {
            self.total_decrement += self.last_count - count;
        }
        if clock > self.last_time {
            let elapsed = hours(clock.saturating_since(self.last_time));
            self.total_hours += elapsed;
            self.cumulative_count += elapsed * self.last_count;
            *self.hours_for_count.entry(OrderedFloat(self.last_count)).or_insert(0.0) += elapsed;
            self.last_time = clock;
        }
        self.last_count = count;
        if let Some(history) = &mut self.history {
            history.insert(clock, count);
        }
    }

    /// Records a change of `change` at `clock`.
    pub fn observe_change(&mut self, change: f64, clock: SimTime) {
        self.observe_count(self.last_count + change, clock);
    }

    /// Pauses at the last recorded time.
    pub fn pause(&mut self) {
        self.pause_at(self.last_time);
    }

    /// Accounts up to `clock`, then stops accumulating. No-op when paused.
    pub fn pause_at(&mut self, clock: SimTime) {
        if self.paused {
            return;
        }
        self.observe_change(0.0, clock);
        self.paused = true;
    }

    /// Resumes accumulating from `clock`. No-op when not paused.
    pub fn resume(&mut self, clock: SimTime) {
        if !self.paused {
            return;
        }
        self.last_time = clock;
        self.paused = false;
    }

    /// Restarts the counting window at `clock`, keeping the current level.
    pub fn warmed_up(&mut self, clock: SimTime) {
        self.initial_time = clock;
        self.last_time = clock;
        self.total_increment = 0.0;
        self.total_decrement = 0.0;
        self.total_hours = 0.0;
        self.cumulative_count = 0.0;
        self.hours_for_count.clear();
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn initial_time(&self) -> SimTime {
        self.initial_time
    }

    pub fn last_time(&self) -> SimTime {
        self.last_time
    }

    pub fn last_count(&self) -> f64 {
        self.last_count
    }

    pub fn total_increment(&self) -> f64 {
        self.total_increment
    }

    pub fn total_decrement(&self) -> f64 {
        self.total_decrement
    }

    pub fn total_hours(&self) -> f64 {
        self.total_hours
    }

    /// Σ count · Δhours.
    pub fn cumulative_count(&self) -> f64 {
        self.cumulative_count
    }

    /// Hours spent at each level, ascending.
    pub fn hours_for_count(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.hours_for_count.iter().map(|(level, h)| (level.0, *h))
    }

    // =========================================================================
    // STATISTICS
    // =========================================================================

    /// Time-weighted mean; the current level before any time has elapsed.
    pub fn average_count(&self) -> f64 {
        if self.total_hours == 0.0 {
            return self.last_count;
        }
        self.cumulative_count / self.total_hours
    }

    /// Increments per hour (0 before any time has elapsed).
    pub fn increment_rate(&self) -> f64 {
        per_hour(self.total_increment, self.total_hours)
    }

    /// Decrements per hour (0 before any time has elapsed).
    pub fn decrement_rate(&self) -> f64 {
        per_hour(self.total_decrement, self.total_hours)
    }

    /// Share of the window since `initial_time` that was accounted, i.e. not
    /// paused.
    pub fn working_time_ratio(&self) -> f64 {
        if self.last_time == self.initial_time {
            return 0.0;
        }
        self.total_hours / hours(self.last_time.saturating_since(self.initial_time))
    }

    /// Little's law: mean time a unit spends counted, average count over
    /// departure rate. Zero when that is not finite.
    pub fn average_duration(&self) -> Duration {
        let h = self.average_count() / self.decrement_rate();
        if !h.is_finite() || h < 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(h * crate::time::SECS_PER_HOUR).unwrap_or(Duration::ZERO)
    }

    /// Smallest level at which `p` percent of the accounted hours have been
    /// reached. `+∞` when no level qualifies (nothing observed, or `p > 100`).
    pub fn percentile(&self, p: f64) -> f64 {
        let total: f64 = self.hours_for_count.values().sum();
        let threshold = total * p / 100.0;
        let mut cumulative = 0.0;
        for (level, h) in &self.hours_for_count {
            cumulative += h;
            if cumulative >= threshold {
                return level.0;
            }
        }
        f64::INFINITY
    }

    /// Level histogram with buckets `[k·width, (k+1)·width)`, ascending.
    /// Only buckets holding hours are returned, so the size is bounded by
    /// the number of observed levels whatever the width.
    pub fn histogram(&self, width: f64) -> SimResult<Vec<HistogramBucket>> {
        if !(width > 0.0 && width.is_finite()) {
            return Err(SimError::invalid(format!("histogram width {} must be positive", width)));
        }
        let mut buckets: BTreeMap<i64, f64> = BTreeMap::new();
        for (level, h) in self.hours_for_count.iter().filter(|(_, h)| **h > 0.0) {
            let k = (level.0 / width).floor() as i64;
            *buckets.entry(k).or_insert(0.0) += h;
        }
        let total: f64 = buckets.values().sum();
        let mut cumulative = 0.0;
        let histogram = buckets
            .into_iter()
            .map(|(k, h)| {
                cumulative += h;
                HistogramBucket {
                    lower_bound: k as f64 * width,
                    hours: h,
                    probability: h / total,
                    cumulative_probability: cumulative / total,
                }
            })
            .collect();
        Ok(histogram)
    }

    /// `(hours since initial time, count)` for every recorded instant, or
    /// `None` if history is off.
    pub fn history(&self) -> Option<Vec<(f64, f64)>> {
        let origin = self.initial_time.as_hours();
        self.history
            .as_ref()
            .map(|h| h.iter().map(|(t, c)| (t.as_hours() - origin, *c)).collect())
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        MetricSnapshot {
            last_count: self.last_count,
            average_count: self.average_count(),
            increment_rate: self.increment_rate(),
            decrement_rate: self.decrement_rate(),
            total_hours: self.total_hours,
            working_time_ratio: self.working_time_ratio(),
            average_hours: hours(self.average_duration()),
        }
    }
}

impl Default for TimeWeightedMetric {
    fn default() -> Self {
        Self::new()
    }
}

fn per_hour(total: f64, elapsed_hours: f64) -> f64 {
    if elapsed_hours == 0.0 {
        0.0
    } else {
        total / elapsed_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn h(x: f64) -> SimTime {
        SimTime::from_hours(x)
    }

    #[test]
    fn test_average_count_is_time_weighted() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(0.0, h(0.0));
        m.observe_count(2.0, h(1.0));
        m.observe_count(0.0, h(3.0));

        assert_relative_eq!(m.average_count(), 4.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(m.total_hours(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(m.increment_rate(), 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(m.decrement_rate(), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_average_before_any_time_is_last_count() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(3.0, SimTime::ZERO);
        assert_eq!(m.average_count(), 3.0);
        assert_eq!(m.increment_rate(), 0.0);
        assert_eq!(m.working_time_ratio(), 0.0);
    }

    #[test]
    fn test_same_instant_changes_do_not_add_area() {
        let mut m = TimeWeightedMetric::new();
        m.observe_change(1.0, h(1.0));
        m.observe_change(1.0, h(1.0));
        m.observe_change(-2.0, h(1.0));
        m.observe_count(0.0, h(2.0));
        assert_eq!(m.cumulative_count(), 0.0);
        assert_eq!(m.total_increment(), 2.0);
        assert_eq!(m.total_decrement(), 2.0);
    }

    #[test]
    fn test_pause_excludes_interval() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(1.0, h(0.0));
        m.pause_at(h(1.0));
        m.observe_count(5.0, h(2.0)); // ignored while paused
        m.resume(h(3.0));
        m.observe_count(0.0, h(4.0));

        assert!(!m.is_paused());
        assert_relative_eq!(m.total_hours(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(m.average_count(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.working_time_ratio(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(1.0, h(0.0));
        m.resume(h(1.0)); // not paused: no-op
        m.pause_at(h(1.0));
        m.pause_at(h(2.0)); // already paused: no-op
        assert_relative_eq!(m.total_hours(), 1.0, epsilon = 1e-12);
        m.pause();
        assert!(m.is_paused());
    }

    #[test]
    fn test_warm_up_resets_totals_keeps_level() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(2.0, h(0.0));
        m.observe_count(3.0, h(1.0));
        m.warmed_up(h(2.0));

        assert_eq!(m.last_count(), 3.0);
        assert_eq!(m.total_hours(), 0.0);
        assert_eq!(m.total_increment(), 0.0);
        assert_eq!(m.hours_for_count().count(), 0);

        m.observe_count(0.0, h(4.0));
        assert_relative_eq!(m.average_count(), 3.0, epsilon = 1e-12);
        assert_eq!(m.initial_time(), h(2.0));
    }

    #[test]
    fn test_percentile() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(0.0, h(0.0));
        m.observe_count(1.0, h(1.0));
        m.observe_count(0.0, h(4.0));

        assert_eq!(m.percentile(10.0), 0.0);
        assert_eq!(m.percentile(50.0), 1.0);
        assert_eq!(m.percentile(100.0), 1.0);
        assert_eq!(m.percentile(101.0), f64::INFINITY);
        assert_eq!(TimeWeightedMetric::new().percentile(50.0), f64::INFINITY);
    }

    #[test]
    fn test_histogram_buckets() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(0.0, h(0.0));
        m.observe_count(1.0, h(1.0));
        m.observe_count(5.0, h(2.0));
        m.observe_count(0.0, h(4.0));

        let hist = m.histogram(2.0).unwrap();
        // [2, 4) holds no hours and is left out
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0].lower_bound, 0.0);
        assert_relative_eq!(hist[0].hours, 2.0, epsilon = 1e-12);
        assert_relative_eq!(hist[0].cumulative_probability, 0.5, epsilon = 1e-12);
        assert_eq!(hist[1].lower_bound, 4.0);
        assert_relative_eq!(hist[1].probability, 0.5, epsilon = 1e-12);
        assert_relative_eq!(hist[1].cumulative_probability, 1.0, epsilon = 1e-12);

        assert!(m.histogram(0.0).is_err());
        assert!(TimeWeightedMetric::new().histogram(1.0).unwrap().is_empty());
    }

    #[test]
    fn test_histogram_size_bounded_by_observed_levels() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(0.0, h(0.0));
        m.observe_count(10_000.0, h(1.0));
        m.observe_count(0.0, h(3.0));

        let hist = m.histogram(0.001).unwrap();
        assert_eq!(hist.len(), 2);
        assert_relative_eq!(hist[0].lower_bound, 0.0);
        assert!((hist[1].lower_bound - 10_000.0).abs() < 0.01);
        assert_relative_eq!(hist[1].hours, 2.0, epsilon = 1e-12);
        assert_relative_eq!(hist[1].cumulative_probability, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_average_duration_littles_law() {
        let mut m = TimeWeightedMetric::new();
        m.observe_count(1.0, h(0.0));
        m.observe_count(0.0, h(2.0));
        m.observe_count(0.0, h(4.0));
        // 0.5 on average, 0.25 departures per hour
        assert_relative_eq!(hours(m.average_duration()), 2.0, epsilon = 1e-9);
        assert_eq!(TimeWeightedMetric::new().average_duration(), Duration::ZERO);
    }

    #[test]
    fn test_history_relative_to_initial_time() {
        let mut m = TimeWeightedMetric::starting_at(h(1.0)).with_history();
        m.observe_count(1.0, h(1.0));
        m.observe_count(2.0, h(2.0));
        m.observe_count(3.0, h(2.0));
        let history = m.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_relative_eq!(history[1].0, 1.0, epsilon = 1e-9);
        assert_eq!(history[1].1, 3.0);
        assert!(TimeWeightedMetric::new().history().is_none());
    }
}
