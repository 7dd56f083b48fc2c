//! Scenario parameters, loadable from JSON.
//!
//! ```json
//! {
//!   "time_unit": "minutes",
//!   "inter_arrival": { "kind": "exponential", "mean": 5.0 },
//!   "service": { "kind": "gamma", "mean": 4.0, "cv": 0.5 },
//!   "servers": 2,
//!   "run_hours": 500.0
//! }
//! ```

use crate::error::{RunResult, ScenarioError};
use eventide_core::time::SECS_PER_HOUR;
use eventide_env::{DistributionSpec, TimeUnit};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters shared by every scenario. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Unit of every distribution below
    pub time_unit: TimeUnit,

    /// Gap between arrivals
    pub inter_arrival: DistributionSpec,

    /// Service time (handling stage for `two_stage`)
    pub service: DistributionSpec,

    /// Restoring stage of `two_stage`
    pub restoring: DistributionSpec,

    /// Parallel servers for `mmc` and `two_stage`
    pub servers: usize,

    /// Waiting room of `finite_buffer`
    pub buffer: usize,

    /// Measured period, after warm-up
    pub run_hours: f64,

    pub warmup_hours: f64,

    /// Accepted absolute gap between measured and analytic values
    pub tolerance: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            time_unit: TimeUnit::Minutes,
            inter_arrival: DistributionSpec::exponential(5.0),
            service: DistributionSpec::exponential(4.0),
            restoring: DistributionSpec::exponential(3.0),
            servers: 3,
            buffer: 4,
            run_hours: 2_000.0,
            warmup_hours: 100.0,
            tolerance: 0.05,
        }
    }
}

impl ScenarioConfig {
    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> RunResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_run_hours(mut self, hours: f64) -> Self {
        self.run_hours = hours;
        self
    }

    pub fn with_warmup_hours(mut self, hours: f64) -> Self {
        self.warmup_hours = hours;
        self
    }

    pub fn with_servers(mut self, servers: usize) -> Self {
        self.servers = servers;
        self
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn validate(&self) -> RunResult<()> {
        if !(self.run_hours.is_finite() && self.run_hours > 0.0) {
            return Err(ScenarioError::Config(format!("run_hours {} must be positive", self.run_hours)));
        }
        if !(self.warmup_hours.is_finite() && self.warmup_hours >= 0.0) {
            return Err(ScenarioError::Config(format!(
                "warmup_hours {} must be non-negative",
                self.warmup_hours
            )));
        }
        if self.servers == 0 {
            return Err(ScenarioError::Config("servers must be at least 1".into()));
        }
        if self.buffer == 0 {
            return Err(ScenarioError::Config("buffer must be at least 1".into()));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ScenarioError::Config(format!("tolerance {} must be positive", self.tolerance)));
        }
        for spec in [&self.inter_arrival, &self.service, &self.restoring] {
            spec.build()?;
        }
        Ok(())
    }

    /// Mean of `spec` in hours.
    pub fn mean_hours(&self, spec: &DistributionSpec) -> RunResult<f64> {
        Ok(spec.build()?.mean() * self.time_unit.seconds() / SECS_PER_HOUR)
    }

    /// Arrivals per hour.
    pub fn arrival_rate(&self) -> RunResult<f64> {
        let gap = self.mean_hours(&self.inter_arrival)?;
        if gap <= 0.0 {
            return Err(ScenarioError::Config("inter_arrival mean must be positive".into()));
        }
        Ok(1.0 / gap)
    }

    /// Whether both arrivals and service are exponential.
    pub fn is_markovian(&self) -> bool {
        matches!(self.inter_arrival, DistributionSpec::Exponential { .. })
            && matches!(self.service, DistributionSpec::Exponential { .. })
    }
}
