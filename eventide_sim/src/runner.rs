//! Scenario runner - builds each model, runs it past warm-up and checks the
//! measurements against queueing theory.

use crate::analytic;
use crate::config::ScenarioConfig;
use crate::error::{RunResult, ScenarioError};
use crate::model::{average_sojourn_hours, hours_to_duration, Line};
use crate::scenarios::ScenarioId;

use eventide_core::{EventIssuer, HistogramBucket, LoadQueue, RunStrategy, Simulator, World};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Number of progress checkpoints over the measured period
const PROGRESS_SLICES: u32 = 10;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether every measurement matched its analytic value
    pub passed: bool,

    /// Events invoked, immediate executions included
    pub events_executed: u64,

    /// Final virtual time in hours
    pub final_time_hours: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected after warm-up
    pub metrics: ScenarioMetrics,
}

impl ScenarioResult {
    fn failed(scenario: ScenarioId, seed: u64, reason: String) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            events_executed: 0,
            final_time_hours: 0.0,
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
        }
    }
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    /// Arrivals offered to the system
    pub arrivals: u64,

    /// Arrivals turned away at a full waiting room
    pub blocked: u64,

    /// Jobs that finished service
    pub completed: u64,

    /// Average share of service capacity in use
    pub utilization: f64,
    pub expected_utilization: Option<f64>,

    /// Service completions per hour
    pub throughput_per_hour: f64,

    pub average_queue_length: f64,
    pub expected_queue_length: Option<f64>,
    pub queue_length_p95: f64,

    /// Mean hours spent waiting in the queue
    pub average_wait_hours: f64,

    /// Mean hours from arrival to departure of jobs admitted after warm-up
    pub average_sojourn_hours: f64,
    pub expected_sojourn_hours: Option<f64>,

    /// Jobs whose arrival and departure both fell in the measured period
    pub sojourns_measured: u64,

    pub blocking_probability: f64,
    pub expected_blocking: Option<f64>,

    /// Hours at each queue length
    pub queue_histogram: Vec<HistogramBucket>,
}

/// Runs queueing scenarios.
pub struct ScenarioRunner {
    /// Master seed
    seed: u64,

    config: ScenarioConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner with default parameters.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: ScenarioConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScenarioConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the measured period.
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.config.run_hours = hours;
        self
    }

    pub fn with_warmup_hours(mut self, hours: f64) -> Self {
        self.config.warmup_hours = hours;
        self
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Runs a scenario and returns the result. Errors become a failed
    /// result carrying the error message.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("  {}", scenario.description());

        match self.try_run(scenario) {
            Ok(result) => result,
            Err(e) => {
                warn!("Scenario {} aborted: {}", scenario.name(), e);
                ScenarioResult::failed(scenario, self.seed, e.to_string())
            }
        }
    }

    /// Runs a scenario, surfacing configuration and kernel errors.
    pub fn try_run(&self, scenario: ScenarioId) -> RunResult<ScenarioResult> {
        self.config.validate()?;
        // each run numbers its events from 1
        let events = EventIssuer::new();
        let _events = events.enter();
        match scenario {
            ScenarioId::Mm1 => self.run_pooled(scenario, 1),
            ScenarioId::Mmc => self.run_pooled(scenario, self.config.servers),
            ScenarioId::FiniteBuffer => self.run_finite_buffer(),
            ScenarioId::TwoStage => self.run_two_stage(),
        }
    }

    /// Unbounded queue in front of `servers` parallel servers.
    fn run_pooled(&self, scenario: ScenarioId, servers: usize) -> RunResult<ScenarioResult> {
        let config = &self.config;
        let lambda = config.arrival_rate()?;
        let mean_service = config.mean_hours(&config.service)?;
        let rho = analytic::utilization(lambda, mean_service, servers);
        if rho >= 1.0 {
            return Err(ScenarioError::Config(format!(
                "offered load {:.3} per server is unstable",
                rho
            )));
        }

        let mut world = World::new();
        let line = Line::build(&mut world, config, usize::MAX, self.seed)?;
        let server = line.serve(&mut world, config, servers, self.seed)?;
        let sim = self.simulate(world)?;

        let pool = sim.sandbox(server)?;
        let mut metrics = self.line_metrics(&sim, &line)?;
        metrics.completed = pool.completed();
        metrics.utilization = pool.utilization();
        metrics.throughput_per_hour = pool.throughput();
        metrics.expected_utilization = Some(rho);
        if config.is_markovian() {
            let queue_length = analytic::mmc_queue_length(lambda * mean_service, servers);
            metrics.expected_queue_length = Some(queue_length);
            metrics.expected_sojourn_hours = Some(queue_length / lambda + mean_service);
        }

        let failure = check("utilization", metrics.utilization, metrics.expected_utilization, config.tolerance);
        Ok(self.finish(scenario, &sim, metrics, failure))
    }

    /// M/M/1/K: one server, `buffer` waiting places, excess arrivals lost.
    fn run_finite_buffer(&self) -> RunResult<ScenarioResult> {
        let config = &self.config;
        let lambda = config.arrival_rate()?;
        let rho = analytic::utilization(lambda, config.mean_hours(&config.service)?, 1);

        let mut world = World::new();
        let line = Line::build(&mut world, config, config.buffer, self.seed)?;
        let server = line.serve(&mut world, config, 1, self.seed)?;
        let sim = self.simulate(world)?;

        let station = sim.sandbox(server)?;
        let mut metrics = self.line_metrics(&sim, &line)?;
        metrics.completed = station.completed();
        metrics.utilization = station.utilization();
        metrics.throughput_per_hour = station.throughput();
        if config.is_markovian() {
            let blocking = analytic::mm1k_blocking(rho, config.buffer + 1);
            metrics.expected_blocking = Some(blocking);
            metrics.expected_utilization = Some(rho * (1.0 - blocking));
        }

        let failure = check(
            "blocking probability",
            metrics.blocking_probability,
            metrics.expected_blocking,
            config.tolerance,
        )
        .or_else(|| check("utilization", metrics.utilization, metrics.expected_utilization, config.tolerance));
        Ok(self.finish(ScenarioId::FiniteBuffer, &sim, metrics, failure))
    }

    /// Unbounded queue in front of a handling + restoring station.
    fn run_two_stage(&self) -> RunResult<ScenarioResult> {
        let config = &self.config;
        let lambda = config.arrival_rate()?;
        let busy = config.mean_hours(&config.service)? + config.mean_hours(&config.restoring)?;
        let rho = analytic::utilization(lambda, busy, config.servers);
        if rho >= 1.0 {
            return Err(ScenarioError::Config(format!(
                "two-stage load {:.3} per server is unstable",
                rho
            )));
        }

        let mut world = World::new();
        let line = Line::build(&mut world, config, usize::MAX, self.seed)?;
        let station = line.serve_two_stage(&mut world, config, config.servers, self.seed)?;
        let sim = self.simulate(world)?;

        let stats = station.stats(sim.world())?;
        let restoring = sim.sandbox(sim.sandbox(station)?.restoring())?;
        let mut metrics = self.line_metrics(&sim, &line)?;
        metrics.completed = restoring.completed();
        metrics.utilization = stats.utilization;
        metrics.throughput_per_hour = stats.hourly_rate;
        metrics.expected_utilization = Some(rho);

        let failure = check("utilization", metrics.utilization, metrics.expected_utilization, config.tolerance)
            .or_else(|| check("throughput ratio", stats.hourly_rate / lambda, Some(1.0), config.tolerance));
        Ok(self.finish(ScenarioId::TwoStage, &sim, metrics, failure))
    }

    /// Warms up, then runs the measured period in slices, logging progress.
    fn simulate(&self, world: World) -> RunResult<Simulator> {
        let mut sim = Simulator::new(world);
        sim.warm_up(hours_to_duration(self.config.warmup_hours)?)?;
        let start = sim.clock();
        let span = hours_to_duration(self.config.run_hours)?;
        for slice in 1..=PROGRESS_SLICES {
            let target = start + span.mul_f64(f64::from(slice) / f64::from(PROGRESS_SLICES));
            sim.run(RunStrategy::ByTime(target))?;
            debug!(
                "  t={:.1}h | events={} | pending={}",
                sim.clock().as_hours(),
                sim.events_executed(),
                sim.pending_events()
            );
        }
        Ok(sim)
    }

    /// Arrival-side measurements common to every scenario.
    fn line_metrics(&self, sim: &Simulator, line: &Line) -> RunResult<ScenarioMetrics> {
        let admission = sim.sandbox(line.admission)?;
        let queue: &LoadQueue<_> = sim.sandbox(line.queue)?;
        let length = queue.occupancy_metric();
        let (average_sojourn_hours, sojourns_measured) = average_sojourn_hours(sim.world(), line.admission)?;
        Ok(ScenarioMetrics {
            average_sojourn_hours,
            sojourns_measured,
            arrivals: admission.offered(),
            blocked: admission.blocked(),
            blocking_probability: admission.blocking_probability(),
            average_queue_length: queue.average_length(),
            queue_length_p95: length.percentile(95.0),
            average_wait_hours: eventide_core::time::hours(length.average_duration()),
            queue_histogram: length.histogram(1.0)?,
            ..ScenarioMetrics::default()
        })
    }

    fn finish(
        &self,
        scenario: ScenarioId,
        sim: &Simulator,
        metrics: ScenarioMetrics,
        failure: Option<String>,
    ) -> ScenarioResult {
        let passed = failure.is_none();
        if passed {
            info!(
                "✓ {} complete: {} arrivals, utilization {:.3}, Lq {:.2}",
                scenario.name(),
                metrics.arrivals,
                metrics.utilization,
                metrics.average_queue_length
            );
        }
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            events_executed: sim.events_executed(),
            final_time_hours: sim.clock().as_hours(),
            failure_reason: failure,
            metrics,
        }
    }
}

/// Failure message when `measured` is further than `tolerance` from
/// `expected`. Nothing to check without an expectation.
fn check(what: &str, measured: f64, expected: Option<f64>, tolerance: f64) -> Option<String> {
    let expected = expected?;
    if (measured - expected).abs() <= tolerance {
        return None;
    }
    Some(format!(
        "{} {:.4} differs from analytic {:.4} by more than {}",
        what, measured, expected, tolerance
    ))
}
