//! Eventide queueing-scenario harness
//!
//! Builds classic queueing models on the `eventide_core` kernel, runs them
//! for a fixed virtual horizon after a warm-up, and checks the time-weighted
//! statistics against closed-form results.
//!
//! # Scenarios
//!
//! - **mm1**: single server, unbounded queue
//! - **mmc**: `c` parallel servers sharing one queue
//! - **finite_buffer**: single server with a bounded waiting room (M/M/1/K)
//! - **two_stage**: servers that need a restoring period after each job
//!
//! # Usage
//!
//! ```ignore
//! use eventide_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42)
//!     .with_hours(1_000.0)
//!     .run(ScenarioId::Mm1);
//! assert!(result.passed);
//! ```

pub mod analytic;
pub mod config;
pub mod error;
pub mod exporter;
pub mod model;
pub mod runner;
pub mod scenarios;

pub use config::ScenarioConfig;
pub use error::{RunResult, ScenarioError};
pub use exporter::RunReport;
pub use model::{Admission, Job, Line};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
