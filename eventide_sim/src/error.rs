//! Errors of the scenario harness.

use eventide_core::SimError;
use eventide_env::DistributionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The model hit a fatal kernel error.
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    /// Parameters that cannot describe the requested model.
    #[error("Invalid scenario configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for harness operations.
pub type RunResult<T> = Result<T, ScenarioError>;
