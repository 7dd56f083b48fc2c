//! Error types for the Eventide environment collaborators.

use thiserror::Error;

/// Errors raised when building or evaluating a random-variate distribution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DistributionError {
    /// A shape parameter is outside its domain.
    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A probability argument is outside [0, 1].
    #[error("Probability {0} is outside [0, 1]")]
    ProbabilityOutOfRange(f64),

    /// Sampling from an empty candidate set.
    #[error("Cannot sample from an empty {0}")]
    EmptyCandidates(&'static str),

    /// A sample cannot be turned into a non-negative duration.
    #[error("Sample {0} is not a valid duration")]
    InvalidDuration(f64),

    /// The statistics backend refused the fitted parameters.
    #[error("Statistics backend error: {0}")]
    Backend(String),
}

impl DistributionError {
    /// Creates an invalid-parameter error.
    pub fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter { name, value, reason }
    }

    /// Wraps an error reported by `statrs` or `rand_distr`.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Result alias for distribution operations.
pub type DistResult<T> = Result<T, DistributionError>;
