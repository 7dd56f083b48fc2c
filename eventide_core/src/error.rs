//! Error types for the simulation kernel.

use crate::ids::{SandboxId, SimulatorId};
use crate::time::SimTime;
use eventide_env::DistributionError;
use thiserror::Error;

/// Errors raised by the kernel and its components.
///
/// All of them are fatal to the run: they surface from the event that hit
/// them straight out of `execute_head_event` / `run`.
#[derive(Debug, Error)]
pub enum SimError {
    /// Attempted to place an event before the current clock.
    #[error("Cannot schedule {event} at {requested}: clock is already at {clock}")]
    SchedulingInPast {
        event: String,
        requested: SimTime,
        clock: SimTime,
    },

    /// A run target lies before the current clock.
    #[error("Run target {target} is before the current clock {clock}")]
    TargetInPast { target: SimTime, clock: SimTime },

    /// An event without an index or scheduled time was ordered.
    #[error("Event {0} has not been scheduled and cannot be ordered")]
    UnboundEvent(String),

    /// An event bound to one simulator was handed to another.
    #[error("Event {event} is bound to simulator {bound}, not {current}")]
    ForeignEvent {
        event: String,
        bound: SimulatorId,
        current: SimulatorId,
    },

    /// A component was asked to take a load it has no room for.
    #[error("{sandbox} is full (capacity {capacity})")]
    CapacityExceeded { sandbox: String, capacity: usize },

    /// A load was started while the component already held it.
    #[error("{sandbox} already holds this load")]
    DuplicateLoad { sandbox: String },

    /// No sandbox with this id exists in the world.
    #[error("Sandbox {0} not found")]
    SandboxNotFound(SandboxId),

    /// A handle was used with the wrong sandbox type.
    #[error("Sandbox {id} is not a {expected}")]
    SandboxTypeMismatch { id: SandboxId, expected: &'static str },

    /// Immediate executions nested deeper than the configured limit.
    #[error("Cascade depth limit {limit} exceeded while executing {event}")]
    CascadeOverflow { limit: usize, event: String },

    /// An argument is outside its domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A distribution rejected its parameters or produced an unusable sample.
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

impl SimError {
    /// Creates an invalid-argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a capacity error for the sandbox displayed as `sandbox`.
    pub fn capacity(sandbox: impl std::fmt::Display, capacity: usize) -> Self {
        Self::CapacityExceeded {
            sandbox: sandbox.to_string(),
            capacity,
        }
    }
}

/// Result alias for kernel operations.
pub type SimResult<T> = Result<T, SimError>;
