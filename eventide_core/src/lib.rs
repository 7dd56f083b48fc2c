//! Eventide Core - Discrete-Event Simulation Kernel
//!
//! A virtual clock that jumps from event to event, plus the stateful
//! components and statistics built on it:
//! 1. **Kernel**: future event list ordered by (time, index), immediate
//!    same-instant cascades, pluggable run strategies and warm-up
//! 2. **Sandboxes**: entities owned by a [`World`] arena, addressed through
//!    typed [`SandboxHandle`]s, each with its own seeded random stream
//! 3. **Components**: server, FIFO queue, arrival generator, a two-stage
//!    composite and timestamped loads, wired through ordered subscriber lists
//! 4. **Statistics**: time-weighted averages, rates, percentiles and
//!    histograms over piecewise-constant signals
//!
//! Execution is single-threaded and deterministic for a fixed set of seeds.

pub mod components;
pub mod error;
pub mod event;
mod fel;
pub mod ids;
pub mod metrics;
pub mod sandbox;
pub mod simulator;
pub mod state_tracker;
pub mod strategy;
pub mod time;

// Re-export key types for convenience
pub use components::{
    Generator, GeneratorConfig, Load, LoadQueue, QueueConfig, Server, ServerConfig, TrackedLoad,
    TwoStageConfig, TwoStageServer, TwoStageStats,
};
pub use error::{SimError, SimResult};
pub use event::Event;
pub use ids::{EventIndex, EventIssuer, IssuerGuard, SandboxId, SimulatorId};
pub use metrics::{HistogramBucket, MetricSnapshot, TimeWeightedMetric};
pub use sandbox::{Sandbox, SandboxCore, SandboxHandle, World};
pub use simulator::{EventContext, Simulator, SimulatorConfig};
pub use state_tracker::StateTracker;
pub use strategy::RunStrategy;
pub use time::SimTime;
