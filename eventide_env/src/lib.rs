//! Eventide Environment Collaborators
//!
//! Everything the simulation kernel consumes from "outside" lives here:
//! - **Randomness**: seeded ChaCha8 streams and sub-stream derivation
//! - **Distributions**: validated random-variate generators with CDF and
//!   inverse CDF
//! - **Wall clock**: real time for the speed-throttled run mode
//!
//! By deriving all entropy from a single 64-bit seed, any run is
//! reproducible from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use eventide_env::{rng, DistributionSpec, TimeUnit};
//!
//! let service = DistributionSpec::Gamma { mean: 4.0, cv: 0.5 }.build()?;
//! let mut rng = rng::seeded(42);
//! let delay = service.sample_duration(&mut rng, TimeUnit::Minutes)?;
//! ```

pub mod clock;
pub mod distributions;
mod error;
pub mod rng;

pub use clock::{ManualClock, SystemClock, WallClock};
pub use distributions::{DistributionSpec, TimeUnit, Variate};
pub use error::{DistResult, DistributionError};
pub use rng::SimRng;
