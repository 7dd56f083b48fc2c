//! Reusable queueing components.
//!
//! Each component is a [`Sandbox`](crate::sandbox::Sandbox) whose operations
//! are event factories on its [`SandboxHandle`](crate::sandbox::SandboxHandle):
//! `server.start(load)` returns an [`Event`] that, once scheduled or
//! executed, mutates that server inside the world.
//!
//! Components talk to each other through ordered subscriber lists. A
//! subscriber turns the payload into an event, which the component executes
//! immediately, in registration order.

pub mod generator;
pub mod load;
pub mod queue;
pub mod server;
pub mod two_stage;

pub use generator::{Generator, GeneratorConfig};
pub use load::TrackedLoad;
pub use queue::{LoadQueue, QueueConfig};
pub use server::{Server, ServerConfig};
pub use two_stage::{TwoStageConfig, TwoStageServer, TwoStageStats};

use crate::event::Event;
use eventide_env::{DistResult, SimRng, TimeUnit, Variate};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use std::time::Duration;

/// Anything that can flow through the components.
///
/// Loads are compared by value: two equal loads cannot be inside the same
/// server at once. A `SandboxHandle<TrackedLoad>` is a load that keeps its
/// own milestone log.
pub trait Load: Clone + Eq + Hash + fmt::Debug + 'static {}

impl<T: Clone + Eq + Hash + fmt::Debug + 'static> Load for T {}

/// Subscriber receiving a load (departure, dequeue, arrival).
pub type LoadCallback<L> = Rc<dyn Fn(L) -> Event>;

/// Subscriber to a state-change notification.
pub type NotifyCallback = Rc<dyn Fn() -> Event>;

/// Service duration of a load, drawn from the server's own stream.
pub type ServiceTime<L> = Rc<dyn Fn(&L, &mut SimRng) -> DistResult<Duration>>;

/// Gap until the next arrival.
pub type InterArrival = Rc<dyn Fn(&mut SimRng) -> DistResult<Duration>>;

/// Builds the `n`-th load of a generator (`n` counts from 0 and is never
/// reset).
pub type LoadFactory<L> = Rc<dyn Fn(u64, &mut SimRng) -> L>;

/// Service time sampled from `variate`, read in `unit`, for every load.
pub fn service_time<L>(variate: Variate, unit: TimeUnit) -> ServiceTime<L> {
    Rc::new(move |_: &L, rng: &mut SimRng| variate.sample_duration(rng, unit))
}

/// Interarrival time sampled from `variate`, read in `unit`.
pub fn inter_arrival(variate: Variate, unit: TimeUnit) -> InterArrival {
    Rc::new(move |rng: &mut SimRng| variate.sample_duration(rng, unit))
}

/// Events for every subscriber of a load-carrying notification.
pub(crate) fn fan_out<L: Clone>(subscribers: &[LoadCallback<L>], load: &L) -> Vec<Event> {
    subscribers.iter().map(|f| f(load.clone())).collect()
}

/// Events for every state-change subscriber.
pub(crate) fn notify_all(subscribers: &[NotifyCallback]) -> Vec<Event> {
    subscribers.iter().map(|f| f()).collect()
}
