//! Multi-slot server.
//!
//! A load is either being served, served and waiting to depart, or absent.
//! Served loads leave in the order they finished, whenever the server is
//! ready to depart.

use super::{fan_out, notify_all, Load, LoadCallback, NotifyCallback, ServiceTime};
use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::metrics::TimeWeightedMetric;
use crate::sandbox::{Sandbox, SandboxCore, SandboxHandle};
use crate::simulator::EventContext;
use crate::time::SimTime;
use eventide_env::{DistResult, SimRng};
use indexmap::IndexSet;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Server configuration.
pub struct ServerConfig<L> {
    /// Maximum loads held, serving and served together
    pub capacity: usize,

    /// Service duration for a load
    pub service_time: ServiceTime<L>,
}

impl<L> ServerConfig<L> {
    /// Single-slot server with the given service time.
    pub fn new<F>(service_time: F) -> Self
    where
        F: Fn(&L, &mut SimRng) -> DistResult<Duration> + 'static,
    {
        Self {
            capacity: 1,
            service_time: Rc::new(service_time),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_service_time(mut self, service_time: ServiceTime<L>) -> Self {
        self.service_time = service_time;
        self
    }
}

impl<L> Clone for ServerConfig<L> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            service_time: Rc::clone(&self.service_time),
        }
    }
}

impl<L> fmt::Debug for ServerConfig<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Server holding up to `capacity` loads.
pub struct Server<L> {
    core: SandboxCore,
    config: ServerConfig<L>,

    /// Loads in service, in start order
    serving: IndexSet<L>,

    /// Finished loads, in finish order
    served: IndexSet<L>,

    start_times: HashMap<L, SimTime>,
    finish_times: HashMap<L, SimTime>,

    /// Gate for automatic departures
    ready_to_depart: bool,

    /// Counts loads in service
    utilization: TimeWeightedMetric,

    /// Counts loads held (serving + served)
    occupation: TimeWeightedMetric,

    on_depart: Vec<LoadCallback<L>>,
    on_state_change: Vec<NotifyCallback>,
}

impl<L: Load> Server<L> {
    pub fn new(config: ServerConfig<L>, seed: u64) -> Self {
        Self {
            core: SandboxCore::new("Server", seed),
            config,
            serving: IndexSet::new(),
            served: IndexSet::new(),
            start_times: HashMap::new(),
            finish_times: HashMap::new(),
            ready_to_depart: true,
            utilization: TimeWeightedMetric::new(),
            occupation: TimeWeightedMetric::new(),
            on_depart: Vec::new(),
            on_state_change: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.core = self.core.with_tag(tag);
        self
    }

    /// Subscribes to departures. The returned event runs as the load leaves.
    pub fn on_depart(&mut self, subscriber: impl Fn(L) -> Event + 'static) {
        self.on_depart.push(Rc::new(subscriber));
    }

    /// Subscribes to every change of the server's contents.
    pub fn on_state_change(&mut self, subscriber: impl Fn() -> Event + 'static) {
        self.on_state_change.push(Rc::new(subscriber));
    }

    pub fn config(&self) -> &ServerConfig<L> {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn occupancy(&self) -> usize {
        self.serving.len() + self.served.len()
    }

    pub fn vacancy(&self) -> usize {
        self.config.capacity.saturating_sub(self.occupancy())
    }

    pub fn serving(&self) -> impl Iterator<Item = &L> {
        self.serving.iter()
    }

    pub fn served(&self) -> impl Iterator<Item = &L> {
        self.served.iter()
    }

    pub fn is_serving(&self, load: &L) -> bool {
        self.serving.contains(load)
    }

    pub fn contains(&self, load: &L) -> bool {
        self.serving.contains(load) || self.served.contains(load)
    }

    pub fn is_ready_to_depart(&self) -> bool {
        self.ready_to_depart
    }

    pub fn start_time(&self, load: &L) -> Option<SimTime> {
        self.start_times.get(load).copied()
    }

    pub fn finish_time(&self, load: &L) -> Option<SimTime> {
        self.finish_times.get(load).copied()
    }

    pub fn utilization_metric(&self) -> &TimeWeightedMetric {
        &self.utilization
    }

    pub fn occupation_metric(&self) -> &TimeWeightedMetric {
        &self.occupation
    }

    /// Loads that finished service, departed or not.
    pub fn completed(&self) -> u64 {
        self.utilization.total_decrement() as u64
    }

    /// Average share of the capacity in service.
    pub fn utilization(&self) -> f64 {
        ratio(self.utilization.average_count(), self.config.capacity)
    }

    /// Average share of the capacity held.
    pub fn occupation(&self) -> f64 {
        ratio(self.occupation.average_count(), self.config.capacity)
    }

    /// Departures per hour.
    pub fn throughput(&self) -> f64 {
        self.occupation.decrement_rate()
    }

    fn can_depart(&self) -> bool {
        self.ready_to_depart && !self.served.is_empty()
    }

    fn handle_start(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>, load: L) -> SimResult<()> {
        let clock = ctx.clock();
        let server = ctx.sandbox_mut(handle)?;
        if server.vacancy() == 0 {
            return Err(SimError::capacity(&server.core, server.config.capacity));
        }
        if server.contains(&load) {
            return Err(SimError::DuplicateLoad {
                sandbox: server.core.to_string(),
            });
        }
        let delay = (server.config.service_time)(&load, server.core.rng_mut())?;
        server.serving.insert(load.clone());
        server.utilization.observe_change(1.0, clock);
        server.occupation.observe_change(1.0, clock);
        server.start_times.insert(load.clone(), clock);
        debug!(clock = %clock, server = %server.core, load = ?load, ?delay, "Service started");

        ctx.schedule_after(handle.finish(load), delay)?;
        ctx.execute(handle.state_change())
    }

    fn handle_finish(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>, load: L) -> SimResult<()> {
        let clock = ctx.clock();
        let server = ctx.sandbox_mut(handle)?;
        if !server.serving.shift_remove(&load) {
            return Err(SimError::invalid(format!("{} is not serving {:?}", server.core, load)));
        }
        server.served.insert(load.clone());
        server.finish_times.insert(load, clock);
        server.utilization.observe_change(-1.0, clock);

        ctx.execute(handle.state_change())?;
        if ctx.sandbox(handle)?.can_depart() {
            ctx.execute(handle.depart())?;
        }
        Ok(())
    }

    /// Releases served loads one at a time while the gate stays open.
    fn handle_depart(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>) -> SimResult<()> {
        loop {
            let clock = ctx.clock();
            let server = ctx.sandbox_mut(handle)?;
            if !server.ready_to_depart {
                return Ok(());
            }
            let Some(load) = server.served.shift_remove_index(0) else {
                return Ok(());
            };
            server.occupation.observe_change(-1.0, clock);
            server.start_times.remove(&load);
            server.finish_times.remove(&load);
            debug!(clock = %clock, server = %server.core, load = ?load, "Departed");
            let reactions = fan_out(&server.on_depart, &load);

            ctx.execute_all(reactions)?;
            ctx.execute(handle.state_change())?;
        }
    }

    fn handle_update_ready(
        ctx: &mut EventContext<'_>,
        handle: SandboxHandle<Self>,
        ready: bool,
    ) -> SimResult<()> {
        let server = ctx.sandbox_mut(handle)?;
        server.ready_to_depart = ready;
        if server.can_depart() {
            ctx.execute(handle.depart())?;
        }
        Ok(())
    }

    fn handle_state_change(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>) -> SimResult<()> {
        let reactions = notify_all(&ctx.sandbox(handle)?.on_state_change);
        ctx.execute_all(reactions)
    }
}

impl<L: Load> Sandbox for Server<L> {
    fn core(&self) -> &SandboxCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SandboxCore {
        &mut self.core
    }

    fn warmed_up(&mut self, clock: SimTime) {
        self.utilization.warmed_up(clock);
        self.occupation.warmed_up(clock);
    }
}

impl<L: Load> fmt::Debug for Server<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("core", &self.core)
            .field("capacity", &self.config.capacity)
            .field("serving", &self.serving)
            .field("served", &self.served)
            .field("ready_to_depart", &self.ready_to_depart)
            .finish()
    }
}

/// Events of a server.
impl<L: Load> SandboxHandle<Server<L>> {
    /// Starts serving `load`. Fails if the server is full or already holds
    /// the load.
    pub fn start(self, load: L) -> Event {
        Event::new("Start", move |ctx| Server::handle_start(ctx, self, load)).owned_by(self.id())
    }

    /// Opens or closes the departure gate; opening releases served loads.
    pub fn update_ready_to_depart(self, ready: bool) -> Event {
        Event::new("UpdateReadyToDepart", move |ctx| {
            Server::handle_update_ready(ctx, self, ready)
        })
        .owned_by(self.id())
    }

    fn finish(self, load: L) -> Event {
        Event::new("Finish", move |ctx| Server::handle_finish(ctx, self, load)).owned_by(self.id())
    }

    fn depart(self) -> Event {
        Event::new("Depart", move |ctx| Server::handle_depart(ctx, self)).owned_by(self.id())
    }

    fn state_change(self) -> Event {
        Event::new("StateChange", move |ctx| Server::handle_state_change(ctx, self))
            .owned_by(self.id())
    }
}

fn ratio(average: f64, capacity: usize) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        average / capacity as f64
    }
}
