//! Two-stage server: handling, then restoring, under one shared capacity.
//!
//! Built from two inner [`Server`]s wired through their subscriber lists.
//! A load leaving the handling stage starts restoring at the same instant;
//! both stages' state changes are re-raised as the composite's, and a
//! composite start raises one more after handing the load over.

use super::server::{Server, ServerConfig};
use super::{notify_all, Load, NotifyCallback, ServiceTime};
use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::sandbox::{Sandbox, SandboxCore, SandboxHandle, World};
use crate::simulator::EventContext;
use crate::time::SimTime;
use eventide_env::rng::derive_seed;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Two-stage server configuration.
pub struct TwoStageConfig<L> {
    /// Loads held across both stages
    pub capacity: usize,
    pub handling_time: ServiceTime<L>,
    pub restoring_time: ServiceTime<L>,
}

impl<L> TwoStageConfig<L> {
    pub fn new(handling_time: ServiceTime<L>, restoring_time: ServiceTime<L>) -> Self {
        Self {
            capacity: 1,
            handling_time,
            restoring_time,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl<L> Clone for TwoStageConfig<L> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            handling_time: Rc::clone(&self.handling_time),
            restoring_time: Rc::clone(&self.restoring_time),
        }
    }
}

impl<L> fmt::Debug for TwoStageConfig<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoStageConfig")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Aggregate view of both stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoStageStats {
    pub handling: usize,
    pub restoring: usize,
    pub vacancy: usize,

    /// Average loads in service across stages over capacity
    pub utilization: f64,

    /// Average loads held across stages over capacity
    pub occupation: f64,

    /// Handling completions per hour
    pub hourly_rate: f64,
}

/// Composite of a handling and a restoring server.
pub struct TwoStageServer<L> {
    core: SandboxCore,
    capacity: usize,
    handling: SandboxHandle<Server<L>>,
    restoring: SandboxHandle<Server<L>>,
    on_state_change: Vec<NotifyCallback>,
}

impl<L: Load> TwoStageServer<L> {
    /// Registers both inner servers and the composite in `world`, then wires
    /// them together. An empty tag keeps the default labels.
    pub fn build(
        world: &mut World,
        config: TwoStageConfig<L>,
        seed: u64,
        tag: &str,
    ) -> SimResult<SandboxHandle<Self>> {
        let stage = |time: &ServiceTime<L>, stream: u64, suffix: &str| {
            let server = Server::new(
                ServerConfig {
                    capacity: config.capacity,
                    service_time: Rc::clone(time),
                },
                derive_seed(seed, stream),
            );
            if tag.is_empty() {
                server
            } else {
                server.with_tag(format!("{}.{}", tag, suffix))
            }
        };
        let handling = world.insert(stage(&config.handling_time, 1, "Handling"));
        let restoring = world.insert(stage(&config.restoring_time, 2, "Restoring"));

        let composite = world.insert(Self {
            core: SandboxCore::new("TwoStageServer", seed).with_tag(tag),
            capacity: config.capacity,
            handling,
            restoring,
            on_state_change: Vec::new(),
        });

        let inner = world.get_mut(handling)?;
        inner.on_depart(move |load| restoring.start(load));
        inner.on_state_change(move || composite.state_change());
        world
            .get_mut(restoring)?
            .on_state_change(move || composite.state_change());
        Ok(composite)
    }

    /// Subscribes to every change in either stage.
    pub fn on_state_change(&mut self, subscriber: impl Fn() -> Event + 'static) {
        self.on_state_change.push(Rc::new(subscriber));
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn handling(&self) -> SandboxHandle<Server<L>> {
        self.handling
    }

    pub fn restoring(&self) -> SandboxHandle<Server<L>> {
        self.restoring
    }

    fn handle_start(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>, load: L) -> SimResult<()> {
        let vacancy = handle.vacancy(ctx.world())?;
        let composite = ctx.sandbox(handle)?;
        if vacancy == 0 {
            return Err(SimError::capacity(&composite.core, composite.capacity));
        }
        let handling = composite.handling;
        ctx.execute(handling.start(load))?;
        ctx.execute(handle.state_change())
    }

    fn handle_update_ready(
        ctx: &mut EventContext<'_>,
        handle: SandboxHandle<Self>,
        ready: bool,
    ) -> SimResult<()> {
        let handling = ctx.sandbox(handle)?.handling;
        ctx.execute(handling.update_ready_to_depart(ready))
    }

    fn handle_state_change(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>) -> SimResult<()> {
        let reactions = notify_all(&ctx.sandbox(handle)?.on_state_change);
        ctx.execute_all(reactions)
    }
}

impl<L: Load> Sandbox for TwoStageServer<L> {
    fn core(&self) -> &SandboxCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SandboxCore {
        &mut self.core
    }

    /// Inner servers reset their own statistics.
    fn warmed_up(&mut self, _clock: SimTime) {}
}

impl<L: Load> fmt::Debug for TwoStageServer<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwoStageServer")
            .field("core", &self.core)
            .field("capacity", &self.capacity)
            .field("handling", &self.handling)
            .field("restoring", &self.restoring)
            .finish()
    }
}

/// Events and world-level queries of a two-stage server.
impl<L: Load> SandboxHandle<TwoStageServer<L>> {
    /// Starts handling `load`. Fails when both stages together are full.
    pub fn start(self, load: L) -> Event {
        Event::new("Start", move |ctx| TwoStageServer::handle_start(ctx, self, load))
            .owned_by(self.id())
    }

    /// Gates departures out of the handling stage.
    pub fn update_ready_to_depart(self, ready: bool) -> Event {
        Event::new("UpdateReadyToDepart", move |ctx| {
            TwoStageServer::handle_update_ready(ctx, self, ready)
        })
        .owned_by(self.id())
    }

    fn state_change(self) -> Event {
        Event::new("StateChange", move |ctx| TwoStageServer::handle_state_change(ctx, self))
            .owned_by(self.id())
    }

    /// Subscribes to loads leaving the restoring stage.
    pub fn on_depart(self, world: &mut World, subscriber: impl Fn(L) -> Event + 'static) -> SimResult<()> {
        let restoring = world.get(self)?.restoring;
        world.get_mut(restoring)?.on_depart(subscriber);
        Ok(())
    }

    /// Room left under the shared capacity.
    pub fn vacancy(self, world: &World) -> SimResult<usize> {
        let composite = world.get(self)?;
        let held = world.get(composite.handling)?.occupancy() + world.get(composite.restoring)?.occupancy();
        Ok(composite.capacity.saturating_sub(held))
    }

    pub fn stats(self, world: &World) -> SimResult<TwoStageStats> {
        let composite = world.get(self)?;
        let handling = world.get(composite.handling)?;
        let restoring = world.get(composite.restoring)?;
        let share = |total: f64| {
            if composite.capacity == 0 {
                0.0
            } else {
                total / composite.capacity as f64
            }
        };
        Ok(TwoStageStats {
            handling: handling.occupancy(),
            restoring: restoring.occupancy(),
            vacancy: self.vacancy(world)?,
            utilization: share(
                handling.utilization_metric().average_count()
                    + restoring.utilization_metric().average_count(),
            ),
            occupation: share(
                handling.occupation_metric().average_count()
                    + restoring.occupation_metric().average_count(),
            ),
            hourly_rate: handling.utilization_metric().decrement_rate(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::Simulator;
    use crate::strategy::RunStrategy;
    use eventide_env::SimRng;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    fn fixed(secs: u64) -> ServiceTime<u32> {
        Rc::new(move |_: &u32, _: &mut SimRng| Ok(Duration::from_secs(secs)))
    }

    fn build(capacity: usize) -> (World, SandboxHandle<TwoStageServer<u32>>) {
        let mut world = World::new();
        let config = TwoStageConfig::new(fixed(10), fixed(20)).with_capacity(capacity);
        let handle = TwoStageServer::build(&mut world, config, 9, "Crane").unwrap();
        (world, handle)
    }

    #[test]
    fn test_handoff_at_same_instant() {
        let (mut world, handle) = build(1);
        let departed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&departed);
        handle
            .on_depart(&mut world, move |load| {
                let sink = Rc::clone(&sink);
                Event::new("Collect", move |ctx| {
                    sink.borrow_mut().push((ctx.clock(), load));
                    Ok(())
                })
            })
            .unwrap();
        world.add_initial_event(handle.start(1));
        let restoring = world.get(handle).unwrap().restoring();

        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(15))).unwrap();
        let stage = sim.sandbox(restoring).unwrap();
        assert!(stage.is_serving(&1));
        assert_eq!(stage.start_time(&1), Some(SimTime::from_secs(10)));

        sim.run(RunStrategy::ByTime(SimTime::from_secs(40))).unwrap();
        assert_eq!(*departed.borrow(), vec![(SimTime::from_secs(30), 1)]);
    }

    #[test]
    fn test_shared_capacity_spans_both_stages() {
        let (world, handle) = build(1);
        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::BySpecificEvent(handle.start(1))).unwrap();
        sim.run(RunStrategy::ByTime(SimTime::from_secs(15))).unwrap();

        let stats = handle.stats(sim.world()).unwrap();
        assert_eq!((stats.handling, stats.restoring, stats.vacancy), (0, 1, 0));

        let err = sim.run(RunStrategy::BySpecificEvent(handle.start(2))).unwrap_err();
        assert!(matches!(err, SimError::CapacityExceeded { ref sandbox, .. } if sandbox == "Crane"));
    }

    #[test]
    fn test_inner_state_changes_reraised() {
        let (mut world, handle) = build(2);
        let notified = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&notified);
        world.get_mut(handle).unwrap().on_state_change(move || {
            let counter = Rc::clone(&counter);
            Event::new("Count", move |_| {
                counter.set(counter.get() + 1);
                Ok(())
            })
        });
        world.add_initial_event(handle.start(1));

        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(60))).unwrap();
        // composite start; handling: start, finish, depart; restoring: start, finish, depart
        assert_eq!(notified.get(), 7);
    }

    #[test]
    fn test_start_notifies_after_handling_took_load() {
        let (mut world, handle) = build(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        world.get_mut(handle).unwrap().on_state_change(move || {
            let sink = Rc::clone(&sink);
            Event::new("Look", move |ctx| {
                let vacancy = handle.vacancy(ctx.world())?;
                sink.borrow_mut().push(vacancy);
                Ok(())
            })
        });

        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::BySpecificEvent(handle.start(1))).unwrap();
        // re-raised handling start, then the composite's own
        assert_eq!(*seen.borrow(), vec![0, 0]);
    }

    #[test]
    fn test_inner_labels_follow_tag() {
        let (world, handle) = build(1);
        let composite = world.get(handle).unwrap();
        assert_eq!(
            world.label(composite.handling().id()).as_deref(),
            Some("Crane.Handling")
        );
        assert_eq!(
            world.label(composite.restoring().id()).as_deref(),
            Some("Crane.Restoring")
        );
    }

    #[test]
    fn test_hourly_rate_counts_handling_completions() {
        let (world, handle) = build(2);
        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::BySpecificEvent(handle.start(1))).unwrap();
        sim.run(RunStrategy::BySpecificEvent(handle.start(2))).unwrap();
        sim.run(RunStrategy::ByTime(SimTime::from_secs(60))).unwrap();

        let stats = handle.stats(sim.world()).unwrap();
        assert_eq!(stats.vacancy, 2);
        // two completions over the 10 s accounted by the handling stage
        assert!((stats.hourly_rate - 2.0 / (10.0 / 3_600.0)).abs() < 1e-6);
    }
}
