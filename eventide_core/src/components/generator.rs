//! Self-rescheduling arrival process.
//!
//! There is no event cancellation: `stop` bumps an activation epoch, and any
//! arrival still pending from an older epoch does nothing when it fires.

use super::{fan_out, InterArrival, Load, LoadCallback, LoadFactory};
use crate::error::SimResult;
use crate::event::Event;
use crate::sandbox::{Sandbox, SandboxCore, SandboxHandle};
use crate::simulator::EventContext;
use crate::time::SimTime;
use eventide_env::{DistResult, SimRng};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Generator configuration.
pub struct GeneratorConfig<L> {
    pub inter_arrival: InterArrival,
    pub create: LoadFactory<L>,

    /// Wait one interarrival gap before the first arrival
    pub skip_first: bool,
}

impl<L> GeneratorConfig<L> {
    pub fn new<A, C>(inter_arrival: A, create: C) -> Self
    where
        A: Fn(&mut SimRng) -> DistResult<Duration> + 'static,
        C: Fn(u64, &mut SimRng) -> L + 'static,
    {
        Self {
            inter_arrival: Rc::new(inter_arrival),
            create: Rc::new(create),
            skip_first: true,
        }
    }

    pub fn with_inter_arrival(mut self, inter_arrival: InterArrival) -> Self {
        self.inter_arrival = inter_arrival;
        self
    }

    pub fn with_skip_first(mut self, skip_first: bool) -> Self {
        self.skip_first = skip_first;
        self
    }
}

impl<L> Clone for GeneratorConfig<L> {
    fn clone(&self) -> Self {
        Self {
            inter_arrival: Rc::clone(&self.inter_arrival),
            create: Rc::clone(&self.create),
            skip_first: self.skip_first,
        }
    }
}

impl<L> fmt::Debug for GeneratorConfig<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("skip_first", &self.skip_first)
            .finish_non_exhaustive()
    }
}

/// Creates loads at sampled intervals while active.
pub struct Generator<L> {
    core: SandboxCore,
    config: GeneratorConfig<L>,
    active: bool,

    /// Bumped by every stop
    epoch: u64,

    /// Arrivals since the last start or warm-up
    count: u64,

    /// Arrivals ever, passed to the load factory
    sequence: u64,

    start_time: Option<SimTime>,
    on_arrive: Vec<LoadCallback<L>>,
}

impl<L: Load> Generator<L> {
    pub fn new(config: GeneratorConfig<L>, seed: u64) -> Self {
        Self {
            core: SandboxCore::new("Generator", seed),
            config,
            active: false,
            epoch: 0,
            count: 0,
            sequence: 0,
            start_time: None,
            on_arrive: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.core = self.core.with_tag(tag);
        self
    }

    /// Subscribes to arrivals.
    pub fn on_arrive(&mut self, subscriber: impl Fn(L) -> Event + 'static) {
        self.on_arrive.push(Rc::new(subscriber));
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Start of the current counting window.
    pub fn start_time(&self) -> Option<SimTime> {
        self.start_time
    }

    /// Arrivals per hour since the start of the counting window, up to
    /// `clock`.
    pub fn hourly_rate(&self, clock: SimTime) -> f64 {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        let elapsed = crate::time::hours(clock.saturating_since(start));
        if elapsed == 0.0 {
            0.0
        } else {
            self.count as f64 / elapsed
        }
    }

    fn handle_start(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>) -> SimResult<()> {
        let clock = ctx.clock();
        let generator = ctx.sandbox_mut(handle)?;
        if generator.active {
            return Ok(());
        }
        generator.active = true;
        generator.count = 0;
        generator.start_time = Some(clock);
        let epoch = generator.epoch;
        debug!(clock = %clock, generator = %generator.core, epoch, "Generator started");
        if generator.config.skip_first {
            let gap = (generator.config.inter_arrival)(generator.core.rng_mut())?;
            ctx.schedule_after(handle.arrive(epoch), gap)
        } else {
            ctx.schedule_now(handle.arrive(epoch))
        }
    }

    fn handle_stop(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>) -> SimResult<()> {
        let clock = ctx.clock();
        let generator = ctx.sandbox_mut(handle)?;
        if generator.active {
            generator.active = false;
            generator.epoch += 1;
            debug!(clock = %clock, generator = %generator.core, count = generator.count, "Generator stopped");
        }
        Ok(())
    }

    fn handle_arrive(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>, epoch: u64) -> SimResult<()> {
        let generator = ctx.sandbox_mut(handle)?;
        if !generator.active || generator.epoch != epoch {
            return Ok(());
        }
        let load = (generator.config.create)(generator.sequence, generator.core.rng_mut());
        generator.sequence += 1;
        generator.count += 1;
        let gap = (generator.config.inter_arrival)(generator.core.rng_mut())?;
        let reactions = fan_out(&generator.on_arrive, &load);

        ctx.schedule_after(handle.arrive(epoch), gap)?;
        ctx.execute_all(reactions)
    }
}

impl<L: Load> Sandbox for Generator<L> {
    fn core(&self) -> &SandboxCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SandboxCore {
        &mut self.core
    }

    fn warmed_up(&mut self, clock: SimTime) {
        self.start_time = Some(clock);
        self.count = 0;
    }
}

impl<L: Load> fmt::Debug for Generator<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("core", &self.core)
            .field("active", &self.active)
            .field("epoch", &self.epoch)
            .field("count", &self.count)
            .finish()
    }
}

/// Events of a generator.
impl<L: Load> SandboxHandle<Generator<L>> {
    /// Activates the generator; no-op if already active.
    pub fn start(self) -> Event {
        Event::new("Start", move |ctx| Generator::handle_start(ctx, self)).owned_by(self.id())
    }

    /// Deactivates the generator; pending arrivals become no-ops.
    pub fn stop(self) -> Event {
        Event::new("Stop", move |ctx| Generator::handle_stop(ctx, self)).owned_by(self.id())
    }

    fn arrive(self, epoch: u64) -> Event {
        Event::new("Arrive", move |ctx| Generator::handle_arrive(ctx, self, epoch)).owned_by(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::World;
    use crate::simulator::Simulator;
    use crate::strategy::RunStrategy;
    use approx::assert_relative_eq;
    use eventide_env::{DistributionSpec, TimeUnit};
    use std::cell::RefCell;

    type Arrivals = Rc<RefCell<Vec<(SimTime, u64)>>>;

    fn every(secs: u64) -> GeneratorConfig<u64> {
        GeneratorConfig::new(
            move |_: &mut SimRng| Ok(Duration::from_secs(secs)),
            |n, _: &mut SimRng| n,
        )
    }

    fn build(config: GeneratorConfig<u64>) -> (World, SandboxHandle<Generator<u64>>, Arrivals) {
        let mut world = World::new();
        let mut generator = Generator::new(config, 5);
        let arrivals: Arrivals = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&arrivals);
        generator.on_arrive(move |load| {
            let sink = Rc::clone(&sink);
            Event::new("Collect", move |ctx| {
                sink.borrow_mut().push((ctx.clock(), load));
                Ok(())
            })
        });
        let handle = world.insert(generator);
        world.add_initial_event(handle.start());
        (world, handle, arrivals)
    }

    #[test]
    fn test_skip_first_waits_one_gap() {
        let (world, handle, arrivals) = build(every(10));
        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(35))).unwrap();

        let expected: Vec<_> = [10, 20, 30]
            .iter()
            .enumerate()
            .map(|(n, t)| (SimTime::from_secs(*t), n as u64))
            .collect();
        assert_eq!(*arrivals.borrow(), expected);
        assert_eq!(sim.sandbox(handle).unwrap().count(), 3);
        assert_relative_eq!(
            sim.sandbox(handle).unwrap().hourly_rate(sim.clock()),
            3.0 / (35.0 / 3_600.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_no_skip_arrives_at_start() {
        let (world, _, arrivals) = build(every(10).with_skip_first(false));
        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(15))).unwrap();

        let times: Vec<_> = arrivals.borrow().iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![SimTime::ZERO, SimTime::from_secs(10)]);
    }

    #[test]
    fn test_stop_silences_pending_arrival() {
        let (world, handle, arrivals) = build(every(10));
        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(15))).unwrap();
        sim.run(RunStrategy::BySpecificEvent(handle.stop())).unwrap();
        sim.run(RunStrategy::ByTime(SimTime::from_secs(60))).unwrap();

        assert_eq!(arrivals.borrow().len(), 1);
        assert!(!sim.sandbox(handle).unwrap().is_active());
    }

    #[test]
    fn test_restart_does_not_double_arrivals() {
        let (world, handle, arrivals) = build(every(10));
        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(15))).unwrap();
        // arrival pending at 20s from the first activation
        sim.run(RunStrategy::BySpecificEvent(handle.stop())).unwrap();
        sim.run(RunStrategy::BySpecificEvent(handle.start())).unwrap();
        sim.run(RunStrategy::ByTime(SimTime::from_secs(50))).unwrap();

        let times: Vec<_> = arrivals.borrow().iter().map(|(t, _)| t.as_secs_f64()).collect();
        assert_eq!(times, vec![10.0, 25.0, 35.0, 45.0]);
        assert_eq!(sim.sandbox(handle).unwrap().count(), 3);
    }

    #[test]
    fn test_start_twice_is_noop() {
        let (mut world, handle, arrivals) = build(every(10));
        world.add_initial_event(handle.start());
        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(25))).unwrap();
        assert_eq!(arrivals.borrow().len(), 2);
    }

    #[test]
    fn test_same_seed_same_arrivals() {
        let run = || {
            let variate = DistributionSpec::exponential(5.0).build().unwrap();
            let config = GeneratorConfig::new(|_: &mut SimRng| Ok(Duration::ZERO), |n, _: &mut SimRng| n)
                .with_inter_arrival(crate::components::inter_arrival(variate, TimeUnit::Minutes));
            let (world, _, arrivals) = build(config);
            let mut sim = Simulator::new(world);
            sim.run(RunStrategy::ByTime(SimTime::from_hours(5.0))).unwrap();
            let times: Vec<_> = arrivals.borrow().iter().map(|(t, _)| *t).collect();
            times
        };
        let first = run();
        assert!(!first.is_empty());
        assert_eq!(first, run());
    }

    #[test]
    fn test_warm_up_resets_count() {
        let (world, handle, _) = build(every(10));
        let mut sim = Simulator::new(world);
        sim.warm_up(Duration::from_secs(25)).unwrap();
        let generator = sim.sandbox(handle).unwrap();
        assert_eq!(generator.count(), 0);
        assert_eq!(generator.start_time(), Some(SimTime::from_secs(25)));
        assert!(generator.is_active());
    }
}
