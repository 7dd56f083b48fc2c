//! The simulation kernel.
//!
//! A [`Simulator`] owns the virtual clock, the future event list and the
//! [`World`] of sandboxes. Time advances only through
//! [`Simulator::execute_head_event`] (or a run strategy landing on its
//! target); immediate executions nest inside the current instant.
//!
//! # Example
//!
//! ```ignore
//! let mut world = World::new();
//! let server = world.insert(Server::new(config, 7));
//! world.add_initial_event(server.start(job));
//!
//! let mut sim = Simulator::new(world);
//! sim.warm_up(Duration::from_secs(3600))?;
//! sim.run(RunStrategy::ByDuration(Duration::from_secs(8 * 3600)))?;
//! ```

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventBody};
use crate::fel::FutureEventList;
use crate::ids::{SandboxId, SimulatorId};
use crate::sandbox::{Sandbox, SandboxHandle, World};
use crate::strategy::RunStrategy;
use crate::time::SimTime;
use eventide_env::{SystemClock, WallClock};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Kernel configuration.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Deepest allowed nesting of immediate executions
    pub max_cascade_depth: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: 256,
        }
    }
}

impl SimulatorConfig {
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }
}

/// Discrete-event simulation kernel.
pub struct Simulator {
    /// Identity checked against events' bindings
    id: SimulatorId,

    config: SimulatorConfig,

    /// Virtual clock, never decreases
    clock: SimTime,

    /// Pending events in (time, index) order
    fel: FutureEventList,

    /// Every sandbox of the model
    world: World,

    /// Current nesting of immediate executions
    depth: usize,

    /// Number of events invoked so far
    executed: u64,

    /// Real-time source for the speed-throttled strategy
    wall_clock: Box<dyn WallClock>,

    /// Wall time of the previous speed-throttled run
    wall_anchor: Option<Duration>,
}

impl Simulator {
    /// Creates a simulator over `world` with default configuration.
    pub fn new(world: World) -> Self {
        Self::with_config(world, SimulatorConfig::default())
    }

    /// Creates a simulator and schedules every pending initial event at time
    /// zero, in registration order.
    pub fn with_config(mut world: World, config: SimulatorConfig) -> Self {
        let initial = world.take_initial_events();
        let mut sim = Self {
            id: SimulatorId::new(),
            config,
            clock: SimTime::ZERO,
            fel: FutureEventList::new(),
            world,
            depth: 0,
            executed: 0,
            wall_clock: Box::new(SystemClock::new()),
            wall_anchor: None,
        };
        for event in initial {
            sim.enqueue(event, SimTime::ZERO);
        }
        debug!(simulator = %sim.id, pending = sim.fel.len(), "Simulator created");
        sim
    }

    /// Replaces the wall clock used by [`RunStrategy::BySpeed`].
    pub fn with_wall_clock(mut self, clock: impl WallClock + 'static) -> Self {
        self.wall_clock = Box::new(clock);
        self.wall_anchor = None;
        self
    }

    pub fn id(&self) -> SimulatorId {
        self.id
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn clock(&self) -> SimTime {
        self.clock
    }

    /// Time of the earliest pending event.
    pub fn head_event_time(&self) -> Option<SimTime> {
        self.fel.peek_time()
    }

    pub fn has_future_events(&self) -> bool {
        !self.fel.is_empty()
    }

    pub fn pending_events(&self) -> usize {
        self.fel.len()
    }

    /// Events invoked so far, immediate executions included.
    pub fn events_executed(&self) -> u64 {
        self.executed
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn sandbox<T: Sandbox>(&self, handle: SandboxHandle<T>) -> SimResult<&T> {
        self.world.get(handle)
    }

    pub fn sandbox_mut<T: Sandbox>(&mut self, handle: SandboxHandle<T>) -> SimResult<&mut T> {
        self.world.get_mut(handle)
    }

    /// Registers a sandbox mid-run; its initial events are scheduled at the
    /// current clock.
    pub fn insert<T: Sandbox>(&mut self, sandbox: T) -> SandboxHandle<T> {
        let handle = self.world.insert(sandbox);
        for event in self.world.take_initial_events() {
            self.enqueue(event, self.clock);
        }
        handle
    }

    /// Places `event` in the future event list at `time`.
    pub fn schedule(&mut self, mut event: Event, time: SimTime) -> SimResult<()> {
        if let Some(bound) = event.simulator {
            if bound != self.id {
                return Err(SimError::ForeignEvent {
                    event: event.to_string(),
                    bound,
                    current: self.id,
                });
            }
        }
        if time < self.clock {
            return Err(SimError::SchedulingInPast {
                event: event.to_string(),
                requested: time,
                clock: self.clock,
            });
        }
        event.simulator = Some(self.id);
        self.enqueue(event, time);
        Ok(())
    }

    /// Places `event` in the future event list `delay` after the clock.
    pub fn schedule_after(&mut self, event: Event, delay: Duration) -> SimResult<()> {
        let time = self.clock + delay;
        self.schedule(event, time)
    }

    fn enqueue(&mut self, mut event: Event, time: SimTime) {
        event.simulator.get_or_insert(self.id);
        event.scheduled_at = Some(time);
        trace!(clock = %self.clock, at = %time, event = %event, "Scheduled");
        self.fel.push(time, event.index, event);
    }

    /// Runs `event` now, without touching the clock or the future list.
    /// Rebinds the event to this simulator.
    pub fn execute(&mut self, mut event: Event) -> SimResult<()> {
        event.simulator = Some(self.id);
        self.invoke(event)
    }

    /// Pops the earliest pending event, moves the clock to its time and runs
    /// it. Returns `false` when nothing is pending.
    pub fn execute_head_event(&mut self) -> SimResult<bool> {
        let Some(event) = self.fel.pop_earliest() else {
            return Ok(false);
        };
        if let Some(time) = event.scheduled_at {
            self.clock = self.clock.max(time);
        }
        self.invoke(event)?;
        Ok(true)
    }

    /// Advances the simulation under `strategy`. Returns whether its
    /// objective was reached.
    pub fn run(&mut self, strategy: RunStrategy) -> SimResult<bool> {
        strategy.run(self)
    }

    /// Runs for `period`, then tells every sandbox the warm-up is over.
    pub fn warm_up(&mut self, period: Duration) -> SimResult<bool> {
        let reached = self.run(RunStrategy::ByDuration(period))?;
        self.world.warm_up_all(self.clock);
        info!(clock = %self.clock, sandboxes = self.world.len(), "Warm-up complete");
        Ok(reached)
    }

    /// Moves the clock forward to `target` without running anything.
    pub(crate) fn advance_clock_to(&mut self, target: SimTime) -> SimResult<()> {
        if target < self.clock {
            return Err(SimError::TargetInPast {
                target,
                clock: self.clock,
            });
        }
        self.clock = target;
        Ok(())
    }

    pub(crate) fn wall_now(&self) -> Duration {
        self.wall_clock.now()
    }

    /// Swaps in a new wall anchor, returning the previous one.
    pub(crate) fn replace_wall_anchor(&mut self, now: Duration) -> Option<Duration> {
        self.wall_anchor.replace(now)
    }

    fn invoke(&mut self, event: Event) -> SimResult<()> {
        if self.depth >= self.config.max_cascade_depth {
            return Err(SimError::CascadeOverflow {
                limit: self.config.max_cascade_depth,
                event: event.to_string(),
            });
        }
        trace!(clock = %self.clock, depth = self.depth, event = %event, "Invoke");
        self.depth += 1;
        self.executed += 1;
        let owner = event.owner;
        let result = match event.body {
            EventBody::Action(action) => {
                let mut ctx = EventContext { sim: &mut *self, owner };
                action(&mut ctx)
            }
            EventBody::Batch(events) => {
                let mut ctx = EventContext { sim: &mut *self, owner };
                ctx.execute_all(events)
            }
        };
        self.depth -= 1;
        result
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("id", &self.id)
            .field("clock", &self.clock)
            .field("pending", &self.fel.len())
            .field("executed", &self.executed)
            .field("world", &self.world)
            .finish()
    }
}

/// What an event sees while it runs: the simulator, plus the sandbox that
/// owns the running event.
///
/// Events created and scheduled or executed from here inherit that owner
/// unless they already have one.
pub struct EventContext<'a> {
    sim: &'a mut Simulator,
    owner: Option<SandboxId>,
}

impl EventContext<'_> {
    pub fn clock(&self) -> SimTime {
        self.sim.clock
    }

    pub fn simulator_id(&self) -> SimulatorId {
        self.sim.id
    }

    /// Sandbox owning the running event.
    pub fn owner(&self) -> Option<SandboxId> {
        self.owner
    }

    pub fn world(&self) -> &World {
        &self.sim.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.sim.world
    }

    pub fn sandbox<T: Sandbox>(&self, handle: SandboxHandle<T>) -> SimResult<&T> {
        self.sim.world.get(handle)
    }

    pub fn sandbox_mut<T: Sandbox>(&mut self, handle: SandboxHandle<T>) -> SimResult<&mut T> {
        self.sim.world.get_mut(handle)
    }

    pub fn schedule_at(&mut self, mut event: Event, time: SimTime) -> SimResult<()> {
        event.induce(self.owner);
        self.sim.schedule(event, time)
    }

    pub fn schedule_after(&mut self, mut event: Event, delay: Duration) -> SimResult<()> {
        event.induce(self.owner);
        self.sim.schedule_after(event, delay)
    }

    /// Schedules at the current instant, behind every event already pending
    /// for it.
    pub fn schedule_now(&mut self, event: Event) -> SimResult<()> {
        self.schedule_after(event, Duration::ZERO)
    }

    /// Runs `event` immediately, nested inside the current one.
    pub fn execute(&mut self, mut event: Event) -> SimResult<()> {
        event.induce(self.owner);
        self.sim.execute(event)
    }

    /// Runs each event immediately, in order, stopping at the first error.
    pub fn execute_all(&mut self, events: impl IntoIterator<Item = Event>) -> SimResult<()> {
        events.into_iter().try_for_each(|event| self.execute(event))
    }

    /// Emits a diagnostic stamped with the clock and the owner's label.
    pub fn log(&self, message: impl fmt::Display) {
        let sandbox = self
            .owner
            .and_then(|id| self.sim.world.label(id))
            .unwrap_or_else(|| "-".to_string());
        info!(target: "eventide::sandbox", clock = %self.sim.clock, sandbox = %sandbox, "{}", message);
    }
}
