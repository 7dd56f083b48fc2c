//! Building blocks shared by the scenarios: jobs, admission control and the
//! wiring between generator, queue and servers.

use crate::config::ScenarioConfig;
use crate::error::{RunResult, ScenarioError};
use eventide_core::components::{inter_arrival, service_time};
use eventide_core::{
    Event, Generator, GeneratorConfig, LoadQueue, QueueConfig, Sandbox, SandboxCore, SandboxHandle,
    Server, ServerConfig, SimTime, TrackedLoad, TwoStageConfig, TwoStageServer, World,
};
use eventide_env::rng::derive_seed;
use eventide_env::SimRng;
use std::rc::Rc;
use std::time::Duration;
use tracing::trace;

/// Milestone logged when a job enters the waiting room.
pub const ARRIVE: &str = "Arrive";

/// Milestone logged when a job leaves its last server.
pub const DEPART: &str = "Depart";

/// One customer flowing through a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    pub id: u64,

    /// Timestamp log of this job
    pub ticket: SandboxHandle<TrackedLoad>,
}

/// Counts arrivals and turns away those that find the waiting room full.
/// Admitted arrivals get a ticket that follows them through the model.
pub struct Admission {
    core: SandboxCore,
    offered: u64,
    blocked: u64,

    /// Tickets issued since the last warm-up
    tickets: Vec<SandboxHandle<TrackedLoad>>,
}

impl Admission {
    pub fn new(seed: u64) -> Self {
        Self {
            core: SandboxCore::new("Admission", seed),
            offered: 0,
            blocked: 0,
            tickets: Vec::new(),
        }
    }

    pub fn tickets(&self) -> &[SandboxHandle<TrackedLoad>] {
        &self.tickets
    }

    pub fn offered(&self) -> u64 {
        self.offered
    }

    pub fn blocked(&self) -> u64 {
        self.blocked
    }

    /// Share of offered arrivals turned away.
    pub fn blocking_probability(&self) -> f64 {
        if self.offered == 0 {
            0.0
        } else {
            self.blocked as f64 / self.offered as f64
        }
    }
}

impl Sandbox for Admission {
    fn core(&self) -> &SandboxCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SandboxCore {
        &mut self.core
    }

    fn warmed_up(&mut self, _clock: SimTime) {
        self.offered = 0;
        self.blocked = 0;
        self.tickets.clear();
    }
}

/// Tickets arrival `id` and enqueues it if the queue has room, otherwise
/// records a block.
pub fn admit(admission: SandboxHandle<Admission>, queue: SandboxHandle<LoadQueue<Job>>, id: u64) -> Event {
    Event::new("Admit", move |ctx| {
        let room = ctx.sandbox(queue)?.vacancy() > 0;
        let gate = ctx.sandbox_mut(admission)?;
        gate.offered += 1;
        if !room {
            gate.blocked += 1;
            trace!(clock = %ctx.clock(), job = id, "Arrival turned away");
            return Ok(());
        }
        let seed = derive_seed(gate.core().seed(), id);
        let ticket = ctx.world_mut().insert(TrackedLoad::new(seed));
        ctx.sandbox_mut(admission)?.tickets.push(ticket);
        ctx.execute(ticket.log(ARRIVE))?;
        ctx.execute(queue.enqueue(Job { id, ticket }))
    })
    .owned_by(admission.id())
}

/// Mean hours between arrival and departure over the tickets issued since
/// warm-up that have departed, with how many that is.
pub fn average_sojourn_hours(world: &World, admission: SandboxHandle<Admission>) -> RunResult<(f64, u64)> {
    let mut total = 0.0;
    let mut departed = 0u64;
    for ticket in world.get(admission)?.tickets() {
        if let Some(span) = world.get(*ticket)?.span(ARRIVE, DEPART) {
            total += eventide_core::time::hours(span);
            departed += 1;
        }
    }
    let average = if departed == 0 { 0.0 } else { total / departed as f64 };
    Ok((average, departed))
}

/// Arrival side of every model: generator, admission, queue.
#[derive(Debug, Clone, Copy)]
pub struct Line {
    pub generator: SandboxHandle<Generator<u64>>,
    pub admission: SandboxHandle<Admission>,
    pub queue: SandboxHandle<LoadQueue<Job>>,
}

impl Line {
    /// Registers the arrival side and starts the generator at time zero.
    pub fn build(world: &mut World, config: &ScenarioConfig, queue_capacity: usize, seed: u64) -> RunResult<Self> {
        let generator_config = GeneratorConfig {
            inter_arrival: inter_arrival(config.inter_arrival.build()?, config.time_unit),
            create: Rc::new(|n: u64, _: &mut SimRng| n),
            skip_first: true,
        };
        let mut generator = Generator::new(generator_config, derive_seed(seed, 1)).with_tag("Arrivals");
        let admission = world.insert(Admission::new(derive_seed(seed, 2)));
        let queue = world.insert(
            LoadQueue::new(QueueConfig::default().with_capacity(queue_capacity), derive_seed(seed, 3))
                .with_tag("Queue"),
        );
        generator.on_arrive(move |id| admit(admission, queue, id));
        let generator = world.insert(generator);
        world.add_initial_event(generator.start());
        Ok(Self {
            generator,
            admission,
            queue,
        })
    }

    /// Feeds a pool of `servers` identical servers from the queue.
    pub fn serve(
        &self,
        world: &mut World,
        config: &ScenarioConfig,
        servers: usize,
        seed: u64,
    ) -> RunResult<SandboxHandle<Server<Job>>> {
        let server_config = ServerConfig {
            capacity: servers,
            service_time: service_time(config.service.build()?, config.time_unit),
        };
        let server = world.insert(Server::new(server_config, derive_seed(seed, 4)).with_tag("Servers"));
        let queue = self.queue;
        world.get_mut(server)?.on_state_change(move || {
            Event::new("Pull", move |ctx| {
                let vacant = ctx.sandbox(server)?.vacancy() > 0;
                ctx.execute(queue.update_to_dequeue(vacant))
            })
        });
        world.get_mut(queue)?.on_dequeue(move |job| server.start(job));
        world.get_mut(server)?.on_depart(|job: Job| job.ticket.log(DEPART));
        Ok(server)
    }

    /// Feeds a two-stage server of capacity `servers` from the queue.
    pub fn serve_two_stage(
        &self,
        world: &mut World,
        config: &ScenarioConfig,
        servers: usize,
        seed: u64,
    ) -> RunResult<SandboxHandle<TwoStageServer<Job>>> {
        let stages = TwoStageConfig::new(
            service_time(config.service.build()?, config.time_unit),
            service_time(config.restoring.build()?, config.time_unit),
        )
        .with_capacity(servers);
        let station = TwoStageServer::build(world, stages, derive_seed(seed, 5), "Station")?;
        let queue = self.queue;
        world.get_mut(station)?.on_state_change(move || {
            Event::new("Pull", move |ctx| {
                let vacant = station.vacancy(ctx.world())? > 0;
                ctx.execute(queue.update_to_dequeue(vacant))
            })
        });
        world.get_mut(queue)?.on_dequeue(move |job| station.start(job));
        station.on_depart(world, |job: Job| job.ticket.log(DEPART))?;
        Ok(station)
    }
}

/// Converts hours into a delay.
pub fn hours_to_duration(hours: f64) -> RunResult<Duration> {
    Duration::try_from_secs_f64(hours * eventide_core::time::SECS_PER_HOUR)
        .map_err(|_| ScenarioError::Config(format!("{} hours is not a valid span", hours)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use eventide_core::{RunStrategy, Simulator};
    use eventide_env::DistributionSpec;

    #[test]
    fn test_full_waiting_room_turns_arrivals_away() {
        let mut world = World::new();
        let admission = world.insert(Admission::new(1));
        let queue = world.insert(LoadQueue::<Job>::new(QueueConfig::default().with_capacity(1), 2));
        world.add_initial_event(queue.update_to_dequeue(false));
        for id in 0..3 {
            world.add_initial_event(admit(admission, queue, id));
        }

        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByEventCount(4)).unwrap();
        let gate = sim.sandbox(admission).unwrap();
        assert_eq!((gate.offered(), gate.blocked()), (3, 2));
        // only the admitted arrival got a ticket
        assert_eq!(gate.tickets().len(), 1);
        assert!((gate.blocking_probability() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_line_delivers_jobs_to_servers() {
        let config = ScenarioConfig::default();
        let mut world = World::new();
        let line = Line::build(&mut world, &config, usize::MAX, 7).unwrap();
        let server = line.serve(&mut world, &config, 1, 7).unwrap();

        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_hours(10.0))).unwrap();
        let arrived = sim.sandbox(line.generator).unwrap().count();
        let served = sim.sandbox(server).unwrap().completed();
        let waiting = sim.sandbox(line.queue).unwrap().occupancy() as u64;
        let in_service = sim.sandbox(server).unwrap().occupancy() as u64;
        assert!(arrived > 0);
        assert_eq!(arrived, served + waiting + in_service);
    }

    #[test]
    fn test_tickets_measure_time_in_system() {
        let config = ScenarioConfig {
            inter_arrival: DistributionSpec::Constant { value: 5.0 },
            service: DistributionSpec::Constant { value: 4.0 },
            ..ScenarioConfig::default()
        };
        let mut world = World::new();
        let line = Line::build(&mut world, &config, usize::MAX, 11).unwrap();
        line.serve(&mut world, &config, 1, 11).unwrap();

        let mut sim = Simulator::new(world);
        sim.run(RunStrategy::ByTime(SimTime::from_hours(1.0))).unwrap();

        // arrivals at 5, 10, ..., 60 minutes; the last is still in service
        let (average, departed) = average_sojourn_hours(sim.world(), line.admission).unwrap();
        assert_eq!(departed, 11);
        assert_relative_eq!(average, 4.0 / 60.0, epsilon = 1e-9);

        let first = sim.sandbox(line.admission).unwrap().tickets()[0];
        let ticket = sim.sandbox(first).unwrap();
        assert_eq!(ticket.first_stamp(|l| l == ARRIVE), Some(SimTime::from_secs(300)));
        assert_eq!(ticket.last_stamp(|l| l == DEPART), Some(SimTime::from_secs(540)));
    }

    #[test]
    fn test_warm_up_drops_earlier_tickets() {
        let config = ScenarioConfig::default();
        let mut world = World::new();
        let line = Line::build(&mut world, &config, usize::MAX, 5).unwrap();
        line.serve(&mut world, &config, 1, 5).unwrap();

        let mut sim = Simulator::new(world);
        sim.warm_up(Duration::from_secs(3_600)).unwrap();
        assert!(sim.sandbox(line.admission).unwrap().tickets().is_empty());
        sim.run(RunStrategy::ByTime(SimTime::from_hours(3.0))).unwrap();
        let (average, departed) = average_sojourn_hours(sim.world(), line.admission).unwrap();
        assert!(departed > 0);
        assert!(average > 0.0);
    }

    #[test]
    fn test_hours_to_duration_rejects_negative() {
        assert_eq!(hours_to_duration(1.5).unwrap(), Duration::from_secs(5_400));
        assert!(hours_to_duration(-1.0).is_err());
    }
}
