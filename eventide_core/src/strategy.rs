//! Run strategies: how far a call to [`Simulator::run`] advances.

use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::simulator::Simulator;
use crate::time::SimTime;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// User-supplied drive policy.
pub type CustomRun = Box<dyn FnOnce(&mut Simulator) -> SimResult<bool>>;

/// One-shot policy consumed by [`Simulator::run`].
///
/// Every variant returns `true` when its objective was met and `false` when
/// the simulation ran dry first.
pub enum RunStrategy {
    /// Execute up to `n` head events.
    ByEventCount(u64),

    /// Execute every event up to and including `t`, then set the clock to `t`.
    ByTime(SimTime),

    /// `ByTime(clock + d)`, with the target fixed when the run starts.
    ByDuration(Duration),

    /// Execute this event now, unless it belongs to another simulator.
    BySpecificEvent(Event),

    /// Advance by the wall time elapsed since the previous call, scaled by
    /// the factor. The first call only records the wall anchor.
    BySpeed(f64),

    /// Arbitrary policy.
    Custom(CustomRun),
}

impl RunStrategy {
    pub fn custom<F>(policy: F) -> Self
    where
        F: FnOnce(&mut Simulator) -> SimResult<bool> + 'static,
    {
        RunStrategy::Custom(Box::new(policy))
    }

    pub(crate) fn run(self, sim: &mut Simulator) -> SimResult<bool> {
        match self {
            RunStrategy::ByEventCount(n) => run_by_event_count(sim, n),
            RunStrategy::ByTime(target) => run_by_time(sim, target),
            RunStrategy::ByDuration(span) => {
                let target = sim.clock() + span;
                run_by_time(sim, target)
            }
            RunStrategy::BySpecificEvent(event) => run_by_specific_event(sim, event),
            RunStrategy::BySpeed(factor) => run_by_speed(sim, factor),
            RunStrategy::Custom(policy) => policy(sim),
        }
    }
}

impl fmt::Debug for RunStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStrategy::ByEventCount(n) => f.debug_tuple("ByEventCount").field(n).finish(),
            RunStrategy::ByTime(t) => f.debug_tuple("ByTime").field(t).finish(),
            RunStrategy::ByDuration(d) => f.debug_tuple("ByDuration").field(d).finish(),
            RunStrategy::BySpecificEvent(e) => f.debug_tuple("BySpecificEvent").field(e).finish(),
            RunStrategy::BySpeed(factor) => f.debug_tuple("BySpeed").field(factor).finish(),
            RunStrategy::Custom(_) => f.write_str("Custom"),
        }
    }
}

fn run_by_event_count(sim: &mut Simulator, n: u64) -> SimResult<bool> {
    for _ in 0..n {
        if !sim.execute_head_event()? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn run_by_time(sim: &mut Simulator, target: SimTime) -> SimResult<bool> {
    if target < sim.clock() {
        return Err(SimError::TargetInPast {
            target,
            clock: sim.clock(),
        });
    }
    loop {
        match sim.head_event_time() {
            None => return Ok(false),
            Some(head) if head <= target => {
                sim.execute_head_event()?;
            }
            Some(_) => {
                sim.advance_clock_to(target)?;
                return Ok(true);
            }
        }
    }
}

fn run_by_specific_event(sim: &mut Simulator, event: Event) -> SimResult<bool> {
    if let Some(bound) = event.simulator() {
        if bound != sim.id() {
            debug!(event = %event, bound = %bound, "Event belongs to another simulator");
            return Ok(false);
        }
    }
    sim.execute(event)?;
    Ok(true)
}

fn run_by_speed(sim: &mut Simulator, factor: f64) -> SimResult<bool> {
    if !(factor.is_finite() && factor >= 0.0) {
        return Err(SimError::invalid(format!("speed factor {} must be finite and non-negative", factor)));
    }
    let now = sim.wall_now();
    let Some(previous) = sim.replace_wall_anchor(now) else {
        return Ok(true);
    };
    let elapsed = now.saturating_sub(previous).as_secs_f64() * factor;
    let delta = Duration::try_from_secs_f64(elapsed)
        .map_err(|_| SimError::invalid(format!("speed step of {}s is not representable", elapsed)))?;
    let target = sim.clock() + delta;
    run_by_time(sim, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{Sandbox, SandboxCore, SandboxHandle, World};
    use eventide_env::ManualClock;

    struct Tally {
        core: SandboxCore,
        hits: Vec<SimTime>,
    }

    impl Sandbox for Tally {
        fn core(&self) -> &SandboxCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut SandboxCore {
            &mut self.core
        }

        fn warmed_up(&mut self, _clock: SimTime) {}
    }

    fn hit(tally: SandboxHandle<Tally>) -> Event {
        Event::new("hit", move |ctx| {
            let clock = ctx.clock();
            ctx.sandbox_mut(tally)?.hits.push(clock);
            Ok(())
        })
    }

    fn setup(times: &[u64]) -> (Simulator, SandboxHandle<Tally>) {
        let mut world = World::new();
        let tally = world.insert(Tally {
            core: SandboxCore::new("Tally", 0),
            hits: Vec::new(),
        });
        let mut sim = Simulator::new(world);
        for t in times {
            sim.schedule(hit(tally), SimTime::from_secs(*t)).unwrap();
        }
        (sim, tally)
    }

    fn hits(sim: &Simulator, tally: SandboxHandle<Tally>) -> usize {
        sim.sandbox(tally).unwrap().hits.len()
    }

    #[test]
    fn test_by_event_count() {
        let (mut sim, tally) = setup(&[1, 2, 3]);
        assert!(sim.run(RunStrategy::ByEventCount(2)).unwrap());
        assert_eq!(hits(&sim, tally), 2);
        assert!(!sim.run(RunStrategy::ByEventCount(5)).unwrap());
        assert_eq!(hits(&sim, tally), 3);
    }

    #[test]
    fn test_by_time_boundary_is_inclusive() {
        let (mut sim, tally) = setup(&[5, 10, 15]);
        assert!(sim.run(RunStrategy::ByTime(SimTime::from_secs(10))).unwrap());
        assert_eq!(hits(&sim, tally), 2);
        assert_eq!(sim.clock(), SimTime::from_secs(10));
        assert_eq!(sim.head_event_time(), Some(SimTime::from_secs(15)));
    }

    #[test]
    fn test_by_time_moves_clock_across_idle_gap() {
        let (mut sim, _) = setup(&[100]);
        assert!(sim.run(RunStrategy::ByTime(SimTime::from_secs(40))).unwrap());
        assert_eq!(sim.clock(), SimTime::from_secs(40));
    }

    #[test]
    fn test_by_time_reports_running_dry() {
        let (mut sim, tally) = setup(&[5]);
        assert!(!sim.run(RunStrategy::ByTime(SimTime::from_secs(50))).unwrap());
        assert_eq!(hits(&sim, tally), 1);
        assert_eq!(sim.clock(), SimTime::from_secs(5));
    }

    #[test]
    fn test_by_time_rejects_past_target() {
        let (mut sim, _) = setup(&[5, 20]);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(10))).unwrap();
        let err = sim.run(RunStrategy::ByTime(SimTime::from_secs(3))).unwrap_err();
        assert!(matches!(err, SimError::TargetInPast { .. }));
        assert_eq!(sim.clock(), SimTime::from_secs(10));
    }

    #[test]
    fn test_by_duration_is_relative() {
        let (mut sim, tally) = setup(&[5, 12, 30]);
        sim.run(RunStrategy::ByTime(SimTime::from_secs(6))).unwrap();
        assert!(sim.run(RunStrategy::ByDuration(Duration::from_secs(6))).unwrap());
        assert_eq!(sim.clock(), SimTime::from_secs(12));
        assert_eq!(hits(&sim, tally), 2);
    }

    #[test]
    fn test_by_specific_event() {
        let (mut sim, tally) = setup(&[]);
        assert!(sim.run(RunStrategy::BySpecificEvent(hit(tally))).unwrap());
        assert_eq!(hits(&sim, tally), 1);
        assert_eq!(sim.clock(), SimTime::ZERO);
    }

    #[test]
    fn test_custom_strategy() {
        let (mut sim, tally) = setup(&[1, 2, 3]);
        let reached = sim
            .run(RunStrategy::custom(|s| {
                s.execute_head_event()?;
                s.execute_head_event()
            }))
            .unwrap();
        assert!(reached);
        assert_eq!(hits(&sim, tally), 2);
    }

    #[test]
    fn test_by_specific_event_ignores_foreign_binding() {
        let (mut sim, tally) = setup(&[]);
        let other = Simulator::new(World::new());
        let mut foreign = hit(tally);
        foreign.simulator = Some(other.id());
        assert!(!sim.run(RunStrategy::BySpecificEvent(foreign)).unwrap());
        assert_eq!(hits(&sim, tally), 0);
        assert!(!other.has_future_events());
    }

    #[test]
    fn test_by_speed_scales_wall_time() {
        let wall = ManualClock::new();
        let (sim, tally) = setup(&[30, 90, 200]);
        let mut sim = sim.with_wall_clock(wall.clone());

        // First call only anchors
        assert!(sim.run(RunStrategy::BySpeed(60.0)).unwrap());
        assert_eq!(sim.clock(), SimTime::ZERO);

        wall.advance(Duration::from_secs(1));
        assert!(sim.run(RunStrategy::BySpeed(60.0)).unwrap());
        assert_eq!(sim.clock(), SimTime::from_secs(60));
        assert_eq!(hits(&sim, tally), 1);

        wall.advance(Duration::from_millis(500));
        assert!(sim.run(RunStrategy::BySpeed(120.0)).unwrap());
        assert_eq!(sim.clock(), SimTime::from_secs(120));
        assert_eq!(hits(&sim, tally), 2);
    }

    #[test]
    fn test_by_speed_rejects_bad_factor() {
        let (mut sim, _) = setup(&[]);
        assert!(sim.run(RunStrategy::BySpeed(-1.0)).is_err());
        assert!(sim.run(RunStrategy::BySpeed(f64::NAN)).is_err());
    }
}
