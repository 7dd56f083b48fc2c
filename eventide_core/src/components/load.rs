//! Tracked load: a sandbox that records when it passed each milestone.
//!
//! Its handle is itself a [`Load`](super::Load), so it can flow through
//! queues and servers while subscribers stamp it with `load.log("Depart")`.
//! Time in system is then the span between two milestones.

use crate::error::SimResult;
use crate::event::Event;
use crate::sandbox::{Sandbox, SandboxCore, SandboxHandle};
use crate::simulator::EventContext;
use crate::time::SimTime;
use std::borrow::Cow;
use std::time::Duration;

/// A load carrying its own timestamp log.
#[derive(Debug)]
pub struct TrackedLoad {
    core: SandboxCore,

    /// Milestones in logging order
    stamps: Vec<(SimTime, Cow<'static, str>)>,
}

impl TrackedLoad {
    pub fn new(seed: u64) -> Self {
        Self {
            core: SandboxCore::new("Load", seed),
            stamps: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.core = self.core.with_tag(tag);
        self
    }

    pub fn stamps(&self) -> impl Iterator<Item = (SimTime, &str)> {
        self.stamps.iter().map(|(t, label)| (*t, label.as_ref()))
    }

    /// Time of the first milestone whose label satisfies `matches`.
    pub fn first_stamp(&self, matches: impl Fn(&str) -> bool) -> Option<SimTime> {
        self.stamps.iter().find(|(_, label)| matches(label)).map(|(t, _)| *t)
    }

    /// Time of the last milestone whose label satisfies `matches`.
    pub fn last_stamp(&self, matches: impl Fn(&str) -> bool) -> Option<SimTime> {
        self.stamps.iter().rev().find(|(_, label)| matches(label)).map(|(t, _)| *t)
    }

    /// Span from the earliest to the latest milestone; `None` before the
    /// first one.
    pub fn total_span(&self) -> Option<Duration> {
        let earliest = self.stamps.iter().map(|(t, _)| *t).min()?;
        let latest = self.stamps.iter().map(|(t, _)| *t).max()?;
        Some(latest.saturating_since(earliest))
    }

    /// Span from the first `from` milestone to the last `to` milestone.
    pub fn span(&self, from: &str, to: &str) -> Option<Duration> {
        let start = self.first_stamp(|label| label == from)?;
        let end = self.last_stamp(|label| label == to)?;
        end.checked_since(start)
    }

    fn handle_log(
        ctx: &mut EventContext<'_>,
        handle: SandboxHandle<Self>,
        label: Cow<'static, str>,
    ) -> SimResult<()> {
        let clock = ctx.clock();
        ctx.sandbox_mut(handle)?.stamps.push((clock, label));
        Ok(())
    }
}

impl Sandbox for TrackedLoad {
    fn core(&self) -> &SandboxCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SandboxCore {
        &mut self.core
    }

    /// Stamps describe the load's own history and survive warm-up.
    fn warmed_up(&mut self, _clock: SimTime) {}
}

impl SandboxHandle<TrackedLoad> {
    /// Records `label` at the current clock.
    pub fn log(self, label: impl Into<Cow<'static, str>>) -> Event {
        let label = label.into();
        Event::new("Log", move |ctx| TrackedLoad::handle_log(ctx, self, label)).owned_by(self.id())
    }
}
