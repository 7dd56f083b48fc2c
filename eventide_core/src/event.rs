//! Events: the unit of behaviour in a simulation.
//!
//! An [`Event`] wraps a one-shot action run against an [`EventContext`].
//! Its index is stamped at construction by the current
//! [`EventIssuer`](crate::ids::EventIssuer); the scheduled time, owning
//! sandbox and bound simulator are filled in as it travels through the
//! simulator.
//!
//! # Ordering
//!
//! Scheduled events form a total order: time ascending, then index
//! ascending, so same-instant events run in the order they were constructed.

use crate::error::{SimError, SimResult};
use crate::ids::{EventIndex, EventIssuer, SandboxId, SimulatorId};
use crate::simulator::EventContext;
use crate::time::SimTime;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// Boxed one-shot action of an event.
pub type EventAction = Box<dyn FnOnce(&mut EventContext<'_>) -> SimResult<()>>;

pub(crate) enum EventBody {
    Action(EventAction),
    /// Inner events executed immediately, in order, when the batch runs.
    Batch(Vec<Event>),
}

/// A unit of simulated behaviour.
///
/// Consumed when invoked, so it runs at most once.
pub struct Event {
    pub(crate) label: Cow<'static, str>,

    pub(crate) index: EventIndex,

    pub(crate) scheduled_at: Option<SimTime>,

    pub(crate) owner: Option<SandboxId>,

    pub(crate) simulator: Option<SimulatorId>,

    pub(crate) body: EventBody,
}

impl Event {
    /// Creates an event running `action` when invoked.
    pub fn new<F>(label: impl Into<Cow<'static, str>>, action: F) -> Self
    where
        F: FnOnce(&mut EventContext<'_>) -> SimResult<()> + 'static,
    {
        Self::with_body(label.into(), EventBody::Action(Box::new(action)))
    }

    /// An event that does nothing. Useful as a time marker.
    pub fn noop(label: impl Into<Cow<'static, str>>) -> Self {
        Self::new(label, |_| Ok(()))
    }

    /// Wraps several events into one. Invoking the batch executes each inner
    /// event immediately, in order; scheduling it schedules them as a unit.
    pub fn batch(events: impl IntoIterator<Item = Event>) -> Self {
        Self::with_body(Cow::Borrowed("Batch"), EventBody::Batch(events.into_iter().collect()))
    }

    fn with_body(label: Cow<'static, str>, body: EventBody) -> Self {
        Self {
            label,
            index: EventIssuer::issue(),
            scheduled_at: None,
            owner: None,
            simulator: None,
            body,
        }
    }

    /// Sets the owning sandbox unless one is already set.
    pub fn owned_by(mut self, owner: SandboxId) -> Self {
        self.induce(Some(owner));
        self
    }

    /// Inherits `owner` from a parent event; first write wins.
    pub fn induce(&mut self, owner: Option<SandboxId>) {
        if self.owner.is_none() {
            self.owner = owner;
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index(&self) -> EventIndex {
        self.index
    }

    pub fn scheduled_at(&self) -> Option<SimTime> {
        self.scheduled_at
    }

    pub fn owner(&self) -> Option<SandboxId> {
        self.owner
    }

    pub fn simulator(&self) -> Option<SimulatorId> {
        self.simulator
    }

    pub fn is_batch(&self) -> bool {
        matches!(self.body, EventBody::Batch(_))
    }

    /// Splits a batch into its inner events (each inheriting the batch's
    /// owner); any other event comes back alone.
    pub fn unpack(self) -> Vec<Event> {
        match self.body {
            EventBody::Batch(events) => {
                let owner = self.owner;
                events
                    .into_iter()
                    .map(|mut e| {
                        e.induce(owner);
                        e
                    })
                    .collect()
            }
            body => vec![Event { body, ..self }],
        }
    }

    /// Position in the future event list.
    pub fn order_key(&self) -> SimResult<(SimTime, EventIndex)> {
        match self.scheduled_at {
            Some(time) => Ok((time, self.index)),
            None => Err(SimError::UnboundEvent(self.to_string())),
        }
    }

    /// Compares two scheduled events; unscheduled events cannot be ordered.
    pub fn cmp_order(&self, other: &Event) -> SimResult<Ordering> {
        Ok(self.order_key()?.cmp(&other.order_key()?))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner {
            Some(owner) => write!(f, "{}@{}", self.label, owner)?,
            None => write!(f, "{}", self.label)?,
        }
        write!(f, "({})", self.index)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("label", &self.label)
            .field("index", &self.index)
            .field("scheduled_at", &self.scheduled_at)
            .field("owner", &self.owner)
            .field("simulator", &self.simulator)
            .field("batch", &self.is_batch())
            .finish()
    }
}
