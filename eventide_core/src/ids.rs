//! Identifiers for events, sandboxes and simulators.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use uuid::Uuid;

/// Sequence number stamped on an event when it is constructed.
///
/// Breaks ties between events scheduled at the same instant: the event
/// constructed first runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventIndex(u64);

impl EventIndex {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// Identifier of a sandbox inside one [`World`](crate::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SandboxId(u64);

impl SandboxId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a simulator instance.
///
/// Uses UUID v4 so events bound to one simulator are recognisable by any
/// other without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulatorId(Uuid);

impl SimulatorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SimulatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SimulatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 chars are enough to tell instances apart in logs
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Strictly increasing counter handing out sandbox ids.
///
/// Each `World` owns one, so independent models never share ids.
#[derive(Debug, Clone, Default)]
pub struct IdIssuer {
    next: u64,
}

impl IdIssuer {
    /// Creates an issuer whose first id is 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    fn bump(&mut self) -> u64 {
        let id = self.next.max(1);
        self.next = id + 1;
        id
    }

    pub fn next_sandbox(&mut self) -> SandboxId {
        SandboxId(self.bump())
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.next.saturating_sub(1)
    }
}

thread_local! {
    static ENTERED: RefCell<Vec<EventIssuer>> = const { RefCell::new(Vec::new()) };
    static FALLBACK: EventIssuer = EventIssuer::new();
}

/// Issues event indexes in construction order.
///
/// [`Event::new`](crate::Event::new) draws from the issuer most recently
/// entered on the current thread, or from the thread's fallback issuer when
/// none is. Entering a fresh issuer around a run gives that run its own
/// sequence starting at 1:
///
/// ```ignore
/// let issuer = EventIssuer::new();
/// let _events = issuer.enter();
/// let mut world = World::new();
/// // build, simulate...
/// ```
#[derive(Debug, Clone)]
pub struct EventIssuer {
    next: Rc<Cell<u64>>,
}

impl EventIssuer {
    pub fn new() -> Self {
        Self {
            next: Rc::new(Cell::new(1)),
        }
    }

    pub fn next_event(&self) -> EventIndex {
        let id = self.next.get();
        self.next.set(id + 1);
        EventIndex(id)
    }

    /// Number of indexes issued so far.
    pub fn issued(&self) -> u64 {
        self.next.get() - 1
    }

    /// Makes this issuer the current one on this thread until the guard
    /// drops. Guards must drop in reverse order of entry.
    pub fn enter(&self) -> IssuerGuard {
        ENTERED.with(|entered| entered.borrow_mut().push(self.clone()));
        IssuerGuard { _local: PhantomData }
    }

    /// Next index from the current issuer.
    pub(crate) fn issue() -> EventIndex {
        ENTERED
            .with(|entered| entered.borrow().last().map(EventIssuer::next_event))
            .unwrap_or_else(|| FALLBACK.with(EventIssuer::next_event))
    }
}

impl Default for EventIssuer {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps an [`EventIssuer`] current; restores the previous one on drop.
#[must_use = "the issuer stops being current when the guard drops"]
pub struct IssuerGuard {
    _local: PhantomData<Rc<()>>,
}

impl Drop for IssuerGuard {
    fn drop(&mut self) {
        ENTERED.with(|entered| {
            entered.borrow_mut().pop();
        });
    }
}
