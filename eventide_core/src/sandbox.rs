//! Sandboxes: the stateful entities of a model, and the [`World`] arena that
//! owns them.
//!
//! A sandbox never holds references to events or to other sandboxes.
//! Events and callbacks reach a sandbox through a typed, copyable
//! [`SandboxHandle`], resolved against the world at invocation time.

use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::ids::{IdIssuer, SandboxId};
use crate::time::SimTime;
use eventide_env::rng::{self, SimRng};
use std::any::{type_name, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A stateful simulation entity.
pub trait Sandbox: 'static {
    fn core(&self) -> &SandboxCore;

    fn core_mut(&mut self) -> &mut SandboxCore;

    /// End of the warm-up period: reset accumulated statistics to start
    /// counting from `clock`, keep the operational state.
    fn warmed_up(&mut self, clock: SimTime);
}

/// Identity, randomness and initial events shared by every sandbox.
pub struct SandboxCore {
    /// Assigned when the sandbox joins a world
    id: Option<SandboxId>,

    /// Kind label, e.g. `Server`
    name: &'static str,

    /// Optional user label, shown instead of `name#id`
    tag: Option<String>,

    /// Seed of `rng`
    seed: u64,

    /// Private random stream of this entity
    rng: SimRng,

    /// Events scheduled at time zero when the world starts running
    initial_events: Vec<Event>,
}

impl SandboxCore {
    pub fn new(name: &'static str, seed: u64) -> Self {
        Self {
            id: None,
            name,
            tag: None,
            seed,
            rng: rng::seeded(seed),
            initial_events: Vec::new(),
        }
    }

    /// Sets the display tag. An empty tag falls back to `name#id`.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into()).filter(|t| !t.is_empty());
        self
    }

    pub fn id(&self) -> Option<SandboxId> {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Replaces the random stream with a fresh one seeded by `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = rng::seeded(seed);
    }

    pub fn rng_mut(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Queues an event to run at time zero once the world is simulated.
    pub fn add_initial_event(&mut self, event: Event) {
        self.initial_events.push(event);
    }
}

impl fmt::Display for SandboxCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.tag, self.id) {
            (Some(tag), _) => write!(f, "{}", tag),
            (None, Some(id)) => write!(f, "{}#{}", self.name, id),
            (None, None) => write!(f, "{}#?", self.name),
        }
    }
}

impl fmt::Debug for SandboxCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("seed", &self.seed)
            .field("initial_events", &self.initial_events.len())
            .finish()
    }
}

/// Typed reference to a sandbox living in a [`World`].
pub struct SandboxHandle<T> {
    id: SandboxId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SandboxHandle<T> {
    pub(crate) fn new(id: SandboxId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(self) -> SandboxId {
        self.id
    }
}

impl<T> Clone for SandboxHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SandboxHandle<T> {}

impl<T> PartialEq for SandboxHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for SandboxHandle<T> {}

impl<T> Hash for SandboxHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for SandboxHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SandboxHandle<{}>({})", short_type_name::<T>(), self.id)
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

struct SandboxSlot {
    value: Box<dyn Any>,
    label: fn(&dyn Any) -> String,
    warm: fn(&mut dyn Any, SimTime),
}

fn slot_label<T: Sandbox>(value: &dyn Any) -> String {
    value
        .downcast_ref::<T>()
        .map(|s| s.core().to_string())
        .unwrap_or_default()
}

fn slot_warm<T: Sandbox>(value: &mut dyn Any, clock: SimTime) {
    if let Some(sandbox) = value.downcast_mut::<T>() {
        sandbox.warmed_up(clock);
    }
}

/// Arena owning every sandbox of a model.
///
/// Ids are issued here on registration, independently of event indexes.
pub struct World {
    ids: IdIssuer,
    slots: Vec<SandboxSlot>,
    initial_events: Vec<Event>,
}

impl World {
    pub fn new() -> Self {
        Self {
            ids: IdIssuer::new(),
            slots: Vec::new(),
            initial_events: Vec::new(),
        }
    }

    /// Registers a sandbox, assigning its id and collecting its initial
    /// events.
    pub fn insert<T: Sandbox>(&mut self, mut sandbox: T) -> SandboxHandle<T> {
        let id = self.ids.next_sandbox();
        let core = sandbox.core_mut();
        core.id = Some(id);
        for mut event in core.initial_events.drain(..) {
            event.induce(Some(id));
            self.initial_events.push(event);
        }
        self.slots.push(SandboxSlot {
            value: Box::new(sandbox),
            label: slot_label::<T>,
            warm: slot_warm::<T>,
        });
        SandboxHandle::new(id)
    }

    fn slot_index(&self, id: SandboxId) -> SimResult<usize> {
        let index = id.raw().checked_sub(1).map(|i| i as usize);
        match index {
            Some(i) if i < self.slots.len() => Ok(i),
            _ => Err(SimError::SandboxNotFound(id)),
        }
    }

    pub fn get<T: Sandbox>(&self, handle: SandboxHandle<T>) -> SimResult<&T> {
        let index = self.slot_index(handle.id)?;
        self.slots[index]
            .value
            .downcast_ref::<T>()
            .ok_or(SimError::SandboxTypeMismatch {
                id: handle.id,
                expected: short_type_name::<T>(),
            })
    }

    pub fn get_mut<T: Sandbox>(&mut self, handle: SandboxHandle<T>) -> SimResult<&mut T> {
        let index = self.slot_index(handle.id)?;
        self.slots[index]
            .value
            .downcast_mut::<T>()
            .ok_or(SimError::SandboxTypeMismatch {
                id: handle.id,
                expected: short_type_name::<T>(),
            })
    }

    /// Recovers a typed handle from a raw id, checking the type.
    pub fn handle<T: Sandbox>(&self, id: SandboxId) -> SimResult<SandboxHandle<T>> {
        let handle = SandboxHandle::new(id);
        self.get(handle)?;
        Ok(handle)
    }

    /// Display label (`tag` or `Name#id`) of a sandbox.
    pub fn label(&self, id: SandboxId) -> Option<String> {
        let index = self.slot_index(id).ok()?;
        let slot = &self.slots[index];
        Some((slot.label)(slot.value.as_ref()))
    }

    pub fn contains(&self, id: SandboxId) -> bool {
        self.slot_index(id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Queues an extra event to run at time zero.
    pub fn add_initial_event(&mut self, event: Event) {
        self.initial_events.push(event);
    }

    pub(crate) fn take_initial_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.initial_events)
    }

    /// Calls `warmed_up` on every sandbox in registration order.
    pub(crate) fn warm_up_all(&mut self, clock: SimTime) {
        for slot in &mut self.slots {
            (slot.warm)(slot.value.as_mut(), clock);
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("sandboxes", &self.slots.len())
            .field("initial_events", &self.initial_events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    struct Counter {
        core: SandboxCore,
        value: u32,
        warmed_at: Option<SimTime>,
    }

    impl Counter {
        fn new(seed: u64) -> Self {
            Self {
                core: SandboxCore::new("Counter", seed),
                value: 0,
                warmed_at: None,
            }
        }
    }

    impl Sandbox for Counter {
        fn core(&self) -> &SandboxCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut SandboxCore {
            &mut self.core
        }

        fn warmed_up(&mut self, clock: SimTime) {
            self.warmed_at = Some(clock);
        }
    }

    struct Other {
        core: SandboxCore,
    }

    impl Sandbox for Other {
        fn core(&self) -> &SandboxCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut SandboxCore {
            &mut self.core
        }

        fn warmed_up(&mut self, _clock: SimTime) {}
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut world = World::new();
        let a = world.insert(Counter::new(1));
        let b = world.insert(Counter::new(2));
        assert_eq!(a.id().raw(), 1);
        assert_eq!(b.id().raw(), 2);
        assert_eq!(world.len(), 2);
        assert_eq!(world.get(a).unwrap().core().id(), Some(a.id()));
    }

    #[test]
    fn test_display_prefers_tag() {
        let mut world = World::new();
        let plain = world.insert(Counter::new(1));
        let tagged = world.insert(Other {
            core: SandboxCore::new("Other", 0).with_tag("dock"),
        });
        let empty_tag = world.insert(Other {
            core: SandboxCore::new("Other", 0).with_tag(""),
        });
        assert_eq!(world.label(plain.id()).unwrap(), "Counter#1");
        assert_eq!(world.label(tagged.id()).unwrap(), "dock");
        assert_eq!(world.label(empty_tag.id()).unwrap(), "Other#3");
    }

    #[test]
    fn test_type_mismatch_and_missing() {
        let mut world = World::new();
        let counter = world.insert(Counter::new(1));
        assert!(matches!(
            world.handle::<Other>(counter.id()),
            Err(SimError::SandboxTypeMismatch { .. })
        ));
        let mut ids = IdIssuer::new();
        ids.next_sandbox();
        let ghost = ids.next_sandbox();
        assert!(matches!(world.handle::<Counter>(ghost), Err(SimError::SandboxNotFound(_))));
        assert!(world.handle::<Counter>(counter.id()).is_ok());
    }

    #[test]
    fn test_initial_events_inherit_owner() {
        let mut counter = Counter::new(1);
        counter.core_mut().add_initial_event(Event::noop("boot"));
        let mut world = World::new();
        let handle = world.insert(counter);
        let events = world.take_initial_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].owner(), Some(handle.id()));
        assert!(world.take_initial_events().is_empty());
    }

    #[test]
    fn test_warm_up_reaches_every_sandbox() {
        let mut world = World::new();
        let a = world.insert(Counter::new(1));
        let b = world.insert(Counter::new(2));
        world.get_mut(a).unwrap().value = 5;
        world.warm_up_all(SimTime::from_secs(60));
        assert_eq!(world.get(a).unwrap().warmed_at, Some(SimTime::from_secs(60)));
        assert_eq!(world.get(b).unwrap().warmed_at, Some(SimTime::from_secs(60)));
        assert_eq!(world.get(a).unwrap().value, 5);
    }

    #[test]
    fn test_reseed_restarts_stream() {
        let mut core = SandboxCore::new("Counter", 9);
        let first: u64 = core.rng_mut().gen();
        core.reseed(9);
        assert_eq!(core.rng_mut().gen::<u64>(), first);
        assert_eq!(core.seed(), 9);
    }
}
