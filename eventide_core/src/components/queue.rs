//! Capacity-bounded FIFO waiting line.

use super::{fan_out, notify_all, Load, LoadCallback, NotifyCallback};
use crate::error::{SimError, SimResult};
use crate::event::Event;
use crate::metrics::TimeWeightedMetric;
use crate::sandbox::{Sandbox, SandboxCore, SandboxHandle};
use crate::simulator::EventContext;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Queue configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of waiting loads
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: usize::MAX,
        }
    }
}

impl QueueConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// FIFO queue releasing loads while its dequeue gate is open.
pub struct LoadQueue<L> {
    core: SandboxCore,
    config: QueueConfig,
    waiting: VecDeque<L>,
    to_dequeue: bool,
    occupancy: TimeWeightedMetric,
    on_dequeue: Vec<LoadCallback<L>>,
    on_state_change: Vec<NotifyCallback>,
}

impl<L: Load> LoadQueue<L> {
    pub fn new(config: QueueConfig, seed: u64) -> Self {
        Self {
            core: SandboxCore::new("Queue", seed),
            config,
            waiting: VecDeque::new(),
            to_dequeue: true,
            occupancy: TimeWeightedMetric::new(),
            on_dequeue: Vec::new(),
            on_state_change: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.core = self.core.with_tag(tag);
        self
    }

    /// Subscribes to dequeues. The returned event runs as the load leaves.
    pub fn on_dequeue(&mut self, subscriber: impl Fn(L) -> Event + 'static) {
        self.on_dequeue.push(Rc::new(subscriber));
    }

    pub fn on_state_change(&mut self, subscriber: impl Fn() -> Event + 'static) {
        self.on_state_change.push(Rc::new(subscriber));
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn occupancy(&self) -> usize {
        self.waiting.len()
    }

    pub fn vacancy(&self) -> usize {
        self.config.capacity.saturating_sub(self.waiting.len())
    }

    pub fn waiting(&self) -> impl Iterator<Item = &L> {
        self.waiting.iter()
    }

    pub fn is_dequeue_enabled(&self) -> bool {
        self.to_dequeue
    }

    pub fn occupancy_metric(&self) -> &TimeWeightedMetric {
        &self.occupancy
    }

    /// Time-weighted queue length.
    pub fn average_length(&self) -> f64 {
        self.occupancy.average_count()
    }

    /// Average length over capacity; 0 for an unbounded queue.
    pub fn utilization(&self) -> f64 {
        if self.config.capacity == usize::MAX || self.config.capacity == 0 {
            return 0.0;
        }
        self.average_length() / self.config.capacity as f64
    }

    fn handle_enqueue(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>, load: L) -> SimResult<()> {
        let clock = ctx.clock();
        let queue = ctx.sandbox_mut(handle)?;
        if queue.vacancy() == 0 {
            return Err(SimError::capacity(&queue.core, queue.config.capacity));
        }
        debug!(clock = %clock, queue = %queue.core, load = ?load, length = queue.waiting.len() + 1, "Enqueued");
        queue.waiting.push_back(load);
        queue.occupancy.observe_change(1.0, clock);
        let release = queue.to_dequeue;

        ctx.execute(handle.state_change())?;
        if release {
            ctx.execute(handle.dequeue())?;
        }
        Ok(())
    }

    /// Releases loads from the front while the gate stays open.
    fn handle_dequeue(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>) -> SimResult<()> {
        loop {
            let clock = ctx.clock();
            let queue = ctx.sandbox_mut(handle)?;
            if !queue.to_dequeue {
                return Ok(());
            }
            let Some(load) = queue.waiting.pop_front() else {
                return Ok(());
            };
            queue.occupancy.observe_change(-1.0, clock);
            let reactions = fan_out(&queue.on_dequeue, &load);

            ctx.execute_all(reactions)?;
            ctx.execute(handle.state_change())?;
        }
    }

    fn handle_update_to_dequeue(
        ctx: &mut EventContext<'_>,
        handle: SandboxHandle<Self>,
        enabled: bool,
    ) -> SimResult<()> {
        let queue = ctx.sandbox_mut(handle)?;
        let opened = enabled && !queue.to_dequeue;
        queue.to_dequeue = enabled;
        if opened && !queue.waiting.is_empty() {
            ctx.execute(handle.dequeue())?;
        }
        Ok(())
    }

    fn handle_state_change(ctx: &mut EventContext<'_>, handle: SandboxHandle<Self>) -> SimResult<()> {
        let reactions = notify_all(&ctx.sandbox(handle)?.on_state_change);
        ctx.execute_all(reactions)
    }
}

impl<L: Load> Sandbox for LoadQueue<L> {
    fn core(&self) -> &SandboxCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SandboxCore {
        &mut self.core
    }

    fn warmed_up(&mut self, clock: SimTime) {
        self.occupancy.warmed_up(clock);
    }
}

impl<L: Load> fmt::Debug for LoadQueue<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadQueue")
            .field("core", &self.core)
            .field("config", &self.config)
            .field("waiting", &self.waiting)
            .field("to_dequeue", &self.to_dequeue)
            .finish()
    }
}

/// Events of a queue.
impl<L: Load> SandboxHandle<LoadQueue<L>> {
    /// Appends `load`. Fails if the queue is full.
    pub fn enqueue(self, load: L) -> Event {
        Event::new("Enqueue", move |ctx| LoadQueue::handle_enqueue(ctx, self, load)).owned_by(self.id())
    }

    /// Opens or closes the dequeue gate; opening a non-empty queue releases
    /// loads immediately.
    pub fn update_to_dequeue(self, enabled: bool) -> Event {
        Event::new("UpdateToDequeue", move |ctx| {
            LoadQueue::handle_update_to_dequeue(ctx, self, enabled)
        })
        .owned_by(self.id())
    }

    fn dequeue(self) -> Event {
        Event::new("Dequeue", move |ctx| LoadQueue::handle_dequeue(ctx, self)).owned_by(self.id())
    }

    fn state_change(self) -> Event {
        Event::new("StateChange", move |ctx| LoadQueue::handle_state_change(ctx, self))
            .owned_by(self.id())
    }
}
