//! Future event list: pending events in (time, index) order.

use crate::event::Event;
use crate::ids::EventIndex;
use crate::time::SimTime;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// An event stored together with its ordering key.
pub(crate) struct ScheduledEvent {
    time: SimTime,
    index: EventIndex,
    event: Event,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.index == other.index
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap: reverse so the earliest (time, index) pops first
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Min-ordered queue of scheduled events.
#[derive(Default)]
pub(crate) struct FutureEventList {
    heap: BinaryHeap<ScheduledEvent>,
}

impl FutureEventList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts an event whose time and index are already assigned.
    pub(crate) fn push(&mut self, time: SimTime, index: EventIndex, event: Event) {
        self.heap.push(ScheduledEvent { time, index, event });
    }

    pub(crate) fn pop_earliest(&mut self) -> Option<Event> {
        self.heap.pop().map(|s| s.event)
    }

    pub(crate) fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|s| s.time)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
