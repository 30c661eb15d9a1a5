//! Bounded FIFO of telemetry events with drop-oldest overflow.
//!
//! Backed by a `VecDeque` allocated once at full capacity, so it behaves as
//! a fixed ring buffer: push, evict-oldest and drain are O(1) per element
//! and the buffer never reallocates.

use std::collections::VecDeque;

use super::record::TelemetryEvent;

/// Default queue capacity.
pub const MAX_QUEUE_SIZE: usize = 200;

#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<TelemetryEvent>,
    capacity: usize,
}

impl EventQueue {
    /// # Panics
    /// Never panics; a capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `event`, evicting the oldest one first when full.
    ///
    /// Returns the evicted event, if any.
    pub fn push(&mut self, event: TelemetryEvent) -> Option<TelemetryEvent> {
        let evicted = if self.events.len() >= self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Take every queued event, oldest first, leaving the queue empty.
    pub fn drain_all(&mut self) -> Vec<TelemetryEvent> {
        self.events.drain(..).collect()
    }

    /// Put a failed batch back at the front, preserving its order.
    ///
    /// Only as many events as fit in the free space are restored; the
    /// newest events of the batch are dropped first. Returns the number of
    /// events re-inserted.
    pub fn requeue_front(&mut self, batch: Vec<TelemetryEvent>) -> usize {
        let room = self.capacity.saturating_sub(self.events.len());
        let keep = batch.len().min(room);
        for event in batch.into_iter().take(keep).rev() {
            self.events.push_front(event);
        }
        keep
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.events.iter()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(MAX_QUEUE_SIZE)
    }
}
