//! Bounded event buffer with a drop-oldest overflow policy.

use std::collections::VecDeque;

use beacon_types::{Batch, Event};

/// Default maximum number of queued events.
pub const DEFAULT_MAX_QUEUE: usize = 1000;

/// Events awaiting batching, in insertion order.
///
/// When an insert pushes the queue past capacity, the oldest entries are
/// discarded and counted. Nothing leaves the queue uncounted.
#[derive(Debug)]
pub struct BatchQueue {
    events: VecDeque<Event>,
    capacity: usize,
    dropped: u64,
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE)
    }
}

impl BatchQueue {
    /// Create a queue holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_MAX_QUEUE)),
            capacity,
            dropped: 0,
        }
    }

    /// Append to the tail. Returns how many old events were discarded.
    pub fn push(&mut self, event: Event) -> usize {
        self.events.push_back(event);
        self.enforce_capacity()
    }

    /// Put a failed batch back ahead of newer events, preserving its order.
    ///
    /// Returns how many events were discarded to stay within capacity.
    pub fn requeue_front(&mut self, events: Vec<Event>) -> usize {
        for event in events.into_iter().rev() {
            self.events.push_front(event);
        }
        self.enforce_capacity()
    }

    /// Take every queued event as one batch.
    pub fn drain_all(&mut self) -> Batch {
        Batch::from(self.events.drain(..).collect::<Vec<_>>())
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

    /// Total events discarded by the overflow policy.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Iterate over queued events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    fn enforce_capacity(&mut self) -> usize {
        let over = self.events.len().saturating_sub(self.capacity);
        if over > 0 {
            self.events.drain(..over);
            self.dropped += over as u64;
        }
        over
    }
}
