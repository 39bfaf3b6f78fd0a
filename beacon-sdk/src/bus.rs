//! Local fan-out of emitted events to in-process observers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use beacon_types::Event;
use parking_lot::RwLock;

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Synchronous publish/subscribe for emitted events.
///
/// Listeners see every event that passes the enablement check, whether or
/// not it is later sampled out or transmitted. A panicking listener is
/// logged and skipped; it never reaches the publisher or other listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners run in subscription order.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, Arc::new(listener)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    /// Deliver an event to every current listener.
    pub fn publish(&self, event: &Event) {
        // Snapshot so listeners may (un)subscribe from inside a callback.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(event_type = %event.event_type, "telemetry listener panicked");
            }
        }
    }

    /// Number of active listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Guard for a bus listener.
///
/// Dropping the guard unsubscribes. Call [`Subscription::detach`] to keep
/// the listener for the life of the pipeline instead.
#[must_use = "dropping a Subscription unsubscribes the listener"]
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is harmless.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.remove(self.id),
            None => false,
        }
    }

    /// Keep the listener registered without holding the guard.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
