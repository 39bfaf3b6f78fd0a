//! Terminal debug overlay.
//!
//! Renders the pipeline counters as `q:<queued> r:<retry> d:<dropped>`
//! followed by the most recent `web_vital` observations, newest first.

use std::collections::VecDeque;
use std::sync::Arc;

use beacon_adapters::WEB_VITAL_EVENT_TYPE;
use beacon_sdk::{Event, Pipeline, PipelineStats, Subscription, Value};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// How many observations the overlay keeps.
pub const VITALS_SHOWN: usize = 10;

/// One observation as it appeared on the event bus.
#[derive(Debug, Clone, PartialEq)]
pub struct VitalEntry {
    pub metric: String,
    pub value: f64,
    pub rating: String,
}

impl VitalEntry {
    fn from_event(event: &Event) -> Option<Self> {
        if event.event_type != WEB_VITAL_EVENT_TYPE {
            return None;
        }
        Some(Self {
            metric: event.get("metric").and_then(Value::as_str)?.to_string(),
            value: event.get("value").and_then(Value::as_f64)?,
            rating: event
                .get("rating")
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct Overlay {
    vitals: VecDeque<VitalEntry>,
    events_seen: u64,
}

impl Overlay {
    /// Account for one broadcast event.
    pub fn record(&mut self, event: &Event) {
        self.events_seen += 1;
        if let Some(entry) = VitalEntry::from_event(event) {
            if self.vitals.len() == VITALS_SHOWN {
                self.vitals.pop_front();
            }
            self.vitals.push_back(entry);
        }
    }

    /// Newest first.
    pub fn vitals(&self) -> impl Iterator<Item = &VitalEntry> {
        self.vitals.iter().rev()
    }

    pub fn events_seen(&self) -> u64 {
        self.events_seen
    }

    pub fn render(&self, stats: &PipelineStats) -> String {
        let mut out = status_line(stats);
        for vital in self.vitals() {
            out.push_str(&format!(
                "\n  {:<10} {:>10} {}",
                vital.metric,
                format_value(vital.value),
                vital.rating
            ));
        }
        out
    }
}

/// `q:<queued> r:<retry> d:<dropped>`
pub fn status_line(stats: &PipelineStats) -> String {
    format!(
        "q:{} r:{} d:{}",
        stats.queued, stats.retry_count, stats.dropped
    )
}

fn format_value(value: f64) -> String {
    if value.abs() >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// An [`Overlay`] fed by a pipeline subscription.
///
/// Every broadcast event wakes [`SharedOverlay::changed`]; bursts of events
/// coalesce into a single wake-up.
#[derive(Debug, Clone, Default)]
pub struct SharedOverlay {
    overlay: Arc<Mutex<Overlay>>,
    changed: Arc<Notify>,
}

impl SharedOverlay {
    /// Subscribe to `pipeline`. The overlay stops updating once the
    /// returned subscription is dropped.
    pub fn attach(pipeline: &Pipeline) -> (Self, Subscription) {
        let shared = Self::default();
        let listener = shared.clone();
        let subscription = pipeline.subscribe(move |event| listener.record(event));
        (shared, subscription)
    }

    pub fn record(&self, event: &Event) {
        self.overlay.lock().record(event);
        self.changed.notify_one();
    }

    /// Resolves after at least one event since the last call.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    pub fn render(&self, stats: &PipelineStats) -> String {
        self.overlay.lock().render(stats)
    }

    pub fn events_seen(&self) -> u64 {
        self.overlay.lock().events_seen()
    }
}
