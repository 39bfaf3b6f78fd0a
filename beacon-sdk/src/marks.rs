//! Named timing marks and scoped spans.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::draft::EventDraft;
use crate::pipeline::Pipeline;

/// Event type for timing events when the caller gives none.
pub const DEFAULT_SPAN_EVENT_TYPE: &str = "perf";

/// Detail key carrying the span name.
pub const SPAN_KEY: &str = "span";

/// Open marks by name. Re-marking a name restarts it.
#[derive(Debug, Default)]
pub(crate) struct Marks {
    open: Mutex<HashMap<String, Instant>>,
}

impl Marks {
    pub(crate) fn start(&self, name: &str) {
        self.open.lock().insert(name.to_string(), Instant::now());
    }

    /// Consume a mark, returning the time since it was set.
    pub(crate) fn finish(&self, name: &str) -> Option<Duration> {
        self.open
            .lock()
            .remove(name)
            .map(|started| started.elapsed())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.open.lock().len()
    }
}

/// Build the timing event for a finished span.
pub(crate) fn span_event(name: &str, event_type: &str, elapsed: Duration) -> EventDraft {
    EventDraft::new(event_type)
        .duration_ms(elapsed.as_nanos() as f64 / 1_000_000.0)
        .data(SPAN_KEY, name)
}

/// Emits a timing event when dropped.
///
/// Obtain one with [`Pipeline::span`].
///
/// # Example
///
/// ```rust
/// # use beacon_sdk::Pipeline;
/// # let pipeline = Pipeline::builder().build();
/// {
///     let _span = pipeline.span("render.sidebar");
///     // ... timed work ...
/// } // emits a `perf` event with `data.span = "render.sidebar"`
/// ```
#[must_use = "the span is recorded when this guard is dropped"]
#[derive(Debug)]
pub struct SpanGuard {
    pub(crate) pipeline: Pipeline,
    pub(crate) name: String,
    pub(crate) event_type: String,
    pub(crate) started: Instant,
    pub(crate) armed: bool,
}

impl SpanGuard {
    /// Time since the span started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Drop without emitting.
    pub fn cancel(mut self) {
        self.armed = false;
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        if self.armed {
            let draft = span_event(&self.name, &self.event_type, self.started.elapsed());
            self.pipeline.emit(draft);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_types::Value;

    #[tokio::test(start_paused = true)]
    async fn finish_measures_and_consumes() {
        let marks = Marks::default();
        marks.start("load");
        tokio::time::advance(Duration::from_millis(120)).await;

        assert_eq!(marks.finish("load"), Some(Duration::from_millis(120)));
        assert_eq!(marks.finish("load"), None);
        assert_eq!(marks.len(), 0);
    }

    #[test]
    fn unmatched_finish_is_none() {
        let marks = Marks::default();
        assert_eq!(marks.finish("never"), None);
    }

    #[test]
    fn span_event_shape() {
        let draft = span_event("load", "perf", Duration::from_millis(1500));
        let event = draft.finish(0, &crate::Sanitizer::default());
        assert_eq!(event.event_type, "perf");
        assert_eq!(event.duration_ms, Some(1500.0));
        assert_eq!(event.get(SPAN_KEY), Some(&Value::from("load")));
    }
}
