//! Producer-side event builder.

use beacon_types::{Data, Event, Value};

use crate::sanitize::{data_from_json, Sanitizer};

/// Event type used when a producer supplies an empty one.
pub const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// An event as a producer describes it, before the pipeline stamps and
/// sanitizes it.
///
/// Malformed input is coerced rather than rejected: an empty type becomes
/// `"unknown"`, a non-finite duration is dropped and a negative one is
/// clamped to zero.
///
/// # Example
///
/// ```rust
/// use beacon_sdk::EventDraft;
///
/// let draft = EventDraft::new("feedback.submit")
///     .data("rating", 4)
///     .data("source", "modal")
///     .correlation_id("req-81");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDraft {
    pub(crate) event_type: String,
    pub(crate) duration_ms: Option<f64>,
    pub(crate) data: Data,
    pub(crate) correlation_id: Option<String>,
    pub(crate) role: Option<String>,
    pub(crate) anonymous_id: Option<String>,
}

impl EventDraft {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    /// Add one detail value.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merge untrusted JSON detail. Anything but an object contributes
    /// nothing.
    pub fn data_json(mut self, raw: &serde_json::Value) -> Self {
        self.data.extend(data_from_json(raw));
        self
    }

    /// Replace the detail map.
    pub fn data_map(mut self, data: Data) -> Self {
        self.data = data;
        self
    }

    pub fn duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn anonymous_id(mut self, id: impl Into<String>) -> Self {
        self.anonymous_id = Some(id.into());
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Stamp and sanitize into an immutable event.
    pub(crate) fn finish(self, timestamp_ms: u64, sanitizer: &Sanitizer) -> Event {
        let event_type = if self.event_type.trim().is_empty() {
            UNKNOWN_EVENT_TYPE.to_string()
        } else {
            self.event_type
        };

        let mut event = Event::new(event_type, timestamp_ms);
        event.duration_ms = self
            .duration_ms
            .filter(|d| d.is_finite())
            .map(|d| d.max(0.0));
        if !self.data.is_empty() {
            event.data = sanitizer.sanitize(self.data);
        }
        event.correlation_id = self.correlation_id;
        event.role = self.role;
        event.anonymous_id = self.anonymous_id;
        event
    }
}

impl From<&str> for EventDraft {
    fn from(event_type: &str) -> Self {
        Self::new(event_type)
    }
}

impl From<String> for EventDraft {
    fn from(event_type: String) -> Self {
        Self::new(event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn finish(draft: EventDraft) -> Event {
        draft.finish(42, &Sanitizer::default())
    }

    #[test]
    fn stamps_timestamp_and_version() {
        let event = finish(EventDraft::new("editor.save"));
        assert_eq!(event.timestamp_ms, 42);
        assert_eq!(event.schema_version, beacon_types::SCHEMA_VERSION);
        assert!(event.data.is_empty());
    }

    #[test]
    fn empty_type_becomes_unknown() {
        assert_eq!(finish(EventDraft::new("")).event_type, UNKNOWN_EVENT_TYPE);
        assert_eq!(finish(EventDraft::new("   ")).event_type, UNKNOWN_EVENT_TYPE);
    }

    #[test]
    fn duration_is_coerced() {
        assert_eq!(finish(EventDraft::new("a").duration_ms(-3.0)).duration_ms, Some(0.0));
        assert_eq!(finish(EventDraft::new("a").duration_ms(f64::NAN)).duration_ms, None);
        assert_eq!(
            finish(EventDraft::new("a").duration_ms(f64::INFINITY)).duration_ms,
            None
        );
        assert_eq!(finish(EventDraft::new("a").duration_ms(12.5)).duration_ms, Some(12.5));
    }

    #[test]
    fn data_is_sanitized_on_finish() {
        let event = finish(
            EventDraft::new("a")
                .data("password", "x")
                .data("note", "y".repeat(500))
                .data("i", 1),
        );
        assert!(event.get("password").is_none());
        assert_eq!(event.get("note").and_then(Value::as_str).map(str::len), Some(256));
        assert_eq!(event.get("i"), Some(&Value::Int(1)));
    }

    #[test]
    fn raw_json_detail_is_coerced() {
        let event = finish(EventDraft::new("a").data_json(&json!({ "tags": ["x"], "ok": true })));
        assert_eq!(event.get("tags"), Some(&Value::from(r#"["x"]"#)));
        assert_eq!(event.get("ok"), Some(&Value::Bool(true)));

        let event = finish(EventDraft::new("a").data_json(&json!("not an object")));
        assert!(event.data.is_empty());
    }

    #[test]
    fn context_fields_carry_over() {
        let event = finish(
            EventDraft::new("a")
                .correlation_id("r1")
                .role("editor")
                .anonymous_id("abcd"),
        );
        assert_eq!(event.correlation_id.as_deref(), Some("r1"));
        assert_eq!(event.role.as_deref(), Some("editor"));
        assert_eq!(event.anonymous_id.as_deref(), Some("abcd"));
    }
}
