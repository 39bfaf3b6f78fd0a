//! Event - the atomic unit of telemetry.

use alloc::string::String;

use crate::{Data, SCHEMA_VERSION};

/// One structured telemetry record.
///
/// Events are built by a pipeline from a producer's draft: the pipeline
/// stamps `timestamp_ms` and `schema_version` and sanitizes `data` before
/// anyone else sees the event. Once handed out, an event is only ever
/// shared by reference.
///
/// # Example
///
/// ```rust
/// use beacon_types::{Event, Value};
///
/// let mut event = Event::new("editor.save", 1703160000000);
/// event.duration_ms = Some(12.5);
/// event.data.insert("words".into(), Value::from(420));
///
/// assert_eq!(event.event_type, "editor.save");
/// assert_eq!(event.schema_version, beacon_types::SCHEMA_VERSION);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Dotted identifier chosen by the producer, e.g. `feedback.submit`.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub event_type: String,

    /// Unix timestamp in milliseconds, assigned at emission.
    #[cfg_attr(feature = "serde", serde(rename = "ts"))]
    pub timestamp_ms: u64,

    /// Span duration, for events that close a timed span.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "durMs", default, skip_serializing_if = "Option::is_none")
    )]
    pub duration_ms: Option<f64>,

    /// Small, sanitized key-value detail.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "alloc::collections::BTreeMap::is_empty")
    )]
    pub data: Data,

    /// Request/page correlation id.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "rid", default, skip_serializing_if = "Option::is_none")
    )]
    pub correlation_id: Option<String>,

    /// Non-identifying user role.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub role: Option<String>,

    /// Stable anonymous id (never a raw identifier).
    #[cfg_attr(
        feature = "serde",
        serde(rename = "anonId", default, skip_serializing_if = "Option::is_none")
    )]
    pub anonymous_id: Option<String>,

    /// Schema version of this record.
    #[cfg_attr(feature = "serde", serde(rename = "ver", default = "default_version"))]
    pub schema_version: u32,
}

impl Event {
    /// Create an event with the given type and timestamp and no detail.
    pub fn new(event_type: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp_ms,
            duration_ms: None,
            data: Data::new(),
            correlation_id: None,
            role: None,
            anonymous_id: None,
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Look up a detail value by key.
    pub fn get(&self, key: &str) -> Option<&crate::Value> {
        self.data.get(key)
    }

    /// Whether the event's type starts with the given dotted prefix.
    ///
    /// `"editor"` matches `editor.save` but not `editorial.view`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        match self.event_type.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }
}

#[cfg(feature = "serde")]
fn default_version() -> u32 {
    SCHEMA_VERSION
}
