//! Batch - the unit of delivery to a collector.

use alloc::vec::Vec;

use crate::Event;

/// An ordered sequence of events captured together at flush time.
///
/// Serializes to the collector's request body, `{"events": [...]}`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Batch {
    /// Events in queue order.
    pub events: Vec<Event>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events in the batch.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the batch has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over the events in order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Take the events out of the batch.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl From<Vec<Event>> for Batch {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl IntoIterator for Batch {
    type Item = Event;
    type IntoIter = alloc::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "serde")]
    #[test]
    fn request_body_shape() {
        let batch = Batch::from(vec![Event::new("a", 1), Event::new("b", 2)]);
        let json = serde_json::to_value(&batch).unwrap();

        let events = json["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "a");
        assert_eq!(events[1]["ts"], 2);
    }

    #[test]
    fn preserves_order() {
        let batch = Batch::from(vec![Event::new("first", 1), Event::new("second", 2)]);
        let types: Vec<_> = batch.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, ["first", "second"]);
        assert!(!batch.is_empty());
        assert!(Batch::new().is_empty());
    }
}
