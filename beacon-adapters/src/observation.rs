//! Performance observations and their qualitative ratings.

use std::fmt;

use beacon_sdk::EventDraft;
use serde::{Deserialize, Serialize};

/// Event type emitted for every observation.
pub const WEB_VITAL_EVENT_TYPE: &str = "web_vital";

/// Qualitative bucket for a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rating boundaries: `good` at or below `good`, `poor` above `poor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub good: f64,
    pub poor: f64,
}

impl Thresholds {
    pub const fn new(good: f64, poor: f64) -> Self {
        Self { good, poor }
    }

    pub fn rate(&self, value: f64) -> Rating {
        if value <= self.good {
            Rating::Good
        } else if value > self.poor {
            Rating::Poor
        } else {
            Rating::NeedsImprovement
        }
    }

    /// Published boundaries for the common page metrics.
    pub fn for_metric(name: &str) -> Option<Self> {
        let thresholds = match name {
            "LCP" => Self::new(2500.0, 4000.0),
            "FCP" => Self::new(1800.0, 3000.0),
            "INP" => Self::new(200.0, 500.0),
            "FID" => Self::new(100.0, 300.0),
            "TTFB" => Self::new(800.0, 1800.0),
            "CLS" => Self::new(0.1, 0.25),
            _ => return None,
        };
        Some(thresholds)
    }
}

/// One measurement from a metric source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub name: String,
    pub value: f64,
    pub rating: Rating,
}

impl Observation {
    pub fn new(name: impl Into<String>, value: f64, rating: Rating) -> Self {
        Self {
            name: name.into(),
            value,
            rating,
        }
    }

    /// Rate a known page metric with its published thresholds.
    pub fn rated(name: impl Into<String>, value: f64) -> Option<Self> {
        let name = name.into();
        let rating = Thresholds::for_metric(&name)?.rate(value);
        Some(Self::new(name, value, rating))
    }

    /// The pipeline event for this observation.
    ///
    /// The metric name goes under `metric`: a `name` key would be stripped
    /// by the default sanitizer.
    pub fn to_draft(&self) -> EventDraft {
        EventDraft::new(WEB_VITAL_EVENT_TYPE)
            .data("metric", self.name.as_str())
            .data("value", self.value)
            .data("rating", self.rating.as_str())
    }
}
