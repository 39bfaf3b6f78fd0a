//! Read-only pipeline counters for diagnostics.

/// A point-in-time view of a pipeline's queue and transport counters.
///
/// Safe to take at any time; used by debug overlays and tests to assert
/// on pipeline state without reaching into its internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineStats {
    /// Events currently waiting in the queue.
    pub queued: usize,

    /// Consecutive failed deliveries since the last success.
    #[cfg_attr(feature = "serde", serde(rename = "retry"))]
    pub retry_count: u32,

    /// Events discarded by the drop-oldest overflow policy.
    pub dropped: u64,

    /// Events acknowledged by the collector.
    #[cfg_attr(feature = "serde", serde(default))]
    pub delivered: u64,

    /// Events rejected by the sampling gate.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sampled_out: u64,
}

impl PipelineStats {
    /// Whether the transport is currently backing off after failures.
    pub fn is_backing_off(&self) -> bool {
        self.retry_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        let stats = PipelineStats::default();
        assert_eq!(stats.queued, 0);
        assert!(!stats.is_backing_off());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn overlay_field_names() {
        let stats = PipelineStats {
            queued: 3,
            retry_count: 1,
            dropped: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["queued"], 3);
        assert_eq!(json["retry"], 1);
        assert_eq!(json["dropped"], 2);
    }
}
