//! Event-loop responsiveness source.
//!
//! Measures how late the async scheduler wakes a task relative to when it
//! asked to be woken. Sustained lateness means the host is busy and user
//! input would feel sluggish, the server-side analogue of an input-delay
//! page metric.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::error::AdapterError;
use crate::observation::{Observation, Thresholds};
use crate::source::{MetricSource, ObservationStream};

/// Metric name reported by [`LoopLagSource`].
pub const LOOP_LAG_METRIC: &str = "loop_lag";

/// Default thresholds in milliseconds.
pub const DEFAULT_LOOP_LAG_THRESHOLDS: Thresholds = Thresholds::new(50.0, 200.0);

/// Samples scheduler lateness every `period`.
///
/// # Example
///
/// ```rust,no_run
/// use beacon_adapters::{observe, LoopLagSource};
/// use beacon_sdk::Pipeline;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let pipeline = Pipeline::builder().build();
///     observe(&pipeline, LoopLagSource::new(Duration::from_secs(1)));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LoopLagSource {
    period: Duration,
    thresholds: Thresholds,
}

impl Default for LoopLagSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl LoopLagSource {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            thresholds: DEFAULT_LOOP_LAG_THRESHOLDS,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

#[async_trait]
impl MetricSource for LoopLagSource {
    fn name(&self) -> &str {
        LOOP_LAG_METRIC
    }

    async fn open(&mut self) -> Result<ObservationStream, AdapterError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AdapterError::NoRuntime);
        }

        let period = self.period;
        let thresholds = self.thresholds;
        Ok(stream::unfold((), move |()| async move {
            let asked = Instant::now() + period;
            tokio::time::sleep_until(asked).await;
            let lag = Instant::now().saturating_duration_since(asked);
            let lag_ms = lag.as_nanos() as f64 / 1_000_000.0;
            let observation = Observation::new(LOOP_LAG_METRIC, lag_ms, thresholds.rate(lag_ms));
            Some((observation, ()))
        })
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Rating;

    #[tokio::test(start_paused = true)]
    async fn idle_runtime_reports_no_lag() {
        let mut source = LoopLagSource::new(Duration::from_millis(100));
        let samples: Vec<Observation> = source.open().await.unwrap().take(3).collect().await;

        assert_eq!(samples.len(), 3);
        for sample in samples {
            assert_eq!(sample.name, LOOP_LAG_METRIC);
            assert_eq!(sample.value, 0.0);
            assert_eq!(sample.rating, Rating::Good);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn custom_thresholds_are_applied() {
        let mut source = LoopLagSource::new(Duration::from_millis(10))
            .with_thresholds(Thresholds::new(-2.0, -1.0));
        let sample = source.open().await.unwrap().next().await.unwrap();
        assert_eq!(sample.rating, Rating::Poor);
    }

    #[test]
    fn open_without_runtime_fails() {
        let mut source = LoopLagSource::default();
        let result = futures_util::FutureExt::now_or_never(source.open());
        assert!(matches!(result, Some(Err(AdapterError::NoRuntime))));
    }
}
