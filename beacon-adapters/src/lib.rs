//! # beacon-adapters
//!
//! Metric source adapters for beacon pipelines.
//!
//! A [`MetricSource`] produces performance observations (name, value,
//! rating). [`observe`] opens a source in the background and re-emits each
//! observation as a `web_vital` event. If the source cannot be opened the
//! failure is logged at debug level and nothing else happens: missing
//! telemetry never breaks the host.
//!
//! ## Sources
//!
//! - [`ChannelSource`] - observations pushed by the host application
//! - [`LoopLagSource`] (`runtime` feature, default) - async scheduler lateness
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beacon_adapters::{observe, ChannelSource, Observation};
//! use beacon_sdk::Pipeline;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = Pipeline::builder().build();
//!     let (tx, source) = ChannelSource::create("page");
//!     observe(&pipeline, source);
//!
//!     if let Some(lcp) = Observation::rated("LCP", 2100.0) {
//!         let _ = tx.send(lcp).await;
//!     }
//! }
//! ```

pub mod channel;
pub mod error;
pub mod observation;
pub mod source;

#[cfg(feature = "runtime")]
pub mod runtime;

pub use channel::ChannelSource;
pub use error::AdapterError;
pub use observation::{Observation, Rating, Thresholds, WEB_VITAL_EVENT_TYPE};
pub use source::{MetricSource, ObservationStream};

#[cfg(feature = "runtime")]
pub use runtime::LoopLagSource;

use beacon_sdk::Pipeline;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

/// Feed a metric source into a pipeline.
///
/// Spawns a task that opens the source and emits one `web_vital` event per
/// observation until the source ends. Returns `None` when called outside a
/// tokio runtime.
pub fn observe<S: MetricSource>(pipeline: &Pipeline, mut source: S) -> Option<JoinHandle<()>> {
    let rt = match tokio::runtime::Handle::try_current() {
        Ok(rt) => rt,
        Err(_) => {
            tracing::debug!(source = source.name(), "metric source skipped: no runtime");
            return None;
        }
    };

    let pipeline = pipeline.clone();
    Some(rt.spawn(async move {
        let mut stream = match source.open().await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::debug!(source = source.name(), error = %e, "metric source unavailable");
                return;
            }
        };

        let mut count = 0u64;
        while let Some(observation) = stream.next().await {
            pipeline.emit(observation.to_draft());
            count += 1;
        }
        tracing::debug!(source = source.name(), count, "metric source ended");
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use beacon_types::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Unavailable;

    #[async_trait]
    impl MetricSource for Unavailable {
        fn name(&self) -> &str {
            "unavailable"
        }

        async fn open(&mut self) -> Result<ObservationStream, AdapterError> {
            Err(AdapterError::Unavailable("no performance observer".into()))
        }
    }

    #[tokio::test]
    async fn observations_become_web_vital_events() {
        let pipeline = Pipeline::builder().build();
        let (tx, source) = ChannelSource::create("test");
        let handle = observe(&pipeline, source).unwrap();

        tx.send(Observation::new("LCP", 2100.0, Rating::Good))
            .await
            .unwrap();
        tx.send(Observation::new("CLS", 0.3, Rating::Poor))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        let events = pipeline.queued_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.event_type == WEB_VITAL_EVENT_TYPE));
        assert_eq!(events[0].get("metric"), Some(&Value::from("LCP")));
        assert_eq!(events[0].get("value"), Some(&Value::Float(2100.0)));
        assert_eq!(events[0].get("rating"), Some(&Value::from("good")));
        assert_eq!(events[1].get("rating"), Some(&Value::from("poor")));
    }

    #[tokio::test]
    async fn listeners_see_observations() {
        let pipeline = Pipeline::builder().build();
        let seen = Arc::new(AtomicUsize::new(0));
        let _sub = {
            let seen = seen.clone();
            pipeline.subscribe(move |e| {
                if e.event_type == WEB_VITAL_EVENT_TYPE {
                    seen.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        let (tx, source) = ChannelSource::create("test");
        let handle = observe(&pipeline, source).unwrap();
        tx.send(Observation::new("INP", 90.0, Rating::Good))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn open_failure_is_swallowed() {
        let pipeline = Pipeline::builder().build();
        let handle = observe(&pipeline, Unavailable).unwrap();

        assert!(handle.await.is_ok());
        assert_eq!(pipeline.stats().queued, 0);
    }

    #[test]
    fn outside_a_runtime_nothing_is_spawned() {
        let pipeline = Pipeline::builder().build();
        let (_tx, source) = ChannelSource::create("test");
        assert!(observe(&pipeline, source).is_none());
    }

    #[cfg(feature = "runtime")]
    #[tokio::test(start_paused = true)]
    async fn loop_lag_samples_flow_into_the_pipeline() {
        use std::time::Duration;

        let pipeline = Pipeline::builder().build();
        let handle = observe(&pipeline, LoopLagSource::new(Duration::from_millis(100))).unwrap();

        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.abort();

        let events = pipeline.queued_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].get("metric"), Some(&Value::from("loop_lag")));
        assert_eq!(events[0].get("rating"), Some(&Value::from("good")));
    }
}
