//! Channel-fed metric source.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

use crate::error::AdapterError;
use crate::observation::Observation;
use crate::source::{MetricSource, ObservationStream};

/// Default channel capacity for [`ChannelSource::create`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A metric source that receives observations pushed by the host.
///
/// Use this when measurements come from somewhere the adapter cannot reach
/// itself, e.g. a UI layer reporting paint timings.
///
/// # Example
///
/// ```
/// use beacon_adapters::{ChannelSource, Observation, Rating};
///
/// let (tx, source) = ChannelSource::create("host-vitals");
/// let _ = tx.try_send(Observation::new("LCP", 1800.0, Rating::Good));
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    name: String,
    receiver: Option<mpsc::Receiver<Observation>>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<Observation>, name: &str) -> Self {
        Self {
            name: format!("channel: {}", name),
            receiver: Some(receiver),
        }
    }

    /// Create a sender/source pair. The stream ends once every sender is
    /// dropped.
    pub fn create(name: &str) -> (mpsc::Sender<Observation>, Self) {
        Self::with_capacity(name, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(name: &str, capacity: usize) -> (mpsc::Sender<Observation>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx, name))
    }
}

#[async_trait]
impl MetricSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<ObservationStream, AdapterError> {
        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| AdapterError::AlreadyOpened(self.name.clone()))?;

        Ok(stream::unfold(receiver, |mut rx| async move {
            rx.recv().await.map(|obs| (obs, rx))
        })
        .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Rating;

    #[tokio::test]
    async fn yields_pushed_observations_until_senders_drop() {
        let (tx, mut source) = ChannelSource::create("test");
        let stream = source.open().await.unwrap();

        tx.send(Observation::new("LCP", 1.0, Rating::Good))
            .await
            .unwrap();
        tx.send(Observation::new("CLS", 0.3, Rating::Poor))
            .await
            .unwrap();
        drop(tx);

        let names: Vec<String> = stream.map(|o| o.name).collect().await;
        assert_eq!(names, ["LCP", "CLS"]);
    }

    #[tokio::test]
    async fn second_open_fails() {
        let (_tx, mut source) = ChannelSource::create("once");
        assert!(source.open().await.is_ok());
        assert!(matches!(
            source.open().await,
            Err(AdapterError::AlreadyOpened(_))
        ));
        assert_eq!(source.name(), "channel: once");
    }
}
