//! Delivery backends for batches.
//!
//! A [`Transport`] has two paths: the normal async `send`, whose failures
//! feed the pipeline's requeue and backoff, and the synchronous `beacon`,
//! used once during teardown with no retry and no result.

use std::time::Duration;

use async_trait::async_trait;
use beacon_types::Batch;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Default timeout for a normal delivery.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the teardown beacon.
pub const DEFAULT_BEACON_TIMEOUT: Duration = Duration::from_secs(2);

/// Delivers batches to a collector.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Attempt one delivery. Any error is treated as a failed attempt.
    async fn send(&self, endpoint: &str, batch: &Batch) -> Result<(), TransportError>;

    /// Best-effort synchronous send used during teardown.
    ///
    /// Must return in bounded time and must not panic. The outcome is not
    /// reported back.
    fn beacon(&self, endpoint: &str, batch: &Batch);
}

/// JSON-over-HTTP delivery with reqwest.
///
/// Posts `{"events":[...]}` with `Content-Type: application/json`. Any 2xx
/// response is success.
///
/// # Example
///
/// ```rust
/// use beacon_sdk::HttpTransport;
/// use std::time::Duration;
///
/// let transport = HttpTransport::builder()
///     .timeout(Duration::from_secs(5))
///     .user_agent("my-app/1.0")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
    beacon_timeout: Duration,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: default_user_agent(),
            beacon_timeout: DEFAULT_BEACON_TIMEOUT,
        }
    }
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: &str, batch: &Batch) -> Result<(), TransportError> {
        let body = encode(batch)?;
        let response = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(status.as_u16()))
        }
    }

    fn beacon(&self, endpoint: &str, batch: &Batch) {
        let body = match encode(batch) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "beacon skipped: batch did not encode");
                return;
            }
        };

        let endpoint = endpoint.to_string();
        let user_agent = self.user_agent.clone();
        let timeout = self.beacon_timeout;

        // reqwest's blocking client owns a runtime of its own, which must
        // not be created or dropped on a tokio worker thread.
        let worker = std::thread::Builder::new()
            .name("telemetry-beacon".into())
            .spawn(move || blocking_post(&endpoint, body, &user_agent, timeout));

        match worker.map(|handle| handle.join()) {
            Ok(Ok(Ok(()))) => tracing::debug!("beacon delivered"),
            Ok(Ok(Err(e))) => tracing::debug!(error = %e, "beacon failed"),
            Ok(Err(_)) => tracing::debug!("beacon thread panicked"),
            Err(e) => tracing::debug!(error = %e, "beacon thread could not start"),
        }
    }
}

/// JSON body shared by the async path and the beacon.
fn encode(batch: &Batch) -> Result<Vec<u8>, TransportError> {
    Ok(serde_json::to_vec(batch)?)
}

fn blocking_post(
    endpoint: &str,
    body: Vec<u8>,
    user_agent: &str,
    timeout: Duration,
) -> Result<(), TransportError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;
    let response = client
        .post(endpoint)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(reqwest::header::USER_AGENT, user_agent)
        .body(body)
        .send()?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(TransportError::Status(response.status().as_u16()))
    }
}

fn default_user_agent() -> String {
    format!("beacon-sdk/{}", env!("CARGO_PKG_VERSION"))
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Default)]
pub struct HttpTransportBuilder {
    timeout: Option<Duration>,
    beacon_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl HttpTransportBuilder {
    /// Timeout for a normal delivery (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Upper bound for the teardown beacon (default: 2 seconds).
    pub fn beacon_timeout(mut self, timeout: Duration) -> Self {
        self.beacon_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(HttpTransport {
            client,
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            beacon_timeout: self.beacon_timeout.unwrap_or(DEFAULT_BEACON_TIMEOUT),
        })
    }
}

/// Hands batches to an in-process consumer over a bounded channel.
///
/// A full or closed channel counts as a failed delivery, so the batch is
/// requeued and retried like any network failure.
///
/// # Example
///
/// ```rust
/// use beacon_sdk::ChannelTransport;
///
/// let (transport, mut rx) = ChannelTransport::new(16);
///
/// // Later, receive batches
/// // while let Some(batch) = rx.recv().await {
/// //     println!("got {} events", batch.len());
/// // }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Batch>,
}

impl ChannelTransport {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Batch>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    fn offer(&self, batch: &Batch) -> Result<(), TransportError> {
        self.tx.try_send(batch.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Channel("full"),
            mpsc::error::TrySendError::Closed(_) => TransportError::Channel("closed"),
        })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, _endpoint: &str, batch: &Batch) -> Result<(), TransportError> {
        self.offer(batch)
    }

    fn beacon(&self, _endpoint: &str, batch: &Batch) {
        if let Err(e) = self.offer(batch) {
            tracing::debug!(error = %e, "beacon dropped");
        }
    }
}
