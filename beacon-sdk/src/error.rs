//! Error types for the pipeline.
//!
//! None of these reach producers: `emit` is fire-and-forget. They surface
//! through [`Transport`](crate::Transport) implementations, configuration
//! loading, and the tracing log.

use thiserror::Error;

/// Delivery of a batch to the collector failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Collector answered with a non-2xx status.
    #[error("collector returned status {0}")]
    Status(u16),

    /// Could not reach the collector.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Any other HTTP-level failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Batch could not be encoded.
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    /// In-process consumer is not accepting batches.
    #[error("channel unavailable: {0}")]
    Channel(&'static str),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Pipeline configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Source could not be read or deserialized.
    #[error("failed to load telemetry config: {0}")]
    Load(#[from] ::config::ConfigError),

    /// Endpoint is not an absolute http(s) URL.
    #[error("invalid endpoint {0:?}: expected an http:// or https:// URL")]
    InvalidEndpoint(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            TransportError::Status(503).to_string(),
            "collector returned status 503"
        );
        assert_eq!(TransportError::Timeout.to_string(), "request timed out");
        assert_eq!(
            TransportError::Channel("closed").to_string(),
            "channel unavailable: closed"
        );
        assert!(ConfigError::InvalidEndpoint("ftp://x".into())
            .to_string()
            .contains("ftp://x"));
    }

    #[test]
    fn json_errors_convert_to_encode() {
        let err: TransportError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, TransportError::Encode(_)));
        assert!(err.to_string().starts_with("failed to encode batch"));
    }
}
