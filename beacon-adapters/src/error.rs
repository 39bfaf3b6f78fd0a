//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when opening a metric source.
///
/// [`observe`](crate::observe) logs and swallows these; they never reach
/// the host application.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The underlying measurement facility is not available here.
    #[error("Metric source unavailable: {0}")]
    Unavailable(String),

    /// The source has already been opened and cannot be opened again.
    #[error("Metric source already opened: {0}")]
    AlreadyOpened(String),

    /// No async runtime to drive the source.
    #[error("No async runtime available")]
    NoRuntime,
}
