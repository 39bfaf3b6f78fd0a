//! The metric source abstraction.

use std::fmt::Debug;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::AdapterError;
use crate::observation::Observation;

/// Stream of observations produced by an opened source.
pub type ObservationStream = BoxStream<'static, Observation>;

/// A producer of performance observations.
///
/// Implementations wrap some measurement facility (a browser-style
/// performance observer, runtime instrumentation, a host callback) and
/// expose it as a stream once opened.
#[async_trait]
pub trait MetricSource: Send + Debug + 'static {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Load the source and start producing observations.
    ///
    /// The stream ends when the source has nothing more to report.
    async fn open(&mut self) -> Result<ObservationStream, AdapterError>;
}
