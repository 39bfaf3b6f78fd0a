//! # beacon-sdk
//!
//! In-process telemetry pipeline: accepts structured events from
//! application code, sanitizes and samples them, batches them, and delivers
//! them to a collector with bounded memory and retry with backoff.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use beacon_sdk::{EventDraft, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = PipelineConfig::from_env().unwrap_or_default();
//!     let pipeline = Pipeline::builder().config(config).build();
//!
//!     // Last-chance beacon when main returns
//!     let _teardown = pipeline.teardown_guard();
//!
//!     // Local observers see every event, sampled or not
//!     let _sub = pipeline.subscribe(|event| eprintln!("{}", event.event_type));
//!
//!     pipeline.emit(EventDraft::new("feedback.submit").data("rating", 4));
//!
//!     pipeline.mark("startup");
//!     // ... work ...
//!     pipeline.mark_end("startup", None);
//!
//!     println!("{:?}", pipeline.stats());
//! }
//! ```
//!
//! ## Data flow
//!
//! producer → sanitizer → event bus → sampling gate → batch queue →
//! transport → collector
//!
//! - **Sanitizer**: strips denylisted keys, caps strings at 256 characters
//! - **Event bus**: synchronous local fan-out with per-listener isolation
//! - **Sampling gate**: one uniform draw per event against the sample rate
//! - **Batch queue**: drop-oldest at capacity; flushes at 50 events or after 5s
//! - **Transport**: async send with exponential backoff and jitter, plus a
//!   synchronous teardown beacon
//!
//! Emission never fails and never blocks on I/O.

mod bus;
mod draft;
mod error;
mod marks;
mod pipeline;
mod queue;
mod retry;
mod sanitize;
mod settings;
mod transport;

pub mod anon_id;
pub mod sampling;

pub use bus::{EventBus, Subscription};
pub use draft::{EventDraft, UNKNOWN_EVENT_TYPE};
pub use error::{ConfigError, TransportError};
pub use marks::{SpanGuard, DEFAULT_SPAN_EVENT_TYPE, SPAN_KEY};
pub use pipeline::{
    FlushOutcome, Pipeline, PipelineBuilder, SkipReason, TeardownGuard, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_MAX_BACKOFF, DEFAULT_MAX_BATCH,
};
pub use queue::{BatchQueue, DEFAULT_MAX_QUEUE};
pub use retry::Backoff;
pub use sanitize::{data_from_json, truncate_chars, Sanitizer, DEFAULT_DENYLIST, MAX_VALUE_LEN};
pub use settings::{PipelineConfig, ENV_PREFIX};
pub use transport::{
    ChannelTransport, HttpTransport, HttpTransportBuilder, Transport, DEFAULT_BEACON_TIMEOUT,
    DEFAULT_TIMEOUT,
};

// Re-export types for convenience
pub use beacon_types::{Batch, Data, Event, PipelineStats, Value, SCHEMA_VERSION};
