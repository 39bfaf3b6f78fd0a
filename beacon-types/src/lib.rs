//! # beacon-types
//!
//! Core types for client-side telemetry. This crate defines the records that
//! flow through a beacon pipeline and the JSON shape a collector receives.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable `serde` for the JSON wire format
//! - **Collector compatible**: Field names match the collector's ingest schema
//!   (`type`, `ts`, `durMs`, `data`, `rid`, `role`, `anonId`, `ver`)
//! - **Versioned schema**: Every event carries a schema version tag
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use beacon_types::{Batch, Event, Value};
//!
//! let mut event = Event::new("feedback.submit", 1703160000000);
//! event.data.insert("rating".into(), Value::from(4));
//!
//! let batch = Batch::from(vec![event]);
//! assert_eq!(batch.len(), 1);
//! ```
//!
//! ## Schema Version
//!
//! The current schema version is **1**. Receivers use the `ver` field to
//! evolve parsing without breaking older clients.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod batch;
mod event;
mod stats;
mod value;

pub use batch::*;
pub use event::*;
pub use stats::*;
pub use value::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the event format.
pub const SCHEMA_VERSION: u32 = 1;

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
