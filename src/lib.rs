//! # beacon
//!
//! Command-line host for a [`beacon_sdk::Pipeline`].
//!
//! The `beacon` binary reads newline-delimited JSON from a file or stdin,
//! pushes each line through a telemetry pipeline and keeps a small debug
//! overlay on stdout:
//!
//! ```text
//! q:12 r:1 d:0
//!   LCP              2100 good
//!   loop_lag         0.42 good
//! ```
//!
//! On EOF it makes one last flush attempt and hands anything left to the
//! teardown beacon. Ctrl-C skips the flush and goes straight to the beacon.
//!
//! - **[`input`]**: NDJSON parsing into pipeline [`Command`]s
//! - **[`overlay`]**: the `q:/r:/d:` status line and recent observations
//! - **[`duration`]**: interval parsing for command-line flags

pub mod duration;
pub mod input;
pub mod overlay;

pub use input::{parse_line, Command, CommandStream, VitalsFeed};
pub use overlay::{status_line, Overlay, SharedOverlay, VitalEntry, VITALS_SHOWN};
