//! Shared data model for the Beacon trace backend: spans, traces, export
//! envelopes, well-known attribute keys, configuration, and the common
//! error type.

pub mod attr;
pub mod config;
pub mod error;
pub mod export;
pub mod span;
pub mod trace;

pub use error::{Error, Result};

/// Current wall-clock time as epoch seconds, the unit every span and
/// trace timestamp uses.
pub fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
