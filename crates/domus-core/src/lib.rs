//! Domus Core: configuration, error taxonomy and shared time helpers.

pub mod config;
pub mod error;

pub use config::{DataPaths, DomusConfig, JobConfig, ScanConfig};
pub use error::{Error, Result};

/// Milliseconds since the Unix epoch, the timestamp unit used across the store.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp as RFC 3339 for API payloads.
pub fn millis_to_rfc3339(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}
