//! Error types for Domus.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing caller input. Surfaces as 400.
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload larger than the configured limit. Surfaces as 413.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Storage, queue or database unreachable. Surfaces as 503.
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code used in API error bodies and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::DependencyUnavailable(_) | Self::Storage(_) => "dependency_unavailable",
            Self::Timeout(_) => "timeout",
            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = Error::Validation("PDF required".into());
        assert_eq!(err.to_string(), "PDF required");
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_storage_counts_as_dependency_failure() {
        assert_eq!(Error::Storage("disk".into()).code(), "dependency_unavailable");
        assert_eq!(Error::Database("locked".into()).code(), "internal");
    }
}
