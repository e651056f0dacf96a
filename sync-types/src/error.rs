//! Error types for ledger-sync wire formats.

use thiserror::Error;

/// Errors raised while encoding or decoding wire and storage formats.
#[derive(Debug, Error)]
pub enum SyncError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed (malformed envelope or record)
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Well-formed JSON with an invalid shape or value
    #[error("invalid data: {0}")]
    InvalidData(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::InvalidData("weights must be finite".into());
        assert_eq!(err.to_string(), "invalid data: weights must be finite");
    }

    #[test]
    fn deserialization_error_keeps_source() {
        let source = serde_json::from_str::<u8>("nope").unwrap_err();
        let err = SyncError::Deserialization(source);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
