//! Error types for the ledger model.

use ledger_sync_types::{LedgerId, SyncError};
use thiserror::Error;

use crate::invite::InviteError;
use crate::store::StorageError;

/// Errors raised by ledger and catalog operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No ledger is stored under this identity.
    #[error("ledger not found: {0}")]
    NotFound(LedgerId),

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A local edit or stored record violates a model invariant.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The OS random source failed while generating a secret.
    #[error("random source failed: {0}")]
    Random(#[from] getrandom::Error),

    /// A record could not be encoded or decoded.
    #[error(transparent)]
    Wire(#[from] SyncError),
}

impl From<InviteError> for LedgerError {
    fn from(err: InviteError) -> Self {
        LedgerError::InvalidData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = LedgerError::NotFound(LedgerId::new("l1"));
        assert_eq!(err.to_string(), "ledger not found: l1");
    }

    #[test]
    fn storage_error_converts() {
        let err: LedgerError = StorageError::Backend("disk full".into()).into();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert_eq!(err.to_string(), "storage backend error: disk full");
    }

    #[test]
    fn invite_error_becomes_invalid_data() {
        let err: LedgerError = InviteError::UnsupportedVersion(9).into();
        assert!(matches!(err, LedgerError::InvalidData(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LedgerError>();
    }
}
