//! Error types for the storage engine.

use burrow_blob::BlobError;
use burrow_crypto::CryptoError;
use burrow_index::{ContentId, IndexError};

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error variants surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Content ID absent or tombstoned in the merged view. Recoverable; the
    /// caller decides what to do.
    #[error("content not found: {content_id}")]
    NotFound {
        /// The content ID that was not found.
        content_id: ContentId,
    },

    /// An index block or pack blob failed structural validation. Not retried;
    /// retrying will not fix corrupted bytes.
    #[error("corrupt repository data: {reason}")]
    Corrupt {
        /// Description of the corruption.
        reason: String,
    },

    /// The crypto layer rejected input — an integrity violation, never
    /// silently ignored.
    #[error("encryption failure: {0}")]
    Encryption(#[from] CryptoError),

    /// Underlying blob store I/O error. Transient; eligible for caller-level
    /// retry with backoff.
    #[error("blob store unavailable: {0}")]
    StoreUnavailable(#[source] BlobError),
}

impl From<IndexError> for EngineError {
    fn from(err: IndexError) -> Self {
        EngineError::Corrupt {
            reason: err.to_string(),
        }
    }
}

impl From<BlobError> for EngineError {
    fn from(err: BlobError) -> Self {
        match err {
            // A blob the index told us about is gone: repository inconsistency,
            // not a transient outage.
            BlobError::NotFound { id } => EngineError::Corrupt {
                reason: format!("referenced blob {id} is missing from the store"),
            },
            other => EngineError::StoreUnavailable(other),
        }
    }
}
