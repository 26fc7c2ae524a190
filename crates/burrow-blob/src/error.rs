//! Error types for the blob store boundary.

use crate::store::BlobId;

/// Result type alias for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Error variants for blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The requested blob does not exist in the store.
    #[error("blob not found: {id}")]
    NotFound {
        /// The blob ID that was not found.
        id: BlobId,
    },

    /// Wraps standard I/O errors from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store is temporarily unreachable; the caller may retry with backoff.
    #[error("blob store unavailable: {reason}")]
    Unavailable {
        /// Description of the outage.
        reason: String,
    },
}
