//! The abstract blob store trait consumed by the storage engine.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::BlobResult;

/// String identifier of a blob in the store.
///
/// The engine namespaces blobs by single-letter key prefixes (pack blobs vs
/// index blobs) and relies on prefix listing to discover them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobId(String);

impl BlobId {
    /// Creates a blob ID from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the ID starts with the given key prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BlobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BlobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Abstract put/get/list/delete over opaque byte blobs keyed by string IDs.
///
/// Implementations must guarantee that `put` is all-or-nothing (a reader never
/// observes a partially written blob) and that `list` sees every blob whose
/// `put` completed before the listing started.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores a blob under the given ID, replacing any existing blob.
    async fn put_blob(&self, id: &BlobId, data: Bytes) -> BlobResult<()>;

    /// Fetches the full contents of a blob.
    async fn get_blob(&self, id: &BlobId) -> BlobResult<Bytes>;

    /// Lists all blob IDs starting with the given prefix, in unspecified order.
    async fn list_blobs(&self, prefix: &str) -> BlobResult<Vec<BlobId>>;

    /// Deletes a blob. Deleting a missing blob is not an error.
    async fn delete_blob(&self, id: &BlobId) -> BlobResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_id_prefix() {
        let id = BlobId::new("n1f3a");
        assert!(id.has_prefix("n"));
        assert!(!id.has_prefix("p"));
        assert_eq!(id.as_str(), "n1f3a");
    }

    #[test]
    fn blob_id_display_roundtrip() {
        let id = BlobId::from("p42");
        assert_eq!(format!("{id}"), "p42");
    }
}
