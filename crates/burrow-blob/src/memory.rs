//! In-memory blob store used by tests and embedded deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BlobError, BlobResult};
use crate::store::{BlobId, BlobStore};

/// Operation counters for the in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStoreStats {
    /// Number of put operations.
    pub puts: u64,
    /// Number of get operations.
    pub gets: u64,
    /// Number of delete operations.
    pub deletes: u64,
    /// Number of list operations.
    pub list_calls: u64,
    /// Total bytes currently stored.
    pub total_bytes_stored: u64,
}

/// In-memory [`BlobStore`] backed by a hash map.
///
/// Puts replace atomically under a lock, so readers observe either the old or
/// the new blob, never a partial write. Supports injected put failures for
/// crash-path tests.
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<BlobId, Bytes>>,
    stats: Mutex<MemoryStoreStats>,
    fail_puts: AtomicBool,
}

impl MemoryBlobStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            stats: Mutex::new(MemoryStoreStats::default()),
            fail_puts: AtomicBool::new(false),
        }
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> MemoryStoreStats {
        self.stats.lock().clone()
    }

    /// Number of blobs currently stored.
    pub fn blob_count(&self) -> usize {
        self.blobs.lock().len()
    }

    /// When set, every `put_blob` fails with [`BlobError::Unavailable`] and
    /// stores nothing. Used by tests that exercise abort paths.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_blob(&self, id: &BlobId, data: Bytes) -> BlobResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable {
                reason: "injected put failure".to_string(),
            });
        }

        let bytes = data.len() as u64;
        let replaced = self.blobs.lock().insert(id.clone(), data);

        let mut stats = self.stats.lock();
        stats.puts += 1;
        stats.total_bytes_stored = stats
            .total_bytes_stored
            .saturating_sub(replaced.map(|d| d.len() as u64).unwrap_or(0))
            .saturating_add(bytes);
        drop(stats);

        debug!(id = %id, bytes, "stored blob");
        Ok(())
    }

    async fn get_blob(&self, id: &BlobId) -> BlobResult<Bytes> {
        let found = self.blobs.lock().get(id).cloned();
        self.stats.lock().gets += 1;
        found.ok_or_else(|| BlobError::NotFound { id: id.clone() })
    }

    async fn list_blobs(&self, prefix: &str) -> BlobResult<Vec<BlobId>> {
        let ids: Vec<BlobId> = self
            .blobs
            .lock()
            .keys()
            .filter(|id| id.has_prefix(prefix))
            .cloned()
            .collect();
        self.stats.lock().list_calls += 1;
        Ok(ids)
    }

    async fn delete_blob(&self, id: &BlobId) -> BlobResult<()> {
        let removed = self.blobs.lock().remove(id);
        let bytes_removed = removed.map(|d| d.len() as u64).unwrap_or(0);

        let mut stats = self.stats.lock();
        stats.deletes += 1;
        stats.total_bytes_stored = stats.total_bytes_stored.saturating_sub(bytes_removed);
        drop(stats);

        debug!(id = %id, bytes_removed, "deleted blob");
        Ok(())
    }
}
