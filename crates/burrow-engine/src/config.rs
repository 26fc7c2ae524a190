//! Engine configuration.

use burrow_blob::BlobId;
use burrow_index::{PackBlockId, PhysicalBlockId};
use serde::{Deserialize, Serialize};

/// Default target pack blob size: 16 MiB.
pub const DEFAULT_MAX_PACK_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for the pack/block manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Flush seals the in-progress pack blob once it reaches this many bytes;
    /// a single flush may produce several packs.
    pub max_pack_size: usize,
    /// Key prefix under which pack blobs are stored.
    pub pack_blob_prefix: String,
    /// Key prefix under which index blobs are stored. Prefix listing on this
    /// namespace discovers the active index set.
    pub index_blob_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pack_size: DEFAULT_MAX_PACK_SIZE,
            pack_blob_prefix: "p".to_string(),
            index_blob_prefix: "n".to_string(),
        }
    }
}

impl EngineConfig {
    /// Blob key of a pack blob.
    pub fn pack_blob_id(&self, id: &PackBlockId) -> BlobId {
        BlobId::new(format!("{}{}", self.pack_blob_prefix, id))
    }

    /// Blob key of an index blob.
    pub fn index_blob_id(&self, id: &PhysicalBlockId) -> BlobId {
        BlobId::new(format!("{}{}", self.index_blob_prefix, id))
    }

    /// Recovers a physical block ID from an index blob key.
    pub fn parse_index_blob_id(&self, blob_id: &BlobId) -> Option<PhysicalBlockId> {
        blob_id
            .as_str()
            .strip_prefix(&self.index_blob_prefix)
            .and_then(PhysicalBlockId::parse)
    }

    /// Recovers a pack block ID from a pack blob key.
    pub fn parse_pack_blob_id(&self, blob_id: &BlobId) -> Option<PackBlockId> {
        blob_id
            .as_str()
            .strip_prefix(&self.pack_blob_prefix)
            .and_then(PackBlockId::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_blob_key_roundtrip() {
        let config = EngineConfig::default();
        let id = PhysicalBlockId::generate();
        let blob_id = config.index_blob_id(&id);
        assert!(blob_id.has_prefix("n"));
        assert_eq!(config.parse_index_blob_id(&blob_id), Some(id));
    }

    #[test]
    fn pack_and_index_namespaces_are_disjoint() {
        let config = EngineConfig::default();
        let pack = config.pack_blob_id(&PackBlockId::generate());
        assert!(pack.has_prefix("p"));
        assert!(!pack.has_prefix("n"));
    }

    #[test]
    fn foreign_keys_do_not_parse() {
        let config = EngineConfig::default();
        assert_eq!(config.parse_index_blob_id(&BlobId::new("pdeadbeef")), None);
        assert_eq!(config.parse_index_blob_id(&BlobId::new("nnot-a-uuid")), None);
    }
}
