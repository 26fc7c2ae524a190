//! Index inspection surface consumed by debugging tooling.

use burrow_index::{ContentEntry, ContentId, PackBlockId, PhysicalBlockId};
use serde::Serialize;

/// Identity and shape of one active index block.
#[derive(Debug, Clone, Serialize)]
pub struct IndexBlockMetadata {
    /// Physical block ID the blob is stored under.
    pub physical_id: PhysicalBlockId,
    /// Latest entry timestamp in the block.
    pub timestamp_ms: u64,
    /// Number of entries.
    pub entry_count: usize,
    /// Serialized (decrypted) size in bytes.
    pub length_bytes: usize,
}

/// One decoded index entry, discriminated for display: an add locating bytes
/// in a pack, or a deletion tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexEntryReport {
    /// Content present in a pack blob.
    Add {
        /// Content ID.
        content_id: ContentId,
        /// Entry timestamp.
        timestamp_ms: u64,
        /// Pack blob holding the bytes.
        pack_block_id: PackBlockId,
        /// Byte offset within the pack blob.
        pack_offset: u32,
        /// Stored length in bytes.
        length: u32,
    },
    /// Content logically deleted.
    Tombstone {
        /// Content ID.
        content_id: ContentId,
        /// Entry timestamp.
        timestamp_ms: u64,
    },
}

impl From<&ContentEntry> for IndexEntryReport {
    fn from(entry: &ContentEntry) -> Self {
        if entry.deleted {
            IndexEntryReport::Tombstone {
                content_id: entry.content_id,
                timestamp_ms: entry.timestamp_ms,
            }
        } else {
            IndexEntryReport::Add {
                content_id: entry.content_id,
                timestamp_ms: entry.timestamp_ms,
                pack_block_id: entry.pack_block_id,
                pack_offset: entry.pack_offset,
                length: entry.length,
            }
        }
    }
}

impl std::fmt::Display for IndexEntryReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexEntryReport::Add {
                content_id,
                timestamp_ms,
                pack_block_id,
                pack_offset,
                length,
            } => write!(
                f,
                "add {content_id} {timestamp_ms} {pack_block_id} {pack_offset}+{length}"
            ),
            IndexEntryReport::Tombstone {
                content_id,
                timestamp_ms,
            } => write!(f, "del {content_id} {timestamp_ms}"),
        }
    }
}
