//! Building and serializing index blocks.

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::debug;

use crate::entry::{ContentEntry, ContentId};
use crate::format::{encode_entry, HEADER_SIZE, INDEX_MAGIC, INDEX_VERSION};

/// Accumulates entries and serializes them into an immutable index block.
///
/// Entries are unique by content ID within one block; adding a second entry
/// for the same ID keeps the one that wins under the merge rule.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    entries: BTreeMap<ContentId, ContentEntry>,
}

impl IndexBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry, resolving duplicates by the merge rule.
    pub fn add(&mut self, entry: ContentEntry) {
        match self.entries.get(&entry.content_id) {
            Some(existing) if !entry.supersedes(existing) => {}
            _ => {
                self.entries.insert(entry.content_id, entry);
            }
        }
    }

    /// Number of distinct content IDs accumulated.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries have been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the accumulated entries into an index block blob.
    ///
    /// The BTreeMap iterates in content-ID order, which is the on-disk sort
    /// order the reader's binary search depends on.
    pub fn build(&self) -> Bytes {
        let count = self.entries.len();
        let mut body = Vec::with_capacity(count * crate::format::ENTRY_SIZE);
        for entry in self.entries.values() {
            encode_entry(entry, &mut body);
        }

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let mut blob = Vec::with_capacity(HEADER_SIZE + body.len());
        blob.extend_from_slice(&INDEX_MAGIC.to_le_bytes());
        blob.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        blob.extend_from_slice(&0u16.to_le_bytes());
        blob.extend_from_slice(&(count as u32).to_le_bytes());
        blob.extend_from_slice(&crc.to_le_bytes());
        blob.extend_from_slice(&body);

        debug!(entries = count, bytes = blob.len(), "built index block");
        Bytes::from(blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PackBlockId;
    use crate::format::ENTRY_SIZE;

    #[test]
    fn empty_block_is_just_a_header() {
        let blob = IndexBuilder::new().build();
        assert_eq!(blob.len(), HEADER_SIZE);
    }

    #[test]
    fn block_size_is_exact() {
        let mut builder = IndexBuilder::new();
        for i in 0..10u8 {
            builder.add(ContentEntry::new_add(
                ContentId::from_bytes(&[i]),
                i as u64,
                PackBlockId::generate(),
                0,
                1,
            ));
        }
        let blob = builder.build();
        assert_eq!(blob.len(), HEADER_SIZE + 10 * ENTRY_SIZE);
    }

    #[test]
    fn duplicate_id_keeps_merge_winner() {
        let id = ContentId::from_bytes(b"dup");
        let mut builder = IndexBuilder::new();
        builder.add(ContentEntry::new_add(id, 200, PackBlockId::generate(), 0, 1));
        builder.add(ContentEntry::new_tombstone(id, 100));
        assert_eq!(builder.len(), 1);

        // The older tombstone must not replace the newer add.
        let blob = builder.build();
        let reader = crate::reader::IndexReader::open(blob).unwrap();
        let entry = reader.get(&id).unwrap();
        assert!(!entry.deleted);
        assert_eq!(entry.timestamp_ms, 200);
    }
}
