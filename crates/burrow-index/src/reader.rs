//! Reading serialized index blocks without eager decoding.

use std::ops::ControlFlow;

use bytes::Bytes;

use crate::entry::{ContentEntry, ContentId};
use crate::error::{IndexError, IndexResult};
use crate::format::{decode_entry, ENTRY_SIZE, HEADER_SIZE, INDEX_MAGIC, INDEX_VERSION};

/// Read handle over one serialized index block.
///
/// `open` validates the frame (magic, version, exact length, checksum) up
/// front; individual entries decode lazily on access. Point lookups binary
/// search the fixed-width entry region by content ID.
#[derive(Debug, Clone)]
pub struct IndexReader {
    data: Bytes,
    count: usize,
}

impl IndexReader {
    /// Opens a serialized index block, validating its structure.
    ///
    /// Corrupt or truncated blobs fail here with a distinct error, never by
    /// silently truncating results later.
    pub fn open(data: Bytes) -> IndexResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(IndexError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let magic = u32::from_le_bytes(data[0..4].try_into().unwrap());
        if magic != INDEX_MAGIC {
            return Err(IndexError::BadMagic { found: magic });
        }

        let version = u16::from_le_bytes(data[4..6].try_into().unwrap());
        if version != INDEX_VERSION {
            return Err(IndexError::UnsupportedVersion { found: version });
        }

        let count = u32::from_le_bytes(data[8..12].try_into().unwrap()) as usize;
        let expected_len = HEADER_SIZE + count * ENTRY_SIZE;
        if data.len() != expected_len {
            return Err(IndexError::Truncated {
                expected: expected_len,
                actual: data.len(),
            });
        }

        let expected_crc = u32::from_le_bytes(data[12..16].try_into().unwrap());
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data[HEADER_SIZE..]);
        let actual_crc = hasher.finalize();
        if actual_crc != expected_crc {
            return Err(IndexError::ChecksumMismatch {
                expected: expected_crc,
                actual: actual_crc,
            });
        }

        Ok(Self { data, count })
    }

    /// Number of entries in the block.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if the block holds no entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The validated serialized bytes of the block (cheap clone).
    pub fn as_bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// The latest entry timestamp in the block, or 0 when empty. Used as the
    /// block's own timestamp for inspection listings.
    pub fn latest_timestamp_ms(&self) -> u64 {
        self.entries()
            .filter_map(|e| e.ok())
            .map(|e| e.timestamp_ms)
            .max()
            .unwrap_or(0)
    }

    /// Raw content-ID bytes of the entry at `idx`, without full decode.
    fn id_bytes_at(&self, idx: usize) -> &[u8] {
        let start = HEADER_SIZE + idx * ENTRY_SIZE;
        &self.data[start..start + 32]
    }

    /// Decodes the entry at `idx`. The frame was validated at open time, so
    /// only a logically corrupt entry body can fail here.
    pub fn entry_at(&self, idx: usize) -> IndexResult<ContentEntry> {
        let start = HEADER_SIZE + idx * ENTRY_SIZE;
        decode_entry(&self.data[start..start + ENTRY_SIZE])
    }

    /// Binary search for an exact content ID.
    pub fn get(&self, content_id: &ContentId) -> Option<ContentEntry> {
        let target = content_id.as_bytes().as_slice();
        let mut lo = 0usize;
        let mut hi = self.count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.id_bytes_at(mid).cmp(target) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return self.entry_at(mid).ok(),
            }
        }
        None
    }

    /// Index of the first entry whose content ID is >= `cursor`
    /// (lexicographic over raw hash bytes; a short cursor acts as a prefix).
    fn partition_point(&self, cursor: &[u8]) -> usize {
        let mut lo = 0usize;
        let mut hi = self.count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.id_bytes_at(mid) < cursor {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Iterates entries in content-ID order starting from `cursor` (empty
    /// cursor iterates everything), invoking the callback per entry. The
    /// callback may break to stop early; decode errors also stop iteration.
    pub fn iterate<F>(&self, cursor: &[u8], mut f: F) -> IndexResult<()>
    where
        F: FnMut(&ContentEntry) -> ControlFlow<()>,
    {
        for idx in self.partition_point(cursor)..self.count {
            let entry = self.entry_at(idx)?;
            if let ControlFlow::Break(()) = f(&entry) {
                break;
            }
        }
        Ok(())
    }

    /// Convenience iterator over all decoded entries in content-ID order.
    pub fn entries(&self) -> impl Iterator<Item = IndexResult<ContentEntry>> + '_ {
        (0..self.count).map(move |idx| self.entry_at(idx))
    }
}
