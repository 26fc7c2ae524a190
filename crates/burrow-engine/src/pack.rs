//! Assembly of append-only pack blobs.

use bytes::Bytes;
use burrow_index::PackBlockId;
use tracing::debug;

/// Builds one pack blob by appending encrypted payloads and recording the
/// byte range each occupies. Sealed by converting into bytes; never mutated
/// after upload.
#[derive(Debug)]
pub struct PackAssembler {
    id: PackBlockId,
    buffer: Vec<u8>,
}

impl PackAssembler {
    /// Starts a new pack with a fresh random ID.
    pub fn new() -> Self {
        Self {
            id: PackBlockId::generate(),
            buffer: Vec::new(),
        }
    }

    /// This pack's ID.
    pub fn id(&self) -> PackBlockId {
        self.id
    }

    /// Appends one encrypted payload, returning its `(offset, length)` range
    /// within the pack.
    pub fn append(&mut self, ciphertext: &[u8]) -> (u32, u32) {
        let offset = self.buffer.len() as u32;
        self.buffer.extend_from_slice(ciphertext);
        (offset, ciphertext.len() as u32)
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Seals the pack and returns its bytes for upload.
    pub fn into_bytes(self) -> Bytes {
        debug!(pack = %self.id, bytes = self.buffer.len(), "sealed pack blob");
        Bytes::from(self.buffer)
    }
}

impl Default for PackAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_records_contiguous_ranges() {
        let mut pack = PackAssembler::new();
        assert!(pack.is_empty());

        let (off1, len1) = pack.append(b"aaaa");
        let (off2, len2) = pack.append(b"bb");
        assert_eq!((off1, len1), (0, 4));
        assert_eq!((off2, len2), (4, 2));
        assert_eq!(pack.len(), 6);

        let bytes = pack.into_bytes();
        assert_eq!(&bytes[..], b"aaaabb");
    }

    #[test]
    fn zero_length_payload_is_recorded() {
        let mut pack = PackAssembler::new();
        pack.append(b"xy");
        let (off, len) = pack.append(b"");
        assert_eq!((off, len), (2, 0));
    }

    #[test]
    fn fresh_packs_get_distinct_ids() {
        assert_ne!(PackAssembler::new().id(), PackAssembler::new().id());
    }
}
