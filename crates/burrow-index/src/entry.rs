//! Content identifiers, block identifiers, and the index entry record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 32-byte content-derived hash identifying a logical content item.
/// Stable across deduplication: the same bytes always hash to the same ID.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ContentId(pub [u8; 32]);

impl ContentId {
    /// Derives the content ID of a payload by hashing it with BLAKE3.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Parses a 64-character lowercase hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }

    /// Returns the ID as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Returns the raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Identifier of an append-only pack blob holding encrypted payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackBlockId(Uuid);

impl PackBlockId {
    /// Generates a fresh random pack block ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero ID used in tombstone entries, which reference no pack.
    pub fn zero() -> Self {
        Self(Uuid::nil())
    }

    /// True for the all-zero tombstone placeholder.
    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the 16 raw bytes of the ID.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Reconstructs an ID from its 16 raw bytes.
    pub fn from_slice(bytes: &[u8; 16]) -> Self {
        Self(Uuid::from_bytes(*bytes))
    }

    /// Parses the simple hex form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl std::fmt::Display for PackBlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Identifier of a serialized index block blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PhysicalBlockId(Uuid);

impl PhysicalBlockId {
    /// Generates a fresh random physical block ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reconstructs an ID from its 16 raw bytes.
    pub fn from_slice(bytes: &[u8; 16]) -> Self {
        Self(Uuid::from_bytes(*bytes))
    }

    /// Returns the 16 raw bytes of the ID.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Parses the simple hex form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl std::fmt::Display for PhysicalBlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// One immutable record in an index block: either an add locating content
/// bytes inside a pack blob, or a deletion tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Content-derived hash this entry describes.
    pub content_id: ContentId,
    /// Write time in milliseconds since the UNIX epoch. Monotonically
    /// informative, not globally ordered across processes.
    pub timestamp_ms: u64,
    /// True if this entry is a deletion tombstone.
    pub deleted: bool,
    /// Pack blob holding the bytes; zero for tombstones.
    pub pack_block_id: PackBlockId,
    /// Byte offset of the payload within the pack blob.
    pub pack_offset: u32,
    /// Payload length in bytes.
    pub length: u32,
}

impl ContentEntry {
    /// Creates an add entry locating content inside a pack blob.
    pub fn new_add(
        content_id: ContentId,
        timestamp_ms: u64,
        pack_block_id: PackBlockId,
        pack_offset: u32,
        length: u32,
    ) -> Self {
        Self {
            content_id,
            timestamp_ms,
            deleted: false,
            pack_block_id,
            pack_offset,
            length,
        }
    }

    /// Creates a deletion tombstone.
    pub fn new_tombstone(content_id: ContentId, timestamp_ms: u64) -> Self {
        Self {
            content_id,
            timestamp_ms,
            deleted: true,
            pack_block_id: PackBlockId::zero(),
            pack_offset: 0,
            length: 0,
        }
    }

    /// True if this entry wins a merge conflict against `other` for the same
    /// content ID.
    ///
    /// Resolution is by timestamp only, never block arrival order. Equal
    /// timestamps break toward the tombstone, then by pack block ID, so the
    /// merged view is a pure function of the entry multiset.
    pub fn supersedes(&self, other: &ContentEntry) -> bool {
        if self.timestamp_ms != other.timestamp_ms {
            return self.timestamp_ms > other.timestamp_ms;
        }
        if self.deleted != other.deleted {
            return self.deleted;
        }
        if self.pack_block_id != other.pack_block_id {
            return self.pack_block_id > other.pack_block_id;
        }
        (self.pack_offset, self.length) > (other.pack_offset, other.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_hex_roundtrip() {
        let id = ContentId::from_bytes(b"some payload");
        let hex = id.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(ContentId::from_hex(&hex), Some(id));
    }

    #[test]
    fn content_id_rejects_bad_hex() {
        assert!(ContentId::from_hex("zz").is_none());
        assert!(ContentId::from_hex(&"g".repeat(64)).is_none());
    }

    #[test]
    fn same_payload_same_id() {
        assert_eq!(ContentId::from_bytes(b"x"), ContentId::from_bytes(b"x"));
        assert_ne!(ContentId::from_bytes(b"x"), ContentId::from_bytes(b"y"));
    }

    #[test]
    fn pack_id_raw_roundtrip() {
        let id = PackBlockId::generate();
        assert_eq!(PackBlockId::from_slice(id.as_bytes()), id);
        assert!(!id.is_zero());
        assert!(PackBlockId::zero().is_zero());
    }

    #[test]
    fn physical_id_parse_roundtrip() {
        let id = PhysicalBlockId::generate();
        assert_eq!(PhysicalBlockId::parse(&id.to_string()), Some(id));
    }

    #[test]
    fn newer_timestamp_supersedes() {
        let id = ContentId::from_bytes(b"c");
        let old = ContentEntry::new_add(id, 100, PackBlockId::generate(), 0, 4);
        let new = ContentEntry::new_tombstone(id, 200);
        assert!(new.supersedes(&old));
        assert!(!old.supersedes(&new));
    }

    #[test]
    fn equal_timestamp_breaks_toward_tombstone() {
        let id = ContentId::from_bytes(b"c");
        let add = ContentEntry::new_add(id, 100, PackBlockId::generate(), 0, 4);
        let del = ContentEntry::new_tombstone(id, 100);
        assert!(del.supersedes(&add));
        assert!(!add.supersedes(&del));
    }

    #[test]
    fn tie_break_is_antisymmetric() {
        let id = ContentId::from_bytes(b"c");
        let a = ContentEntry::new_add(id, 100, PackBlockId::generate(), 0, 4);
        let b = ContentEntry::new_add(id, 100, PackBlockId::generate(), 8, 4);
        assert_ne!(a.supersedes(&b), b.supersedes(&a));
    }
}
