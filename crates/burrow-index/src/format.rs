//! On-disk constants and entry encode/decode for index blocks.
//!
//! All integers are little-endian. Entries are fixed-width so the reader can
//! binary-search without decoding the whole block.

use crate::entry::{ContentEntry, ContentId, PackBlockId};
use crate::error::{IndexError, IndexResult};

/// Index block magic: "BRIX".
pub const INDEX_MAGIC: u32 = 0x5852_4942;

/// Current index block format version.
pub const INDEX_VERSION: u16 = 1;

/// Header size in bytes: magic + version + reserved + entry count + CRC32.
pub const HEADER_SIZE: usize = 16;

/// Fixed encoded size of one entry:
/// content_id(32) + timestamp(8) + flags(1) + pack_id(16) + offset(4) + length(4).
pub const ENTRY_SIZE: usize = 65;

/// Flag bit marking a deletion tombstone.
pub const FLAG_DELETED: u8 = 0b0000_0001;

/// Appends the encoded form of one entry to `out`.
pub fn encode_entry(entry: &ContentEntry, out: &mut Vec<u8>) {
    out.reserve(ENTRY_SIZE);
    out.extend_from_slice(entry.content_id.as_bytes());
    out.extend_from_slice(&entry.timestamp_ms.to_le_bytes());
    out.push(if entry.deleted { FLAG_DELETED } else { 0 });
    out.extend_from_slice(entry.pack_block_id.as_bytes());
    out.extend_from_slice(&entry.pack_offset.to_le_bytes());
    out.extend_from_slice(&entry.length.to_le_bytes());
}

/// Decodes one entry from an exactly [`ENTRY_SIZE`]-byte slice.
pub fn decode_entry(buf: &[u8]) -> IndexResult<ContentEntry> {
    if buf.len() != ENTRY_SIZE {
        return Err(IndexError::Corrupt {
            reason: format!("entry slice is {} bytes, want {}", buf.len(), ENTRY_SIZE),
        });
    }

    let mut content_id = [0u8; 32];
    content_id.copy_from_slice(&buf[0..32]);
    let timestamp_ms = u64::from_le_bytes(buf[32..40].try_into().unwrap());
    let flags = buf[40];
    if flags & !FLAG_DELETED != 0 {
        return Err(IndexError::Corrupt {
            reason: format!("unknown entry flags {flags:#04x}"),
        });
    }
    let mut pack_id = [0u8; 16];
    pack_id.copy_from_slice(&buf[41..57]);
    let pack_offset = u32::from_le_bytes(buf[57..61].try_into().unwrap());
    let length = u32::from_le_bytes(buf[61..65].try_into().unwrap());

    Ok(ContentEntry {
        content_id: ContentId(content_id),
        timestamp_ms,
        deleted: flags & FLAG_DELETED != 0,
        pack_block_id: PackBlockId::from_slice(&pack_id),
        pack_offset,
        length,
    })
}
