#![warn(missing_docs)]

//! Burrow index block format.
//!
//! An index block is an immutable table mapping content IDs to physical byte
//! ranges inside pack blobs, sorted by content ID ascending, serialized as a
//! single blob. Fixed-width entries make point lookups a binary search and
//! multi-block scans merge-compatible.
//!
//! ## Block layout (v1)
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │ HEADER (16 bytes)                              │
//! │ magic (u32 LE) | version (u16) | reserved (u16)│
//! │ entry_count (u32 LE) | entries_crc32 (u32 LE)  │
//! ├────────────────────────────────────────────────┤
//! │ ENTRIES (entry_count × 65 bytes, sorted)       │
//! │ content_id (32) | timestamp_ms (u64 LE)        │
//! │ flags (u8) | pack_block_id (16)                │
//! │ pack_offset (u32 LE) | length (u32 LE)         │
//! └────────────────────────────────────────────────┘
//! ```
//!
//! The blob length must equal `16 + entry_count * 65` exactly and the CRC32
//! of the entries region must match the header, so truncation or corruption
//! is detected at open time rather than surfacing as missing entries.

pub mod builder;
pub mod entry;
pub mod error;
pub mod format;
pub mod reader;

pub use builder::IndexBuilder;
pub use entry::{ContentEntry, ContentId, PackBlockId, PhysicalBlockId};
pub use error::{IndexError, IndexResult};
pub use format::{ENTRY_SIZE, HEADER_SIZE, INDEX_MAGIC, INDEX_VERSION};
pub use reader::IndexReader;
