#![warn(missing_docs)]

//! Burrow blob store boundary: abstract put/get/list/delete over opaque blobs.
//!
//! Everything the engine persists goes through [`BlobStore`]. The trait assumes
//! all-or-nothing puts (no partial blob ever becomes visible) and list-after-put
//! visibility sufficient to discover newly published blobs by prefix.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{BlobError, BlobResult};
pub use memory::{MemoryBlobStore, MemoryStoreStats};
pub use store::{BlobId, BlobStore};
