#![warn(missing_docs)]

//! Burrow encryption pipeline: composable AEAD layers with HKDF key derivation.
//!
//! Every payload leaving the engine passes through an [`Encryptor`]. The
//! content ID is bound into each operation (per-content key derivation plus
//! associated data), so ciphertext cannot be silently relocated to a different
//! content identity. Layers compose via [`LayeredEncryptor`], strictly
//! inner-then-outer on encrypt and the exact mirror on decrypt.

pub mod aead;
pub mod encryptor;
pub mod error;
pub mod key;
pub mod layered;

pub use aead::{Aes256GcmEncryptor, ChaCha20Poly1305Encryptor, AEAD_OVERHEAD};
pub use encryptor::{Encryptor, NullEncryptor};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_content_key, EncryptionKey};
pub use layered::LayeredEncryptor;
