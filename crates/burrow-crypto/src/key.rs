//! Key material and HKDF-SHA256 per-content key derivation.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// 256-bit (32-byte) encryption key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey(pub [u8; 32]);

impl EncryptionKey {
    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionKey([REDACTED])")
    }
}

/// Derive a per-content key from the master key and the content ID using
/// HKDF-SHA256. Binding the ID into the key means ciphertext decrypts only
/// under the identity it was written for.
pub fn derive_content_key(master_key: &EncryptionKey, content_id: &[u8]) -> EncryptionKey {
    let hk = Hkdf::<Sha256>::new(None, &master_key.0);
    let mut okm = [0u8; 32];
    let mut info = Vec::with_capacity(18 + content_id.len());
    info.extend_from_slice(b"burrow-content-key");
    info.extend_from_slice(content_id);
    hk.expand(&info, &mut okm).expect("HKDF expand failed");
    EncryptionKey(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let master = EncryptionKey([7u8; 32]);
        assert_eq!(
            derive_content_key(&master, b"c1").0,
            derive_content_key(&master, b"c1").0
        );
    }

    #[test]
    fn different_content_ids_get_different_keys() {
        let master = EncryptionKey([7u8; 32]);
        let k1 = derive_content_key(&master, b"c1");
        let k2 = derive_content_key(&master, b"c2");
        assert_ne!(k1.0, k2.0);
    }

    #[test]
    fn different_masters_get_different_keys() {
        let k1 = derive_content_key(&EncryptionKey([1u8; 32]), b"c1");
        let k2 = derive_content_key(&EncryptionKey([2u8; 32]), b"c1");
        assert_ne!(k1.0, k2.0);
    }

    #[test]
    fn debug_redacts_key_material() {
        let key = EncryptionKey([0xab; 32]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("ab"));
    }
}
