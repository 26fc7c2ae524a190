//! AES-256-GCM and ChaCha20-Poly1305 AEAD layers.
//!
//! Ciphertext layout: 12-byte random nonce, then the AEAD output with its
//! 16-byte authentication tag appended. The content ID is the associated data
//! and also feeds HKDF per-content key derivation.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;
use rand::RngCore;

use crate::encryptor::Encryptor;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_content_key, EncryptionKey};

/// Nonce length in bytes for both supported ciphers.
pub const NONCE_LEN: usize = 12;

/// AEAD authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Fixed per-payload overhead of one AEAD layer: nonce plus tag.
pub const AEAD_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

fn random_nonce() -> [u8; NONCE_LEN] {
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Splits `nonce || body` ciphertext, rejecting anything too short to hold
/// the nonce and tag.
fn split_nonce(ciphertext: &[u8]) -> CryptoResult<(&[u8], &[u8])> {
    if ciphertext.len() < AEAD_OVERHEAD {
        return Err(CryptoError::CiphertextTooShort {
            len: ciphertext.len(),
            min: AEAD_OVERHEAD,
        });
    }
    Ok(ciphertext.split_at(NONCE_LEN))
}

/// AES-256-GCM layer — hardware accelerated on x86 with AES-NI.
pub struct Aes256GcmEncryptor {
    master_key: EncryptionKey,
}

impl Aes256GcmEncryptor {
    /// Creates the layer from a 256-bit master key.
    pub fn new(master_key: EncryptionKey) -> Self {
        Self { master_key }
    }
}

impl Encryptor for Aes256GcmEncryptor {
    fn encrypt(
        &self,
        plaintext: &[u8],
        content_id: &[u8],
        output: &mut Vec<u8>,
    ) -> CryptoResult<()> {
        let key = derive_content_key(&self.master_key, content_id);
        let cipher = Aes256Gcm::new_from_slice(&key.0)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let nonce = random_nonce();
        let body = cipher
            .encrypt(
                aes_gcm::Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: content_id,
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        output.reserve(NONCE_LEN + body.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&body);
        Ok(())
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        content_id: &[u8],
        output: &mut Vec<u8>,
    ) -> CryptoResult<()> {
        let (nonce, body) = split_nonce(ciphertext)?;
        let key = derive_content_key(&self.master_key, content_id);
        let cipher = Aes256Gcm::new_from_slice(&key.0)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let plaintext = cipher
            .decrypt(
                aes_gcm::Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: content_id,
                },
            )
            .map_err(|_| CryptoError::AuthFailed)?;
        output.extend_from_slice(&plaintext);
        Ok(())
    }

    fn overhead(&self) -> usize {
        AEAD_OVERHEAD
    }
}

/// ChaCha20-Poly1305 layer — constant-time, fast on non-AES hardware.
pub struct ChaCha20Poly1305Encryptor {
    master_key: EncryptionKey,
}

impl ChaCha20Poly1305Encryptor {
    /// Creates the layer from a 256-bit master key.
    pub fn new(master_key: EncryptionKey) -> Self {
        Self { master_key }
    }
}

impl Encryptor for ChaCha20Poly1305Encryptor {
    fn encrypt(
        &self,
        plaintext: &[u8],
        content_id: &[u8],
        output: &mut Vec<u8>,
    ) -> CryptoResult<()> {
        use chacha20poly1305::aead::{Aead as _, Payload};
        use chacha20poly1305::KeyInit as _;

        let key = derive_content_key(&self.master_key, content_id);
        let cipher = ChaCha20Poly1305::new_from_slice(&key.0)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let nonce = random_nonce();
        let body = cipher
            .encrypt(
                chacha20poly1305::Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: content_id,
                },
            )
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        output.reserve(NONCE_LEN + body.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&body);
        Ok(())
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        content_id: &[u8],
        output: &mut Vec<u8>,
    ) -> CryptoResult<()> {
        use chacha20poly1305::aead::{Aead as _, Payload};
        use chacha20poly1305::KeyInit as _;

        let (nonce, body) = split_nonce(ciphertext)?;
        let key = derive_content_key(&self.master_key, content_id);
        let cipher = ChaCha20Poly1305::new_from_slice(&key.0)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let plaintext = cipher
            .decrypt(
                chacha20poly1305::Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: content_id,
                },
            )
            .map_err(|_| CryptoError::AuthFailed)?;
        output.extend_from_slice(&plaintext);
        Ok(())
    }

    fn overhead(&self) -> usize {
        AEAD_OVERHEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_key() -> EncryptionKey {
        EncryptionKey([42u8; 32])
    }

    proptest! {
        #[test]
        fn prop_aesgcm_roundtrip(data in prop::collection::vec(0u8..=255, 0..65_536)) {
            let e = Aes256GcmEncryptor::new(test_key());
            let mut ct = Vec::new();
            e.encrypt(&data, b"cid", &mut ct).unwrap();
            let mut pt = Vec::new();
            e.decrypt(&ct, b"cid", &mut pt).unwrap();
            prop_assert_eq!(pt, data);
        }
        #[test]
        fn prop_chacha_roundtrip(data in prop::collection::vec(0u8..=255, 0..65_536)) {
            let e = ChaCha20Poly1305Encryptor::new(test_key());
            let mut ct = Vec::new();
            e.encrypt(&data, b"cid", &mut ct).unwrap();
            let mut pt = Vec::new();
            e.decrypt(&ct, b"cid", &mut pt).unwrap();
            prop_assert_eq!(pt, data);
        }
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let e = Aes256GcmEncryptor::new(test_key());
        let mut ct = Vec::new();
        e.encrypt(b"", b"cid", &mut ct).unwrap();
        assert_eq!(ct.len(), AEAD_OVERHEAD);
        let mut pt = Vec::new();
        e.decrypt(&ct, b"cid", &mut pt).unwrap();
        assert!(pt.is_empty());
    }

    #[test]
    fn overhead_matches_ciphertext_expansion() {
        let e = Aes256GcmEncryptor::new(test_key());
        let mut ct = Vec::new();
        e.encrypt(b"12345", b"cid", &mut ct).unwrap();
        assert_eq!(ct.len(), 5 + e.overhead());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let e = Aes256GcmEncryptor::new(test_key());
        let mut ct = Vec::new();
        e.encrypt(b"secret", b"cid", &mut ct).unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        let mut pt = Vec::new();
        assert!(matches!(
            e.decrypt(&ct, b"cid", &mut pt),
            Err(CryptoError::AuthFailed)
        ));
        assert!(pt.is_empty());
    }

    #[test]
    fn relocated_content_id_fails() {
        // Ciphertext written for one content ID must not decrypt under another.
        let e = Aes256GcmEncryptor::new(test_key());
        let mut ct = Vec::new();
        e.encrypt(b"secret", b"cid-a", &mut ct).unwrap();
        let mut pt = Vec::new();
        assert!(matches!(
            e.decrypt(&ct, b"cid-b", &mut pt),
            Err(CryptoError::AuthFailed)
        ));
    }

    #[test]
    fn wrong_master_key_fails() {
        let e = ChaCha20Poly1305Encryptor::new(test_key());
        let mut ct = Vec::new();
        e.encrypt(b"secret", b"cid", &mut ct).unwrap();
        let wrong = ChaCha20Poly1305Encryptor::new(EncryptionKey([99u8; 32]));
        let mut pt = Vec::new();
        assert!(matches!(
            wrong.decrypt(&ct, b"cid", &mut pt),
            Err(CryptoError::AuthFailed)
        ));
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        let e = Aes256GcmEncryptor::new(test_key());
        let mut pt = Vec::new();
        assert!(matches!(
            e.decrypt(&[0u8; 10], b"cid", &mut pt),
            Err(CryptoError::CiphertextTooShort { len: 10, min: 28 })
        ));
    }
}
