//! The encryptor capability trait and the pass-through layer.

use crate::error::CryptoResult;

/// One layer of the encryption pipeline.
///
/// `encrypt` and `decrypt` append their output to the caller's buffer so
/// layers can be chained without intermediate allocations at the call site.
/// The content ID is bound into both operations; decrypting under a different
/// ID must fail.
pub trait Encryptor: Send + Sync {
    /// Encrypts `plaintext` for `content_id`, appending ciphertext to `output`.
    fn encrypt(&self, plaintext: &[u8], content_id: &[u8], output: &mut Vec<u8>)
        -> CryptoResult<()>;

    /// Decrypts `ciphertext` written for `content_id`, appending plaintext to
    /// `output`. Fails on any integrity violation; no partial output is valid.
    fn decrypt(&self, ciphertext: &[u8], content_id: &[u8], output: &mut Vec<u8>)
        -> CryptoResult<()>;

    /// Fixed number of bytes this layer adds to the plaintext, used for
    /// buffer pre-sizing.
    ///
    /// # Panics
    ///
    /// Layers without a well-defined fixed overhead panic instead of returning
    /// a misleading estimate.
    fn overhead(&self) -> usize;
}

/// Pass-through layer for plaintext-format repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEncryptor;

impl Encryptor for NullEncryptor {
    fn encrypt(
        &self,
        plaintext: &[u8],
        _content_id: &[u8],
        output: &mut Vec<u8>,
    ) -> CryptoResult<()> {
        output.extend_from_slice(plaintext);
        Ok(())
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        _content_id: &[u8],
        output: &mut Vec<u8>,
    ) -> CryptoResult<()> {
        output.extend_from_slice(ciphertext);
        Ok(())
    }

    fn overhead(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_encryptor_is_identity() {
        let e = NullEncryptor;
        let mut ct = Vec::new();
        e.encrypt(b"data", b"c1", &mut ct).unwrap();
        assert_eq!(ct, b"data");

        let mut pt = Vec::new();
        e.decrypt(&ct, b"c1", &mut pt).unwrap();
        assert_eq!(pt, b"data");
        assert_eq!(e.overhead(), 0);
    }

    #[test]
    fn output_is_appended_not_replaced() {
        let e = NullEncryptor;
        let mut buf = b"prefix-".to_vec();
        e.encrypt(b"data", b"c1", &mut buf).unwrap();
        assert_eq!(buf, b"prefix-data");
    }
}
