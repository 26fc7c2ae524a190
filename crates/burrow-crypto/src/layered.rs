//! Composition of two encryptor layers.

use std::sync::Arc;

use crate::encryptor::Encryptor;
use crate::error::CryptoResult;

/// Two-layer encryptor: the inner transform runs first on encrypt, the outer
/// transform last. Decrypt is the exact mirror — outer first, then inner.
///
/// The ordering is a correctness invariant: reversing either direction yields
/// ciphertext or plaintext that does not match. Chains deeper than two layers
/// are built by nesting (a `LayeredEncryptor` as the inner or outer of
/// another).
pub struct LayeredEncryptor {
    inner: Arc<dyn Encryptor>,
    outer: Arc<dyn Encryptor>,
}

impl LayeredEncryptor {
    /// Composes `inner` and `outer` into one layer.
    pub fn new(inner: Arc<dyn Encryptor>, outer: Arc<dyn Encryptor>) -> Self {
        Self { inner, outer }
    }
}

impl Encryptor for LayeredEncryptor {
    fn encrypt(
        &self,
        plaintext: &[u8],
        content_id: &[u8],
        output: &mut Vec<u8>,
    ) -> CryptoResult<()> {
        let mut tmp = Vec::with_capacity(plaintext.len());
        self.inner.encrypt(plaintext, content_id, &mut tmp)?;
        self.outer.encrypt(&tmp, content_id, output)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        content_id: &[u8],
        output: &mut Vec<u8>,
    ) -> CryptoResult<()> {
        let mut tmp = Vec::with_capacity(ciphertext.len());
        self.outer.decrypt(ciphertext, content_id, &mut tmp)?;
        self.inner.decrypt(&tmp, content_id, output)
    }

    /// A wrapper has no fixed overhead of its own.
    fn overhead(&self) -> usize {
        panic!("LayeredEncryptor has no fixed overhead; query the concrete layers");
    }
}
