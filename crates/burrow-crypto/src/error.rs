//! Error types for the encryption pipeline.

/// Result type alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// All errors that can occur inside the encryption pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Cipher setup or encryption rejected the input.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
    /// Authentication tag mismatch — ciphertext corrupted, tampered with, or
    /// bound to a different content ID.
    #[error("decryption failed: authentication tag mismatch")]
    AuthFailed,
    /// Ciphertext is too short to contain the nonce and tag.
    #[error("ciphertext truncated: {len} bytes, need at least {min}")]
    CiphertextTooShort {
        /// Actual ciphertext length.
        len: usize,
        /// Minimum length the layer requires.
        min: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_message_mentions_tag() {
        assert!(format!("{}", CryptoError::AuthFailed).contains("authentication tag"));
    }

    #[test]
    fn too_short_reports_lengths() {
        let err = CryptoError::CiphertextTooShort { len: 5, min: 28 };
        let msg = format!("{err}");
        assert!(msg.contains('5'));
        assert!(msg.contains("28"));
    }
}
