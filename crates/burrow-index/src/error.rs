//! Error types for the index block format.

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Error variants raised while opening or decoding index blocks.
///
/// Every variant means the block failed structural validation; retrying will
/// not fix corrupted bytes, so callers surface these rather than retry.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The blob does not start with the index magic number.
    #[error("bad index magic: {found:#010x}")]
    BadMagic {
        /// The magic value actually found.
        found: u32,
    },

    /// The format version is not one this reader understands.
    #[error("unsupported index version: {found}")]
    UnsupportedVersion {
        /// The version actually found.
        found: u16,
    },

    /// The blob length does not match the entry count in the header.
    #[error("truncated index block: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Length the header implies.
        expected: usize,
        /// Length actually present.
        actual: usize,
    },

    /// The entries region does not match its checksum.
    #[error("index checksum mismatch: expected {expected:#010x}, actual {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum recorded in the header.
        expected: u32,
        /// Checksum computed over the entries region.
        actual: u32,
    },

    /// Structural invariant violated inside the entries region.
    #[error("corrupt index block: {reason}")]
    Corrupt {
        /// Description of the violation.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_diagnostics() {
        let err = IndexError::Truncated {
            expected: 81,
            actual: 80,
        };
        let msg = format!("{err}");
        assert!(msg.contains("81"));
        assert!(msg.contains("80"));

        let err = IndexError::BadMagic { found: 0xdeadbeef };
        assert!(format!("{err}").contains("0xdeadbeef"));
    }
}
