//! Error types for field-level encryption operations.

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for `fieldcrypt` operations.
///
/// Every component reports the most specific variant it can determine; the
/// document engine propagates these unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The keyring has no key with the requested identifier
    #[error("crypto key not found: {0}")]
    KeyNotFound(String),

    /// Key material has the wrong length for the algorithm
    #[error("invalid crypto key: {0}")]
    InvalidKey(String),

    /// Ciphertext is malformed, truncated or not valid base64
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Authentication failed, padding was invalid, or the encrypted node is incomplete
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    /// A field could not be encrypted (empty or unresolvable path)
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),

    /// No encrypter is registered under the alias and there is no default
    #[error("encrypter not found: {0}")]
    EncrypterNotFound(String),

    /// No decrypter is registered for the algorithm named by an encrypted node
    #[error("decryption failed: no decrypter registered for algorithm {0}")]
    AlgorithmNotFound(String),

    /// A crypto manager is required but none was configured
    #[error("crypto manager is not set, cannot use transcoder with field-level encryption")]
    ManagerMissing,

    /// Attempt to overwrite a reserved encryption result field
    #[error("`{0}` is a reserved field")]
    ReservedField(String),

    /// An encrypter is already registered under this alias
    #[error("encrypter alias already registered: {0}")]
    AliasAlreadyRegistered(String),

    /// A decrypter is already registered for this algorithm
    #[error("decrypter already registered for algorithm: {0}")]
    AlgorithmAlreadyRegistered(String),

    /// The document serializer failed
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The encoded value does not carry the flags this codec expects
    #[error("decoding failed: transcoder expects JSON common flags, flags={flags:#010x}")]
    DecodingFailure {
        /// The flags found on the encoded value
        flags: u32,
    },
}

impl Error {
    /// Returns `true` if the error should be surfaced as a decryption failure.
    ///
    /// A missing decrypter is reported the same way as a failed one.
    #[must_use]
    pub const fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::DecryptionFailure(_) | Self::AlgorithmNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_not_found_is_decryption_failure() {
        assert!(Error::AlgorithmNotFound("ROT13".to_string()).is_decryption_failure());
        assert!(Error::DecryptionFailure("bad tag".to_string()).is_decryption_failure());
        assert!(!Error::KeyNotFound("k".to_string()).is_decryption_failure());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(Error::KeyNotFound("test-key".into()).to_string(), "crypto key not found: test-key");
        assert_eq!(Error::ReservedField("alg".into()).to_string(), "`alg` is a reserved field");
        assert_eq!(
            Error::DecodingFailure { flags: 0x0300_0000 }.to_string(),
            "decoding failed: transcoder expects JSON common flags, flags=0x03000000"
        );
    }
}
