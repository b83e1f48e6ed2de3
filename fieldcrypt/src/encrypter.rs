//! Encrypter and decrypter abstractions.

use crate::envelope::EncryptionResult;
use crate::error::Result;

/// Performs encryption for one algorithm and one key.
///
/// Implementations must be thread-safe (`Send + Sync`) so a registered
/// encrypter can serve concurrent documents.
pub trait Encrypter: Send + Sync {
    /// Encrypts the given message.
    ///
    /// The result names the algorithm whose decrypter can reverse it and
    /// carries whatever that decrypter needs, such as the key identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be resolved or encryption fails.
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptionResult>;
}

/// Reverses the encryption of one algorithm, for any key it can resolve.
pub trait Decrypter: Send + Sync {
    /// Decrypts an encryption result produced by a matching encrypter.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing, the key cannot be
    /// resolved, or the ciphertext fails verification.
    fn decrypt(&self, encrypted: &EncryptionResult) -> Result<Vec<u8>>;

    /// Returns the algorithm identifier this decrypter handles.
    fn algorithm(&self) -> &str;
}
