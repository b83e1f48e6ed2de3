//! AEAD_AES_256_CBC_HMAC_SHA512 encrypters and decrypters backed by a keyring.

use crate::aead;
use crate::encrypter::{Decrypter, Encrypter};
use crate::envelope::EncryptionResult;
use crate::error::{Error, Result};
use crate::key::Keyring;
use std::sync::Arc;

/// Algorithm identifier written to the `alg` field.
pub const ALGORITHM_NAME: &str = "AEAD_AES_256_CBC_HMAC_SHA512";

/// Encryption result field holding the key identifier.
pub const KEY_ID_FIELD: &str = "kid";

/// Encryption result field holding the base64 ciphertext.
pub const CIPHERTEXT_FIELD: &str = "ciphertext";

/// Creates encrypters and decrypters for AES-256-CBC with HMAC-SHA-512.
///
/// Requires 64-byte keys. See [`crate::aead`] for the construction.
///
/// # Example
///
/// ```
/// use fieldcrypt::key::{InsecureKeyring, Key};
/// use fieldcrypt::provider::AeadAes256CbcHmacSha512Provider;
/// use std::sync::Arc;
///
/// let keyring = Arc::new(InsecureKeyring::from_keys([Key::new("k", vec![0u8; 64])]));
/// let provider = AeadAes256CbcHmacSha512Provider::new(keyring);
///
/// let encrypter = provider.encrypter_for_key("k");
/// let decrypter = provider.decrypter();
///
/// let encrypted = encrypter.encrypt(b"secret")?;
/// assert_eq!(decrypter.decrypt(&encrypted)?, b"secret");
/// # Ok::<(), fieldcrypt::error::Error>(())
/// ```
#[derive(Clone)]
pub struct AeadAes256CbcHmacSha512Provider {
    keyring: Arc<dyn Keyring>,
}

impl AeadAes256CbcHmacSha512Provider {
    /// Creates a provider that obtains keys from `keyring`.
    pub fn new(keyring: Arc<dyn Keyring>) -> Self {
        Self { keyring }
    }

    /// Creates an encrypter for the key with the given identifier.
    ///
    /// The key is not looked up until the first encryption, so a missing key
    /// surfaces as `Error::KeyNotFound` from [`Encrypter::encrypt`].
    #[must_use]
    pub fn encrypter_for_key(&self, key_id: impl Into<String>) -> Arc<dyn Encrypter> {
        Arc::new(AeadAes256CbcHmacSha512Encrypter {
            key_id: key_id.into(),
            keyring: Arc::clone(&self.keyring),
        })
    }

    /// Creates a decrypter for this algorithm.
    #[must_use]
    pub fn decrypter(&self) -> Arc<dyn Decrypter> {
        Arc::new(AeadAes256CbcHmacSha512Decrypter { keyring: Arc::clone(&self.keyring) })
    }
}

struct AeadAes256CbcHmacSha512Encrypter {
    key_id: String,
    keyring: Arc<dyn Keyring>,
}

impl Encrypter for AeadAes256CbcHmacSha512Encrypter {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptionResult> {
        let key = self.keyring.get(&self.key_id)?;
        let ciphertext = aead::encrypt(key.bytes(), plaintext, &[])?;

        let mut result = EncryptionResult::new(ALGORITHM_NAME);
        result.put(KEY_ID_FIELD, self.key_id.as_str())?;
        result.put_bytes(CIPHERTEXT_FIELD, &ciphertext)?;
        Ok(result)
    }
}

struct AeadAes256CbcHmacSha512Decrypter {
    keyring: Arc<dyn Keyring>,
}

impl Decrypter for AeadAes256CbcHmacSha512Decrypter {
    fn decrypt(&self, encrypted: &EncryptionResult) -> Result<Vec<u8>> {
        let key_id = encrypted.get(KEY_ID_FIELD).ok_or_else(|| {
            Error::DecryptionFailure("failed to get key ID from encrypted node".to_string())
        })?;
        let ciphertext = encrypted.get_bytes(CIPHERTEXT_FIELD)?.ok_or_else(|| {
            Error::DecryptionFailure("failed to get ciphertext from encrypted node".to_string())
        })?;

        let key = self.keyring.get(key_id)?;
        aead::decrypt(key.bytes(), &ciphertext, &[])
    }

    fn algorithm(&self) -> &str {
        ALGORITHM_NAME
    }
}
