//! Self-describing encryption results.
//!
//! An encryption result is a flat map of strings. It is what an encrypter
//! produces, what a decrypter consumes, and exactly what gets spliced into a
//! document under a mangled field name:
//!
//! ```text
//! {
//!   "alg": "AEAD_AES_256_CBC_HMAC_SHA512",
//!   "kid": "test-key",
//!   "ciphertext": "GvOMLcK5b/3YZ..."
//! }
//! ```
//!
//! The `alg` entry is set once at construction and selects the decrypter.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::BTreeMap;

/// Name of the reserved entry holding the algorithm identifier.
pub const ALGORITHM_FIELD: &str = "alg";

/// Ciphertext plus the metadata needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResult {
    fields: BTreeMap<String, String>,
}

impl EncryptionResult {
    /// Creates an encryption result for the given algorithm.
    #[must_use]
    pub fn new(algorithm: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(ALGORITHM_FIELD.to_string(), algorithm.into());
        Self { fields }
    }

    /// Wraps an encrypted node read back from a document.
    ///
    /// The node is taken as-is; a missing `alg` entry surfaces later from
    /// [`algorithm`](Self::algorithm).
    #[must_use]
    pub const fn from_map(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }

    /// Returns the algorithm identifier.
    ///
    /// # Errors
    ///
    /// Returns `Error::DecryptionFailure` if the node has no `alg` entry.
    pub fn algorithm(&self) -> Result<&str> {
        self.get(ALGORITHM_FIELD).ok_or_else(|| {
            Error::DecryptionFailure("encrypted node is missing the `alg` field".to_string())
        })
    }

    /// Returns the value stored under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns the base64-decoded value stored under `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCiphertext` if the stored value is not valid
    /// standard-alphabet base64.
    pub fn get_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        self.get(name)
            .map(|encoded| {
                STANDARD.decode(encoded).map_err(|e| {
                    Error::InvalidCiphertext(format!(
                        "`{name}` could not be decoded as base64: {e}"
                    ))
                })
            })
            .transpose()
    }

    /// Stores a string value.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedField` if `name` is `alg`.
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name == ALGORITHM_FIELD {
            return Err(Error::ReservedField(name));
        }
        self.fields.insert(name, value.into());
        Ok(())
    }

    /// Stores a byte value, base64-encoded.
    ///
    /// # Errors
    ///
    /// Returns `Error::ReservedField` if `name` is `alg`.
    pub fn put_bytes(&mut self, name: impl Into<String>, value: &[u8]) -> Result<()> {
        self.put(name, STANDARD.encode(value))
    }

    /// Returns the full node, ready to be written into a document.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Consumes the result and returns the underlying node.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.fields
    }
}

impl From<BTreeMap<String, String>> for EncryptionResult {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self::from_map(fields)
    }
}
