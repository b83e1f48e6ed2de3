//! Crypto manager: encrypter/decrypter registry and field name mangling.

use crate::encrypter::{Decrypter, Encrypter};
use crate::envelope::{EncryptionResult, ALGORITHM_FIELD};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Alias under which the default encrypter is registered.
pub const DEFAULT_ENCRYPTER_ALIAS: &str = "__DEFAULT__";

/// Prefix that marks a field as holding an encrypted node.
pub const DEFAULT_ENCRYPTED_FIELD_NAME_PREFIX: &str = "encrypted$";

/// Selects encrypters and decrypters for document fields.
///
/// A manager is set up once and then shared read-only between threads, so
/// implementations must be `Send + Sync`.
pub trait Manager: Send + Sync {
    /// Encrypts `plaintext` with the encrypter registered under `alias`, or
    /// with the default encrypter when `alias` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::EncrypterNotFound` if no encrypter resolves, or the
    /// encrypter's own error.
    fn encrypt(&self, plaintext: &[u8], alias: Option<&str>) -> Result<BTreeMap<String, String>>;

    /// Decrypts an encrypted node with the decrypter named by its `alg` field.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlgorithmNotFound` if no decrypter handles the
    /// algorithm, or the decrypter's own error.
    fn decrypt(&self, encrypted_node: BTreeMap<String, String>) -> Result<Vec<u8>>;

    /// Renames a field to mark its value as encrypted.
    fn mangle(&self, field_name: &str) -> String;

    /// Reverses [`mangle`](Self::mangle). Only meaningful for mangled names.
    fn demangle(&self, field_name: &str) -> String;

    /// Returns `true` if `field_name` carries the encrypted-field marker.
    fn is_mangled(&self, field_name: &str) -> bool;
}

/// Registry-backed [`Manager`] with prefix-based name mangling.
///
/// Registration needs `&mut self`; once populated, wrap the manager in an
/// `Arc` to share it between threads.
///
/// # Example
///
/// ```
/// use fieldcrypt::key::{InsecureKeyring, Key};
/// use fieldcrypt::manager::{DefaultManager, Manager};
/// use fieldcrypt::provider::AeadAes256CbcHmacSha512Provider;
/// use std::sync::Arc;
///
/// let keyring = Arc::new(InsecureKeyring::from_keys([Key::new("k", vec![0u8; 64])]));
/// let provider = AeadAes256CbcHmacSha512Provider::new(keyring);
///
/// let mut manager = DefaultManager::new();
/// manager.register_default_encrypter(provider.encrypter_for_key("k"))?;
/// manager.register_decrypter(provider.decrypter())?;
///
/// let node = manager.encrypt(b"\"hello\"", None)?;
/// assert_eq!(manager.decrypt(node)?, b"\"hello\"");
/// assert_eq!(manager.mangle("password"), "encrypted$password");
/// # Ok::<(), fieldcrypt::error::Error>(())
/// ```
pub struct DefaultManager {
    encrypted_field_name_prefix: String,
    alias_to_encrypter: HashMap<String, Arc<dyn Encrypter>>,
    algorithm_to_decrypter: HashMap<String, Arc<dyn Decrypter>>,
}

impl DefaultManager {
    /// Creates a manager using the `encrypted$` prefix.
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_ENCRYPTED_FIELD_NAME_PREFIX)
    }

    /// Creates a manager using a custom encrypted field name prefix.
    #[must_use]
    pub fn with_prefix(encrypted_field_name_prefix: impl Into<String>) -> Self {
        Self {
            encrypted_field_name_prefix: encrypted_field_name_prefix.into(),
            alias_to_encrypter: HashMap::new(),
            algorithm_to_decrypter: HashMap::new(),
        }
    }

    /// Returns the encrypted field name prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.encrypted_field_name_prefix
    }

    /// Registers an encrypter under `alias`.
    ///
    /// # Errors
    ///
    /// Returns `Error::AliasAlreadyRegistered` if the alias is taken; the
    /// existing registration is kept.
    pub fn register_encrypter(
        &mut self,
        alias: impl Into<String>,
        encrypter: Arc<dyn Encrypter>,
    ) -> Result<()> {
        let alias = alias.into();
        if self.alias_to_encrypter.contains_key(&alias) {
            return Err(Error::AliasAlreadyRegistered(alias));
        }
        tracing::debug!(alias = %alias, "registered encrypter");
        self.alias_to_encrypter.insert(alias, encrypter);
        Ok(())
    }

    /// Registers the encrypter used for fields that name no alias.
    ///
    /// # Errors
    ///
    /// Returns `Error::AliasAlreadyRegistered` if a default is already set.
    pub fn register_default_encrypter(&mut self, encrypter: Arc<dyn Encrypter>) -> Result<()> {
        self.register_encrypter(DEFAULT_ENCRYPTER_ALIAS, encrypter)
    }

    /// Registers a decrypter under its own algorithm name.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlgorithmAlreadyRegistered` if the algorithm already
    /// has a decrypter.
    pub fn register_decrypter(&mut self, decrypter: Arc<dyn Decrypter>) -> Result<()> {
        let algorithm = decrypter.algorithm().to_string();
        if self.algorithm_to_decrypter.contains_key(&algorithm) {
            return Err(Error::AlgorithmAlreadyRegistered(algorithm));
        }
        tracing::debug!(algorithm = %algorithm, "registered decrypter");
        self.algorithm_to_decrypter.insert(algorithm, decrypter);
        Ok(())
    }
}

impl Default for DefaultManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager for DefaultManager {
    fn encrypt(&self, plaintext: &[u8], alias: Option<&str>) -> Result<BTreeMap<String, String>> {
        let alias = alias.unwrap_or(DEFAULT_ENCRYPTER_ALIAS);
        let encrypter = self.alias_to_encrypter.get(alias).ok_or_else(|| {
            Error::EncrypterNotFound(if alias == DEFAULT_ENCRYPTER_ALIAS {
                "no alias given and no default encrypter registered".to_string()
            } else {
                format!("no encrypter registered for alias `{alias}`")
            })
        })?;

        Ok(encrypter.encrypt(plaintext)?.into_map())
    }

    fn decrypt(&self, encrypted_node: BTreeMap<String, String>) -> Result<Vec<u8>> {
        let encrypted = EncryptionResult::from_map(encrypted_node);
        let algorithm = encrypted.get(ALGORITHM_FIELD).ok_or_else(|| {
            Error::DecryptionFailure("encrypted node is missing the `alg` field".to_string())
        })?;

        let decrypter = self
            .algorithm_to_decrypter
            .get(algorithm)
            .ok_or_else(|| Error::AlgorithmNotFound(algorithm.to_string()))?;

        decrypter.decrypt(&encrypted)
    }

    fn mangle(&self, field_name: &str) -> String {
        format!("{}{field_name}", self.encrypted_field_name_prefix)
    }

    fn demangle(&self, field_name: &str) -> String {
        field_name
            .strip_prefix(self.encrypted_field_name_prefix.as_str())
            .unwrap_or(field_name)
            .to_string()
    }

    fn is_mangled(&self, field_name: &str) -> bool {
        field_name.starts_with(self.encrypted_field_name_prefix.as_str())
    }
}
