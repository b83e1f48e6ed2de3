//! Key material and keyrings.

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretVec};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// A named piece of secret key material.
///
/// Keys are immutable once constructed. The bytes are zeroized when the key
/// is dropped and never appear in `Debug` output.
pub struct Key {
    id: String,
    bytes: SecretVec<u8>,
}

impl Key {
    /// Creates a new key with the given identifier and bytes.
    #[must_use]
    pub fn new(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { id: id.into(), bytes: SecretVec::new(bytes.into()) }
    }

    /// Returns the key identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.bytes.expose_secret()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("id", &self.id)
            .field("len", &self.bytes.expose_secret().len())
            .finish_non_exhaustive()
    }
}

/// A collection of keys, looked up by identifier.
///
/// Encrypters and decrypters hold a keyring and resolve keys lazily, at the
/// moment they are needed. Implementations must be thread-safe.
pub trait Keyring: Send + Sync {
    /// Retrieves a key by its identifier.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyNotFound` if no key has the given identifier.
    fn get(&self, key_id: &str) -> Result<Arc<Key>>;
}

/// An in-memory keyring.
///
/// Keys live in process memory for the lifetime of the keyring, so this is
/// meant for tests and examples rather than production deployments.
#[derive(Debug, Default)]
pub struct InsecureKeyring {
    keys: RwLock<HashMap<String, Arc<Key>>>,
}

impl InsecureKeyring {
    /// Creates an empty keyring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a keyring holding the given keys.
    #[must_use]
    pub fn from_keys(keys: impl IntoIterator<Item = Key>) -> Self {
        let keys = keys.into_iter().map(|key| (key.id.clone(), Arc::new(key))).collect();
        Self { keys: RwLock::new(keys) }
    }

    /// Adds a key, replacing any existing key with the same identifier.
    pub fn add_key(&self, key: Key) {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.insert(key.id.clone(), Arc::new(key)).is_some() {
            tracing::debug!("replaced existing key in insecure keyring");
        }
    }
}

impl Keyring for InsecureKeyring {
    fn get(&self, key_id: &str) -> Result<Arc<Key>> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key_id)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key_id.to_string()))
    }
}
