//! Document transcoder with field-level encryption.
//!
//! The transcoder is the boundary between typed documents and stored bytes:
//! it serializes a document, encrypts its declared fields, and flags the
//! result as JSON. Decoding runs the same steps in reverse.

use crate::codec::{has_common_flags, EncodedValue, JsonSerializer, Serializer, JSON_COMMON_FLAGS};
use crate::document::{Document, EncryptedField, EncryptedFields};
use crate::error::{Error, Result};
use crate::fields::{decrypt_fields, encrypt_fields};
use crate::manager::Manager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Encodes and decodes documents, encrypting their declared fields.
///
/// # Example
///
/// ```
/// use fieldcrypt::document::Document;
/// use fieldcrypt::key::{InsecureKeyring, Key};
/// use fieldcrypt::manager::DefaultManager;
/// use fieldcrypt::provider::AeadAes256CbcHmacSha512Provider;
/// use fieldcrypt::transcoder::Transcoder;
/// use serde_json::{json, Value};
/// use std::sync::Arc;
///
/// let keyring = Arc::new(InsecureKeyring::from_keys([Key::new("k", vec![0u8; 64])]));
/// let provider = AeadAes256CbcHmacSha512Provider::new(keyring);
/// let mut manager = DefaultManager::new();
/// manager.register_default_encrypter(provider.encrypter_for_key("k"))?;
/// manager.register_decrypter(provider.decrypter())?;
///
/// let transcoder: Transcoder = Transcoder::new(Arc::new(manager));
///
/// let doc = Document::new(json!({"username": "albert", "password": "hunter2"}))
///     .with_encrypted_field(["password"], None);
/// let encoded = transcoder.encode(&doc)?;
///
/// let decoded: Value = transcoder.decode(&encoded)?;
/// assert_eq!(&decoded, doc.content());
/// # Ok::<(), fieldcrypt::error::Error>(())
/// ```
pub struct Transcoder<S: Serializer = JsonSerializer> {
    manager: Option<Arc<dyn Manager>>,
    serializer: PhantomData<S>,
}

impl<S: Serializer> Transcoder<S> {
    /// Creates a transcoder that uses `manager` for encryption.
    pub fn new(manager: Arc<dyn Manager>) -> Self {
        Self { manager: Some(manager), serializer: PhantomData }
    }

    /// Creates a transcoder with no crypto manager.
    ///
    /// Every operation fails with `Error::ManagerMissing` until a manager is
    /// supplied through [`Transcoder::with_manager`].
    #[must_use]
    pub const fn without_manager() -> Self {
        Self { manager: None, serializer: PhantomData }
    }

    /// Replaces the crypto manager.
    #[must_use]
    pub fn with_manager(mut self, manager: Arc<dyn Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Serializes a document and encrypts its declared fields.
    ///
    /// # Errors
    ///
    /// Returns `Error::ManagerMissing` if no manager is configured, or any
    /// serialization or encryption error. No encoded value is produced on
    /// failure.
    pub fn encode<T: Serialize>(&self, document: &Document<T>) -> Result<EncodedValue> {
        let manager = self.manager()?;
        let data = S::serialize(document.content())?;
        let encrypted = Self::encrypt_with(manager, &data, document.encrypted_fields())?;
        Ok(EncodedValue::json(encrypted))
    }

    /// Encodes a value using the encrypted fields its type declares.
    ///
    /// # Errors
    ///
    /// Same as [`Transcoder::encode`].
    pub fn encode_annotated<T: Serialize + EncryptedFields>(&self, value: &T) -> Result<EncodedValue> {
        let manager = self.manager()?;
        let data = S::serialize(value)?;
        let encrypted = Self::encrypt_with(manager, &data, &T::encrypted_fields())?;
        Ok(EncodedValue::json(encrypted))
    }

    /// Decrypts all encrypted fields and deserializes the document.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - no manager is configured (`Error::ManagerMissing`)
    /// - the value is not flagged as JSON (`Error::DecodingFailure`)
    /// - decryption or deserialization fails
    pub fn decode<T: DeserializeOwned>(&self, encoded: &EncodedValue) -> Result<T> {
        let manager = self.manager()?;
        if !has_common_flags(encoded.flags, JSON_COMMON_FLAGS) {
            return Err(Error::DecodingFailure { flags: encoded.flags });
        }
        let decrypted = Self::decrypt_with(manager, &encoded.data)?;
        S::deserialize(&decrypted)
    }

    /// Encrypts `fields` of an already serialized document.
    ///
    /// # Errors
    ///
    /// Same as [`Transcoder::encode`].
    pub fn encrypt_bytes(&self, raw: &[u8], fields: &[EncryptedField]) -> Result<Vec<u8>> {
        Self::encrypt_with(self.manager()?, raw, fields)
    }

    /// Decrypts every encrypted field of a serialized document.
    ///
    /// # Errors
    ///
    /// Returns `Error::ManagerMissing` if no manager is configured, or any
    /// serialization or decryption error.
    pub fn decrypt_bytes(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
        Self::decrypt_with(self.manager()?, encrypted)
    }

    fn manager(&self) -> Result<&dyn Manager> {
        self.manager.as_deref().ok_or(Error::ManagerMissing)
    }

    fn encrypt_with(manager: &dyn Manager, raw: &[u8], fields: &[EncryptedField]) -> Result<Vec<u8>> {
        if fields.is_empty() {
            return Ok(raw.to_vec());
        }
        let mut tree: Value = S::deserialize(raw)?;
        encrypt_fields::<S>(&mut tree, fields, manager)?;
        S::serialize(&tree)
    }

    fn decrypt_with(manager: &dyn Manager, encrypted: &[u8]) -> Result<Vec<u8>> {
        let mut tree: Value = S::deserialize(encrypted)?;
        decrypt_fields::<S>(&mut tree, manager)?;
        S::serialize(&tree)
    }
}

impl<S: Serializer> Default for Transcoder<S> {
    fn default() -> Self {
        Self::without_manager()
    }
}

impl<S: Serializer> Clone for Transcoder<S> {
    fn clone(&self) -> Self {
        Self { manager: self.manager.clone(), serializer: PhantomData }
    }
}

impl<S: Serializer> fmt::Debug for Transcoder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transcoder").field("has_manager", &self.manager.is_some()).finish()
    }
}
