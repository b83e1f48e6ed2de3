//! # `fieldcrypt`
//!
//! Client-side field-level encryption for JSON documents.
//!
//! Selected fields of a document are replaced with authenticated,
//! self-describing encrypted nodes before the document leaves the client,
//! and transparently restored on the way back in.
//!
//! ## Features
//!
//! - `AEAD_AES_256_CBC_HMAC_SHA512` authenticated encryption
//! - Named encrypters (aliases) with a default, decrypters keyed by algorithm
//! - Nested field paths, including fields nested inside encrypted fields
//! - Pluggable keyrings
//! - `#[derive(EncryptedFields)]` behind the `derive` feature
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldcrypt::prelude::*;
//!
//! let keyring = Arc::new(InsecureKeyring::from_keys([Key::new("my-key", key_bytes)]));
//! let provider = AeadAes256CbcHmacSha512Provider::new(keyring);
//!
//! let mut manager = DefaultManager::new();
//! manager.register_default_encrypter(provider.encrypter_for_key("my-key"))?;
//! manager.register_decrypter(provider.decrypter())?;
//!
//! let transcoder: Transcoder = Transcoder::new(Arc::new(manager));
//! let encoded = transcoder.encode_annotated(&person)?;
//! let person: Person = transcoder.decode(&encoded)?;
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod aead;
pub mod codec;
pub mod document;
pub mod encrypter;
pub mod envelope;
pub mod error;
pub mod fields;
pub mod key;
pub mod manager;
pub mod provider;
pub mod transcoder;

#[cfg(feature = "derive")]
pub use fieldcrypt_derive::EncryptedFields;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::codec::{EncodedValue, JsonSerializer, Serializer};
    pub use crate::document::{Document, EncryptedField, EncryptedFields};
    pub use crate::encrypter::{Decrypter, Encrypter};
    pub use crate::envelope::EncryptionResult;
    pub use crate::error::{Error, Result};
    pub use crate::key::{InsecureKeyring, Key, Keyring};
    pub use crate::manager::{DefaultManager, Manager};
    pub use crate::provider::AeadAes256CbcHmacSha512Provider;
    pub use crate::transcoder::Transcoder;
    pub use std::sync::Arc;
}
