//! Serializer abstraction and encoded value flags.
//!
//! The field engine does not care how documents become bytes; it only needs
//! a [`Serializer`] to turn sub-trees into plaintext and back. Encoded values
//! carry "common flags" in their top byte so that a reader can detect data
//! written by an incompatible codec.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Mask selecting the common format bits of a flags word.
pub const COMMON_FORMAT_MASK: u32 = 0xFF00_0000;

/// Common flags for JSON documents.
pub const JSON_COMMON_FLAGS: u32 = 2 << 24;

/// Returns `true` if `flags` has the same common format as `expected`.
#[must_use]
pub const fn has_common_flags(flags: u32, expected: u32) -> bool {
    (flags & COMMON_FORMAT_MASK) == (expected & COMMON_FORMAT_MASK)
}

/// Encoded document bytes together with their format flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    /// Serialized document
    pub data: Vec<u8>,
    /// Format flags
    pub flags: u32,
}

impl EncodedValue {
    /// Creates an encoded value flagged as JSON.
    #[must_use]
    pub const fn json(data: Vec<u8>) -> Self {
        Self { data, flags: JSON_COMMON_FLAGS }
    }
}

/// Converts values to and from raw bytes.
pub trait Serializer {
    /// Serializes `value`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the value cannot be represented.
    fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>>;

    /// Deserializes a value of type `T` from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the bytes are not a valid `T`.
    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T>;
}

/// [`Serializer`] producing compact JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_json_common_flags() {
        assert_eq!(JSON_COMMON_FLAGS, 0x0200_0000);
        assert!(has_common_flags(JSON_COMMON_FLAGS, JSON_COMMON_FLAGS));
        // Lower bits are not part of the common format
        assert!(has_common_flags(JSON_COMMON_FLAGS | 0x0000_00ff, JSON_COMMON_FLAGS));
        assert!(!has_common_flags(0, JSON_COMMON_FLAGS));
        assert!(!has_common_flags(3 << 24, JSON_COMMON_FLAGS));
    }

    #[test]
    fn test_json_serializer() {
        let bytes = JsonSerializer::serialize("The enemy knows the system.").unwrap();
        assert_eq!(bytes, b"\"The enemy knows the system.\"");

        let value: Value = JsonSerializer::deserialize(br#"{"a":[1,2]}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn test_json_serializer_rejects_garbage() {
        let result: Result<Value> = JsonSerializer::deserialize(b"{not json");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}
