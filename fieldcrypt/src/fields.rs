//! Path-driven field encryption over JSON trees.
//!
//! Encryption replaces each declared field with an encrypted node stored
//! under the mangled field name:
//!
//! ```text
//! {"password": "hunter2"}  ->  {"encrypted$password": {"alg": "...", "kid": "...", "ciphertext": "..."}}
//! ```
//!
//! Fields are processed longest path first. When both `address` and
//! `address.street` are declared, `street` is encrypted first, and the
//! plaintext of `address` then contains the already encrypted `street` node.
//! Decryption needs no field list: it finds every mangled member, decrypts it,
//! and decrypts the revealed value again before putting it back, peeling such
//! nested layers one at a time.

use crate::codec::Serializer;
use crate::document::EncryptedField;
use crate::error::{Error, Result};
use crate::manager::Manager;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use zeroize::Zeroizing;

/// Encrypts `fields` of `document` in place.
///
/// Paths are checked before anything is touched: an empty, duplicated or
/// unresolvable path fails with `Error::EncryptionFailure` and leaves the
/// document unchanged, as does a field whose mangled name is already taken by
/// a sibling member. Path segments only step into object members.
///
/// # Errors
///
/// Returns `Error::EncryptionFailure` for invalid paths, or any error from the
/// manager or serializer. If the manager fails part way, the document may be
/// partially encrypted and should be discarded.
pub fn encrypt_fields<S: Serializer>(
    document: &mut Value,
    fields: &[EncryptedField],
    manager: &dyn Manager,
) -> Result<()> {
    validate(document, fields, manager)?;

    // Stable sort: equal-length paths keep their declaration order
    let mut ordered: Vec<&EncryptedField> = fields.iter().collect();
    ordered.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

    for field in ordered {
        encrypt_field::<S>(document, field, manager)?;
    }
    Ok(())
}

/// Decrypts every encrypted node in `document` in place.
///
/// # Errors
///
/// Returns `Error::DecryptionFailure` if a mangled member is not an object of
/// strings or its demangled name is already taken by a sibling member, or any
/// error from the manager or serializer.
pub fn decrypt_fields<S: Serializer>(document: &mut Value, manager: &dyn Manager) -> Result<()> {
    decrypt_node::<S>(document, manager)
}

fn validate(document: &Value, fields: &[EncryptedField], manager: &dyn Manager) -> Result<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if field.path.is_empty() {
            return Err(Error::EncryptionFailure(
                "encrypted field path must not be empty".to_string(),
            ));
        }
        if !seen.insert(&field.path) {
            return Err(Error::EncryptionFailure(format!(
                "field `{}` is declared more than once",
                field.path.join(".")
            )));
        }
        if resolve(document, &field.path).is_none() {
            return Err(missing_field(field));
        }
        if let Some((name, parent_path)) = field.path.split_last() {
            let mangled = manager.mangle(name);
            if resolve(document, parent_path).and_then(|parent| parent.get(&mangled)).is_some() {
                return Err(Error::EncryptionFailure(format!(
                    "field `{}` collides with existing member `{mangled}`",
                    field.path.join(".")
                )));
            }
        }
    }
    Ok(())
}

fn encrypt_field<S: Serializer>(
    document: &mut Value,
    field: &EncryptedField,
    manager: &dyn Manager,
) -> Result<()> {
    let (name, parent_path) = field.path.split_last().ok_or_else(|| missing_field(field))?;
    let parent = resolve_mut(document, parent_path)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| missing_field(field))?;

    let value = parent.get(name).ok_or_else(|| missing_field(field))?;
    let plaintext = Zeroizing::new(S::serialize(value)?);
    let encrypted = manager.encrypt(&plaintext, field.alias.as_deref())?;

    parent.remove(name);
    parent.insert(manager.mangle(name), encrypted_node_value(encrypted));

    tracing::debug!(field = %field, "encrypted field");
    Ok(())
}

fn decrypt_node<S: Serializer>(node: &mut Value, manager: &dyn Manager) -> Result<()> {
    match node {
        Value::Object(members) => decrypt_members::<S>(members, manager),
        Value::Array(items) => items.iter_mut().try_for_each(|item| decrypt_node::<S>(item, manager)),
        _ => Ok(()),
    }
}

fn decrypt_members<S: Serializer>(
    members: &mut Map<String, Value>,
    manager: &dyn Manager,
) -> Result<()> {
    let mut mangled = Vec::new();
    for (name, value) in members.iter_mut() {
        if manager.is_mangled(name) {
            mangled.push(name.clone());
        } else {
            decrypt_node::<S>(value, manager)?;
        }
    }

    for name in mangled {
        let plain = manager.demangle(&name);
        if members.contains_key(&plain) {
            return Err(Error::DecryptionFailure(format!(
                "encrypted field `{name}` collides with existing member `{plain}`"
            )));
        }
        let Some(value) = members.remove(&name) else {
            continue;
        };
        let encrypted = encrypted_node(&name, value)?;
        let plaintext = Zeroizing::new(manager.decrypt(encrypted)?);

        let mut revealed: Value = S::deserialize(&plaintext)?;
        decrypt_node::<S>(&mut revealed, manager)?;

        tracing::trace!(field = %name, "decrypted field");
        members.insert(plain, revealed);
    }
    Ok(())
}

fn resolve<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, segment| node.as_object()?.get(segment))
}

fn resolve_mut<'a>(root: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    path.iter().try_fold(root, |node, segment| node.as_object_mut()?.get_mut(segment))
}

fn missing_field(field: &EncryptedField) -> Error {
    Error::EncryptionFailure(format!(
        "field `{}` does not exist in the document",
        field.path.join(".")
    ))
}

fn encrypted_node_value(encrypted: BTreeMap<String, String>) -> Value {
    Value::Object(encrypted.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
}

fn encrypted_node(name: &str, value: Value) -> Result<BTreeMap<String, String>> {
    let Value::Object(members) = value else {
        return Err(Error::DecryptionFailure(format!(
            "encrypted field `{name}` is not an object"
        )));
    };

    members
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(value) => Ok((key, value)),
            _ => Err(Error::DecryptionFailure(format!(
                "encrypted field `{name}` has a non-string member `{key}`"
            ))),
        })
        .collect()
}
