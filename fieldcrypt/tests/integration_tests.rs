//! Integration tests for fieldcrypt with the in-memory keyring.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fieldcrypt::codec::{EncodedValue, JSON_COMMON_FLAGS};
use fieldcrypt::document::{Document, EncryptedField, EncryptedFields};
use fieldcrypt::error::Error;
use fieldcrypt::key::{InsecureKeyring, Key};
use fieldcrypt::manager::{DefaultManager, Manager};
use fieldcrypt::provider::AeadAes256CbcHmacSha512Provider;
use fieldcrypt::transcoder::Transcoder;
use fieldcrypt_derive::EncryptedFields;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f\
                       202122232425262728292a2b2c2d2e2f303132333435363738393a3b3c3d3e3f";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Street {
    #[serde(rename = "first")]
    first_line: String,
    #[serde(rename = "second")]
    second_line: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Address {
    number: String,
    street: Street,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Attribute {
    action: String,
    extra: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Pet {
    name: String,
    attributes: BTreeMap<String, Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, EncryptedFields)]
#[encrypted(path = "address.street")]
#[encrypted(path = "address.street.second", alias = "one")]
#[encrypted(path = "pet.attributes")]
struct Person {
    first_name: String,
    last_name: String,
    #[encrypted(alias = "one")]
    password: String,
    #[encrypted]
    address: Address,
    pet: Pet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EncryptedFields)]
struct Profile {
    username: String,
    #[encrypted(alias = "one")]
    password: String,
    #[serde(rename = "fullName")]
    #[encrypted]
    full_name: String,
    #[encrypted]
    birth_year: u32,
}

fn person() -> Person {
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "smart".to_string(),
        Attribute { action: "sit".to_string(), extra: "fast".to_string() },
    );
    attributes.insert(
        "loyal".to_string(),
        Attribute { action: "stay".to_string(), extra: "long".to_string() },
    );

    Person {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        password: "hunter2".to_string(),
        address: Address {
            number: "12".to_string(),
            street: Street {
                first_line: "St James Square".to_string(),
                second_line: "Westminster".to_string(),
            },
        },
        pet: Pet { name: "Byron".to_string(), attributes },
    }
}

fn make_manager() -> Arc<DefaultManager> {
    let key = Key::new("test-key", hex::decode(KEY_HEX).expect("valid hex"));
    let keyring = Arc::new(InsecureKeyring::from_keys([key]));
    let provider = AeadAes256CbcHmacSha512Provider::new(keyring);

    let mut manager = DefaultManager::new();
    manager
        .register_default_encrypter(provider.encrypter_for_key("test-key"))
        .expect("default encrypter");
    manager
        .register_encrypter("one", provider.encrypter_for_key("test-key"))
        .expect("alias one");
    manager.register_decrypter(provider.decrypter()).expect("decrypter");
    Arc::new(manager)
}

fn decrypt_node(manager: &DefaultManager, node: &Value) -> Value {
    let fields: BTreeMap<String, String> =
        serde_json::from_value(node.clone()).expect("encrypted node is an object of strings");
    let plaintext = manager.decrypt(fields).expect("Decryption failed");
    serde_json::from_slice(&plaintext).expect("plaintext is JSON")
}

#[test]
fn test_derived_fields_in_declaration_order() {
    assert_eq!(
        Person::encrypted_fields(),
        vec![
            EncryptedField::parse("address.street"),
            EncryptedField::parse("address.street.second").with_alias("one"),
            EncryptedField::parse("pet.attributes"),
            EncryptedField::new(["password"]).with_alias("one"),
            EncryptedField::new(["address"]),
        ]
    );
    assert_eq!(
        Profile::encrypted_fields(),
        vec![
            EncryptedField::new(["password"]).with_alias("one"),
            EncryptedField::new(["fullName"]),
            EncryptedField::new(["birth_year"]),
        ]
    );
}

#[test]
fn test_nested_person_round_trip() {
    let manager = make_manager();
    let transcoder: Transcoder = Transcoder::new(manager.clone());
    let original = person();

    let encoded = transcoder.encode_annotated(&original).expect("Encoding failed");
    assert_eq!(encoded.flags, JSON_COMMON_FLAGS);

    // Outer layer
    let encrypted: Value = serde_json::from_slice(&encoded.data).expect("valid JSON");
    assert_eq!(encrypted["first_name"], "Ada");
    assert_eq!(encrypted["last_name"], "Lovelace");
    assert!(encrypted.get("password").is_none());
    assert!(encrypted.get("address").is_none());
    assert!(encrypted["encrypted$password"].is_object());
    assert!(encrypted["encrypted$address"].is_object());
    assert_eq!(encrypted["pet"]["name"], "Byron");
    assert!(encrypted["pet"].get("attributes").is_none());
    assert!(encrypted["pet"]["encrypted$attributes"].is_object());

    // address -> street -> second, one layer at a time
    let address = decrypt_node(&manager, &encrypted["encrypted$address"]);
    assert_eq!(address["number"], "12");
    assert!(address.get("street").is_none());

    let street = decrypt_node(&manager, &address["encrypted$street"]);
    assert_eq!(street["first"], "St James Square");
    assert!(street.get("second").is_none());

    let second = decrypt_node(&manager, &street["encrypted$second"]);
    assert_eq!(second, "Westminster");

    let decoded: Person = transcoder.decode(&encoded).expect("Decoding failed");
    assert_eq!(decoded, original);
}

#[test]
fn test_decode_into_json_value() {
    let manager = make_manager();
    let transcoder: Transcoder = Transcoder::new(manager);
    let original = person();

    let encoded = transcoder.encode_annotated(&original).expect("Encoding failed");
    let decoded: Value = transcoder.decode(&encoded).expect("Decoding failed");

    assert_eq!(decoded, serde_json::to_value(&original).expect("serializable"));
}

#[test]
fn test_profile_with_renamed_and_numeric_fields() {
    let transcoder: Transcoder = Transcoder::new(make_manager());
    let profile = Profile {
        username: "albert".to_string(),
        password: "hunter2".to_string(),
        full_name: "Albert Einstein".to_string(),
        birth_year: 1879,
    };

    let encoded = transcoder.encode_annotated(&profile).expect("Encoding failed");
    let encrypted: Value = serde_json::from_slice(&encoded.data).expect("valid JSON");
    assert_eq!(encrypted["username"], "albert");
    for name in ["encrypted$password", "encrypted$fullName", "encrypted$birth_year"] {
        assert_eq!(encrypted[name]["alg"], "AEAD_AES_256_CBC_HMAC_SHA512", "{name}");
    }

    let decoded: Profile = transcoder.decode(&encoded).expect("Decoding failed");
    assert_eq!(decoded, profile);
}

#[test]
fn test_document_fields_on_untyped_content() {
    let transcoder: Transcoder = Transcoder::new(make_manager());
    let content = json!({
        "username": "albert",
        "password": "hunter2",
        "full_name": "Albert Einstein",
        "birth_year": 1879
    });

    let document = Document::new(content.clone())
        .with_encrypted_field(["password"], Some("one"))
        .with_encrypted_field(["full_name"], None)
        .with_encrypted_field(["birth_year"], None);

    let encoded = transcoder.encode(&document).expect("Encoding failed");
    let encrypted: Value = serde_json::from_slice(&encoded.data).expect("valid JSON");
    assert_eq!(encrypted.as_object().map(serde_json::Map::len), Some(4));
    assert_eq!(encrypted["username"], "albert");

    let decoded: Value = transcoder.decode(&encoded).expect("Decoding failed");
    assert_eq!(decoded, content);
}

#[test]
fn test_known_ciphertext_decodes() {
    let transcoder: Transcoder = Transcoder::new(make_manager());
    let data = serde_json::to_vec(&json!({
        "encrypted$maxim": {
            "alg": "AEAD_AES_256_CBC_HMAC_SHA512",
            "kid": "test-key",
            "ciphertext": "GvOMLcK5b/3YZpQJI0G8BLm98oj20ZLdqKDV3MfTuGlWL4R5p5Deykuv2XLW4LcDvnOkmhuUSRbQ8QVEmbjq43XHdOm3ColJ6LzoaAtJihk="
        }
    }))
    .expect("serializable");

    let decoded: Value = transcoder.decode(&EncodedValue::json(data)).expect("Decoding failed");
    assert_eq!(decoded, json!({"maxim": "The enemy knows the system."}));
}

#[test]
fn test_tampered_document_fails() {
    let transcoder: Transcoder = Transcoder::new(make_manager());
    let encoded = transcoder.encode_annotated(&person()).expect("Encoding failed");

    let mut encrypted: Value = serde_json::from_slice(&encoded.data).expect("valid JSON");
    encrypted["encrypted$password"] = encrypted["encrypted$address"].clone();
    let tampered = EncodedValue::json(serde_json::to_vec(&encrypted).expect("serializable"));

    // The swapped node still authenticates; it just no longer fits the type.
    let result: Result<Person, Error> = transcoder.decode(&tampered);
    assert!(matches!(result, Err(Error::Serialization(_))));

    let mut encrypted: Value = serde_json::from_slice(&encoded.data).expect("valid JSON");
    encrypted["encrypted$password"]["ciphertext"] = json!("AAAA");
    let tampered = EncodedValue::json(serde_json::to_vec(&encrypted).expect("serializable"));

    let result: Result<Person, Error> = transcoder.decode(&tampered);
    assert!(matches!(result, Err(Error::InvalidCiphertext(_))));

    // Flip one bit of the tag
    let mut encrypted: Value = serde_json::from_slice(&encoded.data).expect("valid JSON");
    let ciphertext = encrypted["encrypted$password"]["ciphertext"].as_str().expect("string");
    let mut blob = STANDARD.decode(ciphertext).expect("valid base64");
    let last = blob.len() - 1;
    blob[last] ^= 0x01;
    encrypted["encrypted$password"]["ciphertext"] = json!(STANDARD.encode(&blob));
    let tampered = EncodedValue::json(serde_json::to_vec(&encrypted).expect("serializable"));

    let result: Result<Person, Error> = transcoder.decode(&tampered);
    assert!(result.expect_err("flipped tag must fail").is_decryption_failure());
}

#[test]
fn test_unknown_key_id_on_decode() {
    let transcoder: Transcoder = Transcoder::new(make_manager());
    let encoded = transcoder.encode_annotated(&person()).expect("Encoding failed");

    let keyring = Arc::new(InsecureKeyring::from_keys([Key::new("other-key", vec![7u8; 64])]));
    let provider = AeadAes256CbcHmacSha512Provider::new(keyring);
    let mut manager = DefaultManager::new();
    manager.register_decrypter(provider.decrypter()).expect("decrypter");
    let other: Transcoder = Transcoder::new(Arc::new(manager));

    let result: Result<Person, Error> = other.decode(&encoded);
    assert!(matches!(result, Err(Error::KeyNotFound(id)) if id == "test-key"));
}

#[test]
fn test_encode_failures_leave_nothing_behind() {
    let transcoder: Transcoder = Transcoder::new(make_manager());
    let content = json!({"maxim": "The enemy knows the system."});

    let with_empty = Document::with_fields(
        content.clone(),
        vec![EncryptedField::new(["maxim"]), EncryptedField::new(Vec::<String>::new())],
    );
    assert!(matches!(transcoder.encode(&with_empty), Err(Error::EncryptionFailure(_))));

    let with_missing = Document::new(content.clone()).with_encrypted_field(["this-does-not-exist"], None);
    assert!(matches!(transcoder.encode(&with_missing), Err(Error::EncryptionFailure(_))));

    let with_unknown_alias = Document::new(content).with_encrypted_field(["maxim"], Some("two"));
    assert!(matches!(
        transcoder.encode(&with_unknown_alias),
        Err(Error::EncrypterNotFound(alias)) if alias == "two"
    ));
}

#[test]
fn test_custom_prefix() {
    let key = Key::new("test-key", hex::decode(KEY_HEX).expect("valid hex"));
    let provider = AeadAes256CbcHmacSha512Provider::new(Arc::new(InsecureKeyring::from_keys([key])));
    let mut manager = DefaultManager::with_prefix("__crypt_");
    manager
        .register_default_encrypter(provider.encrypter_for_key("test-key"))
        .expect("default encrypter");
    manager.register_encrypter("one", provider.encrypter_for_key("test-key")).expect("alias");
    manager.register_decrypter(provider.decrypter()).expect("decrypter");
    let transcoder: Transcoder = Transcoder::new(Arc::new(manager));

    let encoded = transcoder.encode_annotated(&person()).expect("Encoding failed");
    let encrypted: Value = serde_json::from_slice(&encoded.data).expect("valid JSON");
    assert!(encrypted["__crypt_address"].is_object());
    assert!(encrypted.get("encrypted$address").is_none());

    let decoded: Person = transcoder.decode(&encoded).expect("Decoding failed");
    assert_eq!(decoded, person());

    // A manager with the default prefix sees no encrypted fields at all.
    let default_prefix: Transcoder = Transcoder::new(make_manager());
    let untouched: Value = default_prefix.decode(&encoded).expect("Decoding failed");
    assert_eq!(untouched, encrypted);
}

#[test]
fn test_concurrent_encode_decode() {
    let transcoder: Arc<Transcoder> = Arc::new(Transcoder::new(make_manager()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let transcoder = Arc::clone(&transcoder);
            thread::spawn(move || {
                let mut original = person();
                original.password = format!("password-{i}");
                for _ in 0..10 {
                    let encoded = transcoder.encode_annotated(&original).expect("Encoding failed");
                    let decoded: Person = transcoder.decode(&encoded).expect("Decoding failed");
                    assert_eq!(decoded, original);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread panicked");
    }
}
