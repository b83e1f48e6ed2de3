//! Basic usage example for `fieldcrypt`.

use fieldcrypt::prelude::*;
use serde_json::{json, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("fieldcrypt Basic Usage Example");
    println!("==============================\n");

    // In production the key comes from a secret store, not from the binary.
    let key_bytes: Vec<u8> = (0u8..64).collect();
    let keyring = Arc::new(InsecureKeyring::from_keys([Key::new("my-key", key_bytes)]));
    let provider = AeadAes256CbcHmacSha512Provider::new(keyring);

    let mut manager = DefaultManager::new();
    manager.register_default_encrypter(provider.encrypter_for_key("my-key"))?;
    manager.register_encrypter("pii", provider.encrypter_for_key("my-key"))?;
    manager.register_decrypter(provider.decrypter())?;
    println!("✓ Manager configured (default encrypter, alias \"pii\")\n");

    let transcoder: Transcoder = Transcoder::new(Arc::new(manager));

    let content = json!({
        "username": "albert",
        "password": "hunter2",
        "address": {
            "number": "112",
            "street": { "first": "Mercer Street", "second": "Princeton" }
        }
    });
    let document = Document::new(content.clone())
        .with_encrypted_field(["password"], Some("pii"))
        .with_encrypted_field(["address"], None)
        .with_encrypted_field(["address", "street"], None);

    println!("Encrypted fields:");
    for field in document.encrypted_fields() {
        println!("  - {field}");
    }

    let encoded = transcoder.encode(&document)?;
    let stored: Value = serde_json::from_slice(&encoded.data)?;
    println!("\nStored document:\n{}\n", serde_json::to_string_pretty(&stored)?);

    let decoded: Value = transcoder.decode(&encoded)?;
    assert_eq!(decoded, content);
    println!("✓ Round-trip verification successful");

    Ok(())
}
