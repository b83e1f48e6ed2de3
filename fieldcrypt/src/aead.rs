//! AEAD_AES_256_CBC_HMAC_SHA512 authenticated encryption.
//!
//! Implements the encrypt-then-MAC construction described in
//! [draft-mcgrew-aead-aes-cbc-hmac-sha2-05]:
//!
//! - the 64-byte key is split into `MAC_KEY = K[0..32]` and `ENC_KEY = K[32..64]`
//! - the plaintext is encrypted with AES-256-CBC and PKCS#7 padding under a
//!   fresh random 16-byte IV
//! - the tag is `HMAC-SHA-512(MAC_KEY, A || IV || C || AL)` truncated to
//!   32 bytes, where `AL` is the bit length of `A` as a big-endian `u64`
//!
//! Output layout:
//!
//! ```text
//! [iv:16][ciphertext:16*n][tag:32]
//! ```
//!
//! [draft-mcgrew-aead-aes-cbc-hmac-sha2-05]: https://tools.ietf.org/html/draft-mcgrew-aead-aes-cbc-hmac-sha2-05

use crate::error::{Error, Result};
use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha512;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha512 = Hmac<Sha512>;

/// Required key size in bytes (MAC key followed by encryption key).
pub const KEY_SIZE: usize = 64;

/// Size of each half of the key.
const SUB_KEY_SIZE: usize = 32;

/// AES block size, also the IV size.
pub const BLOCK_SIZE: usize = 16;

/// Size of the truncated authentication tag.
pub const TAG_SIZE: usize = 32;

/// Smallest valid blob: IV, one cipher block and the tag.
pub const MIN_CIPHERTEXT_SIZE: usize = BLOCK_SIZE + BLOCK_SIZE + TAG_SIZE;

/// Encrypts `plaintext` under `key`, authenticating `associated_data`.
///
/// A new IV is drawn from the operating system CSPRNG on every call.
///
/// # Errors
///
/// Returns `Error::InvalidKey` if `key` is not [`KEY_SIZE`] bytes long.
pub fn encrypt(key: &[u8], plaintext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
    let mut iv = [0u8; BLOCK_SIZE];
    OsRng.fill_bytes(&mut iv);
    encrypt_with_iv(key, &iv, plaintext, associated_data)
}

/// Encrypts with a caller-chosen IV. Only reproducible test vectors need this.
pub(crate) fn encrypt_with_iv(
    key: &[u8],
    iv: &[u8; BLOCK_SIZE],
    plaintext: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>> {
    let (mac_key, enc_key) = split_key(key)?;

    let ciphertext = Aes256CbcEnc::new_from_slices(enc_key, iv)
        .map_err(|e| Error::InvalidKey(format!("AES-256-CBC rejected the key: {e}")))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let tag = authenticator(mac_key, associated_data, iv, &ciphertext)?.finalize().into_bytes();

    let mut blob = Vec::with_capacity(BLOCK_SIZE + ciphertext.len() + TAG_SIZE);
    blob.extend_from_slice(iv);
    blob.extend_from_slice(&ciphertext);
    blob.extend_from_slice(&tag[..TAG_SIZE]);
    Ok(blob)
}

/// Verifies and decrypts a blob produced by [`encrypt`].
///
/// # Errors
///
/// Returns error if:
/// - `key` is not [`KEY_SIZE`] bytes (`Error::InvalidKey`)
/// - `blob` is shorter than [`MIN_CIPHERTEXT_SIZE`] or its ciphertext is not
///   block aligned (`Error::InvalidCiphertext`)
/// - the tag does not verify or the padding is invalid (`Error::DecryptionFailure`)
pub fn decrypt(key: &[u8], blob: &[u8], associated_data: &[u8]) -> Result<Vec<u8>> {
    let (mac_key, enc_key) = split_key(key)?;

    if blob.len() < MIN_CIPHERTEXT_SIZE {
        return Err(Error::InvalidCiphertext(format!(
            "ciphertext too short: {} bytes (min: {MIN_CIPHERTEXT_SIZE})",
            blob.len()
        )));
    }

    let (iv, rest) = blob.split_at(BLOCK_SIZE);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);

    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::InvalidCiphertext(format!(
            "ciphertext length {} is not a multiple of the block size",
            ciphertext.len()
        )));
    }

    // Constant-time comparison against the left half of the full HMAC output
    authenticator(mac_key, associated_data, iv, ciphertext)?
        .verify_truncated_left(tag)
        .map_err(|_| Error::DecryptionFailure("authentication tag mismatch".to_string()))?;

    Aes256CbcDec::new_from_slices(enc_key, iv)
        .map_err(|e| Error::InvalidKey(format!("AES-256-CBC rejected the key: {e}")))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::DecryptionFailure("invalid padding".to_string()))
}

fn split_key(key: &[u8]) -> Result<(&[u8], &[u8])> {
    if key.len() != KEY_SIZE {
        return Err(Error::InvalidKey(format!(
            "expected {KEY_SIZE} bytes, got {}",
            key.len()
        )));
    }
    Ok(key.split_at(SUB_KEY_SIZE))
}

fn authenticator(
    mac_key: &[u8],
    associated_data: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<HmacSha512> {
    let associated_data_bits = u64::try_from(associated_data.len())
        .ok()
        .and_then(|len| len.checked_mul(8))
        .ok_or_else(|| Error::EncryptionFailure("associated data too long".to_string()))?;

    let mut mac = HmacSha512::new_from_slice(mac_key)
        .map_err(|e| Error::InvalidKey(format!("HMAC-SHA-512 rejected the key: {e}")))?;
    mac.update(associated_data);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&associated_data_bits.to_be_bytes());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use proptest::prelude::*;

    const KNOWN_CIPHERTEXT: &str = "GvOMLcK5b/3YZpQJI0G8BLm98oj20ZLdqKDV3MfTuGlWL4R5p5Deykuv2XLW4LcDvnOkmhuUSRbQ8QVEmbjq43XHdOm3ColJ6LzoaAtJihk=";
    const KNOWN_PLAINTEXT: &[u8] = b"\"The enemy knows the system.\"";

    fn sequential_key() -> Vec<u8> {
        (0u8..64).collect()
    }

    #[test]
    fn test_known_vector_decrypt() {
        let blob = STANDARD.decode(KNOWN_CIPHERTEXT).unwrap();
        let plaintext = decrypt(&sequential_key(), &blob, &[]).expect("Decryption failed");
        assert_eq!(plaintext, KNOWN_PLAINTEXT);
    }

    #[test]
    fn test_known_vector_encrypt_with_same_iv() {
        let blob = STANDARD.decode(KNOWN_CIPHERTEXT).unwrap();
        let iv: [u8; BLOCK_SIZE] = blob[..BLOCK_SIZE].try_into().unwrap();

        let reproduced = encrypt_with_iv(&sequential_key(), &iv, KNOWN_PLAINTEXT, &[]).unwrap();
        assert_eq!(reproduced, blob);
    }

    #[test]
    fn test_output_layout() {
        let blob = encrypt(&sequential_key(), b"0123456789abcdef", &[]).unwrap();
        // Full block of plaintext gains a full block of padding
        assert_eq!(blob.len(), BLOCK_SIZE + 32 + TAG_SIZE);

        let blob = encrypt(&sequential_key(), b"", &[]).unwrap();
        assert_eq!(blob.len(), MIN_CIPHERTEXT_SIZE);
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = sequential_key();
        let blob1 = encrypt(&key, b"same", &[]).unwrap();
        let blob2 = encrypt(&key, b"same", &[]).unwrap();

        assert_ne!(blob1[..BLOCK_SIZE], blob2[..BLOCK_SIZE]);
        assert_ne!(blob1, blob2);
    }

    #[test]
    fn test_associated_data_is_authenticated() {
        let key = sequential_key();
        let blob = encrypt(&key, b"payload", b"context-a").unwrap();

        assert_eq!(decrypt(&key, &blob, b"context-a").unwrap(), b"payload");
        assert!(matches!(decrypt(&key, &blob, b"context-b"), Err(Error::DecryptionFailure(_))));
        assert!(matches!(decrypt(&key, &blob, &[]), Err(Error::DecryptionFailure(_))));
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let blob = encrypt(&sequential_key(), b"payload", &[]).unwrap();
        let other_key = vec![0x42u8; KEY_SIZE];

        assert!(matches!(decrypt(&other_key, &blob, &[]), Err(Error::DecryptionFailure(_))));
    }

    #[test]
    fn test_invalid_key_length() {
        let blob = STANDARD.decode(KNOWN_CIPHERTEXT).unwrap();

        for len in [0, 3, 32, 63, 65, 128] {
            let key = vec![0u8; len];
            assert!(matches!(encrypt(&key, b"x", &[]), Err(Error::InvalidKey(_))), "len {len}");
            assert!(matches!(decrypt(&key, &blob, &[]), Err(Error::InvalidKey(_))), "len {len}");
        }
    }

    #[test]
    fn test_ciphertext_too_short() {
        let result = decrypt(&sequential_key(), &[0x00, 0x01, 0x02, 0x03], &[]);
        assert!(matches!(result, Err(Error::InvalidCiphertext(_))));

        let result = decrypt(&sequential_key(), &[0u8; MIN_CIPHERTEXT_SIZE - 1], &[]);
        assert!(matches!(result, Err(Error::InvalidCiphertext(_))));
    }

    #[test]
    fn test_ciphertext_not_block_aligned() {
        let result = decrypt(&sequential_key(), &[0u8; MIN_CIPHERTEXT_SIZE + 5], &[]);
        assert!(matches!(result, Err(Error::InvalidCiphertext(_))));
    }

    #[test]
    fn test_truncated_blob_fails() {
        let mut blob = encrypt(&sequential_key(), &[9u8; 40], &[]).unwrap();
        blob.truncate(blob.len() - BLOCK_SIZE);

        assert!(matches!(decrypt(&sequential_key(), &blob, &[]), Err(Error::DecryptionFailure(_))));
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            key in proptest::collection::vec(any::<u8>(), KEY_SIZE),
            plaintext in proptest::collection::vec(any::<u8>(), 0..512),
            associated_data in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let blob = encrypt(&key, &plaintext, &associated_data).unwrap();
            prop_assert_eq!((blob.len() - BLOCK_SIZE - TAG_SIZE) % BLOCK_SIZE, 0);
            prop_assert_eq!(decrypt(&key, &blob, &associated_data).unwrap(), plaintext);
        }

        #[test]
        fn prop_single_bit_flip_detected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..128),
            position in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = sequential_key();
            let mut blob = encrypt(&key, &plaintext, &[]).unwrap();
            let index = position.index(blob.len());
            blob[index] ^= 1 << bit;

            let result = decrypt(&key, &blob, &[]);
            prop_assert!(matches!(result, Err(Error::DecryptionFailure(_))));
        }
    }
}
