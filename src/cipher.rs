//! Decryption of salted, password-based AES envelopes.
//!
//! Documents were encrypted client-side with a JavaScript library whose
//! default passphrase mode emits `base64("Salted__" ‖ salt ‖ ciphertext)`.
//! Key and IV come from the legacy OpenSSL `EVP_BytesToKey` scheme with MD5
//! and a single iteration:
//!
//! ```text
//! block0 = MD5(passphrase ‖ salt)
//! blockN = MD5(blockN-1 ‖ passphrase ‖ salt)
//! key    = (block0 ‖ block1 ‖ block2)[0..32]
//! iv     = (block0 ‖ block1 ‖ block2)[32..48]
//! ```
//!
//! The ciphertext is AES-256-CBC with PKCS#7 padding. Some producers dropped
//! the `Salted__` marker and wrote `salt ‖ ciphertext` directly; both
//! framings are accepted.
//!
//! Everything here is pure: no I/O, no caching of derived keys.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use md5::{Digest, Md5};
use thiserror::Error;

use crate::classify::CIPHER_ENVELOPE_PREFIX;

/// Literal header written in front of the salt.
pub const SALT_MARKER: &[u8; 8] = b"Salted__";
pub const SALT_LEN: usize = 8;
pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const AES_BLOCK_SIZE: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("envelope is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("envelope is {0} bytes, too short to hold a salt and ciphertext")]
    TooShort(usize),
    #[error("ciphertext length is not a positive multiple of 16 bytes: {0}")]
    InvalidCiphertextLength(usize),
    #[error("invalid padding (wrong key or corrupted ciphertext)")]
    InvalidPadding,
    #[error("plaintext is not valid UTF-8 (wrong key or corrupted ciphertext)")]
    InvalidUtf8,
    #[error("envelope is base64-encoded twice; nested encodings are not unwrapped")]
    NestedEncoding,
}

/// Salt and ciphertext split out of a decoded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    pub salt: [u8; SALT_LEN],
    pub ciphertext: Vec<u8>,
    /// Whether the `Salted__` header was present.
    pub has_marker: bool,
}

impl CipherEnvelope {
    /// Base64-decode `envelope_text` and split the salt framing.
    ///
    /// ASCII whitespace is stripped first, so line-wrapped output is accepted.
    pub fn parse(envelope_text: &str) -> Result<Self, CipherError> {
        let compact: String = envelope_text
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let raw = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| CipherError::InvalidBase64(e.to_string()))?;
        Self::from_bytes(&raw)
    }

    /// Split already-decoded envelope bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, CipherError> {
        if raw.starts_with(CIPHER_ENVELOPE_PREFIX.as_bytes()) {
            return Err(CipherError::NestedEncoding);
        }

        let (salt, body, has_marker) = if raw.starts_with(SALT_MARKER) {
            if raw.len() < SALT_MARKER.len() + SALT_LEN {
                return Err(CipherError::TooShort(raw.len()));
            }
            (&raw[8..16], &raw[16..], true)
        } else {
            if raw.len() < SALT_LEN {
                return Err(CipherError::TooShort(raw.len()));
            }
            (&raw[..8], &raw[8..], false)
        };

        if body.is_empty() || body.len() % AES_BLOCK_SIZE != 0 {
            return Err(CipherError::InvalidCiphertextLength(body.len()));
        }

        let mut salt_arr = [0u8; SALT_LEN];
        salt_arr.copy_from_slice(salt);
        Ok(Self {
            salt: salt_arr,
            ciphertext: body.to_vec(),
            has_marker,
        })
    }
}

/// AES-256 key and CBC IV derived from a passphrase and salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKeyMaterial {
    pub key: [u8; KEY_LEN],
    pub iv: [u8; IV_LEN],
}

/// MD5 chaining derivation; three digests cover the 48 bytes needed.
pub fn derive_key_material(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> DerivedKeyMaterial {
    let mut derived = [0u8; KEY_LEN + IV_LEN];
    let mut filled = 0;
    let mut prev: Option<[u8; 16]> = None;

    while filled < derived.len() {
        let mut hasher = Md5::new();
        if let Some(block) = &prev {
            hasher.update(block);
        }
        hasher.update(passphrase);
        hasher.update(salt);
        let digest = hasher.finalize();

        let mut block = [0u8; 16];
        block.copy_from_slice(&digest);

        let take = (derived.len() - filled).min(block.len());
        derived[filled..filled + take].copy_from_slice(&block[..take]);
        filled += take;
        prev = Some(block);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&derived[..KEY_LEN]);
    iv.copy_from_slice(&derived[KEY_LEN..]);
    DerivedKeyMaterial { key, iv }
}

/// Decrypt a parsed envelope to UTF-8 plaintext.
pub fn decrypt_envelope(envelope: &CipherEnvelope, passphrase: &str) -> Result<String, CipherError> {
    let material = derive_key_material(passphrase.as_bytes(), &envelope.salt);

    let mut buf = envelope.ciphertext.clone();
    let plaintext = cbc::Decryptor::<Aes256>::new(
        GenericArray::from_slice(&material.key),
        GenericArray::from_slice(&material.iv),
    )
    .decrypt_padded_mut::<Pkcs7>(&mut buf)
    .map_err(|_| CipherError::InvalidPadding)?;

    String::from_utf8(plaintext.to_vec()).map_err(|_| CipherError::InvalidUtf8)
}

/// Parse and decrypt base64 envelope text in one step.
pub fn decrypt(envelope_text: &str, passphrase: &str) -> Result<String, CipherError> {
    let envelope = CipherEnvelope::parse(envelope_text)?;
    decrypt_envelope(&envelope, passphrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    const PASSPHRASE: &str = "test-key-123";
    const PLAINTEXT: &str = r#"{"test":true,"message":"Decryption is working!"}"#;

    // openssl enc -aes-256-cbc -md md5 -pass pass:test-key-123 -S 0102030405060708
    const SALTED_FIXTURE: &str = "U2FsdGVkX18BAgMEBQYHCHf/R8L2HUmKRaM/gPRwpvVLT2X4jzZ7LGiXeN7jN00TWJU9RTYelj8mspM8vNH0x/fUJs5zOXi1X73qShoehU8=";
    // Same ciphertext with the `Salted__` header dropped.
    const BARE_FIXTURE: &str = "AQIDBAUGBwh3/0fC9h1JikWjP4D0cKb1S09l+I82eyxol3je4zdNE1iVPUU2HpY/JrKTPLzR9Mf31CbOczl4tV+96koaHoVP";

    const FIXTURE_SALT: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

    fn encrypt_raw(plaintext: &[u8], passphrase: &str, salt: [u8; 8]) -> Vec<u8> {
        let material = derive_key_material(passphrase.as_bytes(), &salt);
        let mut buf = vec![0u8; plaintext.len() + AES_BLOCK_SIZE];
        buf[..plaintext.len()].copy_from_slice(plaintext);
        let ct = cbc::Encryptor::<Aes256>::new(
            GenericArray::from_slice(&material.key),
            GenericArray::from_slice(&material.iv),
        )
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .unwrap()
        .to_vec();
        let mut out = SALT_MARKER.to_vec();
        out.extend_from_slice(&salt);
        out.extend_from_slice(&ct);
        out
    }

    #[test]
    fn kdf_matches_openssl_bytes_to_key() {
        let material = derive_key_material(PASSPHRASE.as_bytes(), &FIXTURE_SALT);
        assert_eq!(
            hex::encode(material.key),
            "a1fd0a7b1ebe6ee6cc1cc81887474901a5ea205789e23becb18d30cb85ce8709"
        );
        assert_eq!(hex::encode(material.iv), "f090b6893d6441d674fe21b6bedebefb");
    }

    #[test]
    fn kdf_empty_passphrase_zero_salt() {
        let material = derive_key_material(b"", &[0u8; 8]);
        assert_eq!(
            hex::encode(material.key),
            "7dea362b3fac8e00956a4952a3d4f474ee0e898aa8e7deb53fe799cf88533135"
        );
        assert_eq!(hex::encode(material.iv), "01ec4d4c34ae7218691993110fb1dd48");
    }

    #[test]
    fn decrypts_salted_fixture() {
        assert!(SALTED_FIXTURE.starts_with("U2FsdGVkX1"));
        assert_eq!(decrypt(SALTED_FIXTURE, PASSPHRASE).unwrap(), PLAINTEXT);
    }

    #[test]
    fn decrypts_fixture_without_marker() {
        let envelope = CipherEnvelope::parse(BARE_FIXTURE).unwrap();
        assert!(!envelope.has_marker);
        assert_eq!(envelope.salt, FIXTURE_SALT);
        assert_eq!(decrypt_envelope(&envelope, PASSPHRASE).unwrap(), PLAINTEXT);
    }

    #[test]
    fn marker_branch_splits_salt() {
        let envelope = CipherEnvelope::parse(SALTED_FIXTURE).unwrap();
        assert!(envelope.has_marker);
        assert_eq!(envelope.salt, FIXTURE_SALT);
        assert_eq!(envelope.ciphertext.len(), 64);
    }

    #[test]
    fn wrong_key_fails_loudly() {
        assert_eq!(
            decrypt(SALTED_FIXTURE, "wrong-key").unwrap_err(),
            CipherError::InvalidPadding
        );
        assert_eq!(
            decrypt(SALTED_FIXTURE, "test-key-124").unwrap_err(),
            CipherError::InvalidPadding
        );
    }

    #[test]
    fn line_wrapped_base64_is_accepted() {
        let wrapped = format!("{}\n{}\n", &SALTED_FIXTURE[..64], &SALTED_FIXTURE[64..]);
        assert_eq!(decrypt(&wrapped, PASSPHRASE).unwrap(), PLAINTEXT);
    }

    #[test]
    fn truncated_ciphertext_is_rejected_not_truncated() {
        let mut raw = STANDARD.decode(SALTED_FIXTURE).unwrap();
        raw.truncate(raw.len() - 3);
        let text = STANDARD.encode(&raw);
        assert_eq!(
            decrypt(&text, PASSPHRASE).unwrap_err(),
            CipherError::InvalidCiphertextLength(61)
        );
    }

    #[test]
    fn marker_without_ciphertext_is_rejected() {
        let mut raw = SALT_MARKER.to_vec();
        raw.extend_from_slice(&FIXTURE_SALT);
        assert_eq!(
            CipherEnvelope::from_bytes(&raw).unwrap_err(),
            CipherError::InvalidCiphertextLength(0)
        );
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(
            CipherEnvelope::from_bytes(b"Salted__abc").unwrap_err(),
            CipherError::TooShort(11)
        );
        assert_eq!(
            CipherEnvelope::from_bytes(b"abc").unwrap_err(),
            CipherError::TooShort(3)
        );
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(matches!(
            decrypt("U2FsdGVkX1!!!", PASSPHRASE).unwrap_err(),
            CipherError::InvalidBase64(_)
        ));
    }

    #[test]
    fn double_base64_is_not_unwrapped() {
        let nested = STANDARD.encode(SALTED_FIXTURE);
        assert_eq!(
            decrypt(&nested, PASSPHRASE).unwrap_err(),
            CipherError::NestedEncoding
        );
    }

    #[test]
    fn non_utf8_plaintext_is_rejected() {
        let raw = encrypt_raw(&[0xff, 0xfe, 0x00, 0x80], "k", [9; 8]);
        let text = STANDARD.encode(raw);
        assert_eq!(decrypt(&text, "k").unwrap_err(), CipherError::InvalidUtf8);
    }

    #[test]
    fn block_aligned_plaintext_round_trips() {
        let plaintext = "0123456789abcdef";
        let text = STANDARD.encode(encrypt_raw(plaintext.as_bytes(), "pw", [7; 8]));
        let envelope = CipherEnvelope::parse(&text).unwrap();
        // A full padding block follows an aligned plaintext.
        assert_eq!(envelope.ciphertext.len(), 32);
        assert_eq!(decrypt_envelope(&envelope, "pw").unwrap(), plaintext);
    }
}
