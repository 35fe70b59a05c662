//! Shared helpers for integration tests.

#![allow(dead_code)]

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use docvault::cipher::{derive_key_material, AES_BLOCK_SIZE, SALT_MARKER};

pub const PASSPHRASE: &str = "test-key-123";
pub const FIXTURE_PLAINTEXT: &str = r#"{"test":true,"message":"Decryption is working!"}"#;
/// `openssl enc -aes-256-cbc -md md5 -pass pass:test-key-123 -S 0102030405060708 -a`
pub const FIXTURE_ENVELOPE: &str = "U2FsdGVkX18BAgMEBQYHCHf/R8L2HUmKRaM/gPRwpvVLT2X4jzZ7LGiXeN7jN00TWJU9RTYelj8mspM8vNH0x/fUJs5zOXi1X73qShoehU8=";

/// 8-byte PNG signature.
pub const THUMBNAIL_URL: &str = "data:image/png;base64,iVBORw0KGgo=";
pub const THUMBNAIL_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
/// `%PDF-1.4\n`
pub const DOCUMENT_URL: &str = "data:application/pdf;base64,JVBERi0xLjQK";
pub const DOCUMENT_BYTES: &[u8] = b"%PDF-1.4\n";

/// Produce a salted envelope the way the browser library does.
pub fn encrypt(plaintext: &str, passphrase: &str, salt: [u8; 8]) -> String {
    let material = derive_key_material(passphrase.as_bytes(), &salt);
    let len = plaintext.len();
    let mut buf = vec![0u8; len + AES_BLOCK_SIZE];
    buf[..len].copy_from_slice(plaintext.as_bytes());
    let ct = cbc::Encryptor::<Aes256>::new(
        GenericArray::from_slice(&material.key),
        GenericArray::from_slice(&material.iv),
    )
    .encrypt_padded_mut::<Pkcs7>(&mut buf, len)
    .unwrap()
    .to_vec();

    let mut raw = SALT_MARKER.to_vec();
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&ct);
    STANDARD.encode(raw)
}

/// JSON envelope carrying both artifact kinds.
pub fn envelope_json() -> String {
    serde_json::json!({
        "thumbnail": THUMBNAIL_URL,
        "fullDocument": DOCUMENT_URL,
        "title": "Deed of sale",
    })
    .to_string()
}
