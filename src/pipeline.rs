//! Classify → decrypt-if-needed → reclassify.
//!
//! Both the batch orchestrator and the interactive decrypt entry point turn
//! a raw string into a plaintext [`ClassifiedPayload`] through [`resolve`].
//! Decryption happens at most once: a plaintext that is itself another
//! cipher envelope is rejected rather than unwrapped.

use tracing::{debug, warn};

use crate::cipher::{self, CipherEnvelope, CipherError};
use crate::classify::{ClassifiedPayload, PayloadFormat};
use crate::error::RecoveryError;

/// Outcome of [`resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Tag of the input before any decryption.
    pub initial_format: PayloadFormat,
    /// Whether a decryption step ran.
    pub decrypted: bool,
    /// The plaintext payload handed to extraction.
    pub payload: ClassifiedPayload,
}

/// Turn `text` into a plaintext payload, decrypting with `key` if needed.
///
/// A key supplied for a payload that is not encrypted is ignored.
pub fn resolve(text: &str, key: Option<&str>) -> Result<Resolved, RecoveryError> {
    let initial = ClassifiedPayload::new(text);
    let initial_format = initial.format;

    if initial_format != PayloadFormat::CipherEnvelope {
        return Ok(Resolved {
            initial_format,
            decrypted: false,
            payload: initial,
        });
    }

    let key = key
        .filter(|k| !k.is_empty())
        .ok_or(RecoveryError::MissingKey)?;

    let envelope = CipherEnvelope::parse(&initial.text).map_err(decrypt_error)?;
    debug!(has_marker = envelope.has_marker, size = envelope.ciphertext.len(), "decrypting envelope");
    let plaintext = cipher::decrypt_envelope(&envelope, key).map_err(decrypt_error)?;

    let payload = ClassifiedPayload::new(plaintext);
    if payload.format == PayloadFormat::CipherEnvelope {
        warn!("decrypted plaintext is another cipher envelope; flagged for manual review");
        return Err(RecoveryError::UnsupportedFormat(
            "nested cipher envelope".to_string(),
        ));
    }

    Ok(Resolved {
        initial_format,
        decrypted: true,
        payload,
    })
}

fn decrypt_error(err: CipherError) -> RecoveryError {
    if err == CipherError::NestedEncoding {
        warn!("envelope carries a second base64 layer; flagged for manual review");
    }
    RecoveryError::DecryptionFailed(err.to_string())
}
