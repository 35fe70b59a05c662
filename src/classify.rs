//! Payload shape detection.
//!
//! [`classify`] is the only place that decides what a string of unknown
//! shape is. It runs on raw gateway bodies and again on decrypted plaintext,
//! so it must stay a pure prefix/parse check with no knowledge of where the
//! string came from.
//!
//! Decision order (first match wins):
//!
//! | Check | Tag |
//! |-------|-----|
//! | starts with `U2FsdGVkX1` | [`PayloadFormat::CipherEnvelope`] |
//! | starts with `data:image` | [`PayloadFormat::EmbeddedDataUrl`] |
//! | parses as JSON | [`PayloadFormat::JsonEnvelope`] |
//! | otherwise | [`PayloadFormat::Unknown`] |
//!
//! Leading whitespace is ignored; gateways commonly pad bodies with newlines.

use serde::Serialize;

/// Base64 of `Salted__`, the first ten characters of every salted envelope.
pub const CIPHER_ENVELOPE_PREFIX: &str = "U2FsdGVkX1";

/// Prefix of an inline image data URL.
pub const DATA_URL_IMAGE_PREFIX: &str = "data:image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    CipherEnvelope,
    EmbeddedDataUrl,
    JsonEnvelope,
    Unknown,
}

impl PayloadFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadFormat::CipherEnvelope => "cipher_envelope",
            PayloadFormat::EmbeddedDataUrl => "embedded_data_url",
            PayloadFormat::JsonEnvelope => "json_envelope",
            PayloadFormat::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload string together with its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPayload {
    pub format: PayloadFormat,
    pub text: String,
}

impl ClassifiedPayload {
    /// Classify `text` and keep it alongside the tag.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let format = classify(&text);
        Self { format, text }
    }
}

/// Classify a payload by content alone.
pub fn classify(payload: &str) -> PayloadFormat {
    let trimmed = payload.trim_start();

    if trimmed.starts_with(CIPHER_ENVELOPE_PREFIX) {
        PayloadFormat::CipherEnvelope
    } else if trimmed.starts_with(DATA_URL_IMAGE_PREFIX) {
        PayloadFormat::EmbeddedDataUrl
    } else if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        PayloadFormat::JsonEnvelope
    } else {
        PayloadFormat::Unknown
    }
}
