//! Artifact extraction from classified plaintext payloads.
//!
//! Two payload shapes carry artifacts:
//!
//! - **Embedded data URL** — the whole payload is one `data:image/...`
//!   URL. It is emitted as the `document` artifact and duplicated as the
//!   `thumbnail` artifact.
//! - **JSON envelope** — an object whose values may be data URLs. Keys are
//!   looked up per kind in priority order:
//!
//! | Kind | Keys |
//! |------|------|
//! | `thumbnail` | `thumbnail`, `thumbnailUrl` |
//! | `document` | `document`, `fullDocument`, `documentUrl` |
//!
//! Values that are not data URLs (remote links, nulls, numbers) are passed
//! over and the next key is tried. A data URL that fails to decode is
//! reported as [`RecoveryError::MalformedArtifact`] in
//! [`Extraction::skipped`] without affecting the other kind.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde_json::Value;

use crate::classify::{ClassifiedPayload, PayloadFormat};
use crate::error::RecoveryError;
use crate::models::{ArtifactKind, ExtractedArtifact};

/// Standard alphabet, padding optional. Browser-generated data URLs are not
/// always padded.
const DATA_URL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DEFAULT_MIME: &str = "application/octet-stream";

/// JSON keys consulted for each artifact kind, highest priority first.
pub fn json_keys(kind: ArtifactKind) -> &'static [&'static str] {
    match kind {
        ArtifactKind::Thumbnail => &["thumbnail", "thumbnailUrl"],
        ArtifactKind::Document => &["document", "fullDocument", "documentUrl"],
    }
}

/// Result of extracting one payload.
#[derive(Debug, Default)]
pub struct Extraction {
    pub artifacts: Vec<ExtractedArtifact>,
    /// `MalformedArtifact` errors for kinds that were present but undecodable.
    pub skipped: Vec<RecoveryError>,
}

impl Extraction {
    pub fn kinds(&self) -> Vec<ArtifactKind> {
        self.artifacts.iter().map(|a| a.kind).collect()
    }
}

/// A decoded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Decode a `data:<mime>[;params],<base64>` URL.
pub fn decode_data_url(url: &str) -> Result<DataUrl, String> {
    let url = url.trim();
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URL".to_string())?;
    let (header, body) = rest
        .split_once(',')
        .ok_or_else(|| "data URL has no comma separating header and body".to_string())?;

    let mime_type = header
        .split(';')
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_string();

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = DATA_URL_BASE64
        .decode(compact.as_bytes())
        .map_err(|e| format!("body is not valid base64: {}", e))?;
    if bytes.is_empty() {
        return Err("data URL body is empty".to_string());
    }

    Ok(DataUrl { mime_type, bytes })
}

/// Extract artifacts from a plaintext payload.
///
/// Fails with `UnsupportedFormat` for `Unknown` payloads and for cipher
/// envelopes, which must be decrypted before reaching this point.
pub fn extract(document_id: &str, payload: &ClassifiedPayload) -> Result<Extraction, RecoveryError> {
    match payload.format {
        PayloadFormat::EmbeddedDataUrl => Ok(extract_data_url(document_id, &payload.text)),
        PayloadFormat::JsonEnvelope => extract_json(document_id, &payload.text),
        PayloadFormat::CipherEnvelope => Err(RecoveryError::UnsupportedFormat(
            "cipher envelope reached extraction without being decrypted".to_string(),
        )),
        PayloadFormat::Unknown => Err(RecoveryError::UnsupportedFormat(
            "payload is neither a data URL nor JSON".to_string(),
        )),
    }
}

fn extract_data_url(document_id: &str, text: &str) -> Extraction {
    let mut extraction = Extraction::default();
    match decode_data_url(text) {
        Ok(data) => {
            for kind in ArtifactKind::ALL {
                extraction
                    .artifacts
                    .push(make_artifact(document_id, kind, data.clone()));
            }
        }
        Err(reason) => extraction.skipped.push(RecoveryError::MalformedArtifact {
            kind: ArtifactKind::Document.to_string(),
            reason,
        }),
    }
    extraction
}

fn extract_json(document_id: &str, text: &str) -> Result<Extraction, RecoveryError> {
    let value: Value = serde_json::from_str(text.trim())
        .map_err(|e| RecoveryError::UnsupportedFormat(format!("invalid JSON: {}", e)))?;

    let mut extraction = Extraction::default();
    let Some(object) = value.as_object() else {
        return Ok(extraction);
    };

    for kind in ArtifactKind::ALL {
        let mut failure: Option<String> = None;
        let mut found = false;

        for key in json_keys(kind) {
            let Some(candidate) = object.get(*key).and_then(Value::as_str) else {
                continue;
            };
            if !candidate.trim_start().starts_with("data:") {
                continue;
            }
            match decode_data_url(candidate) {
                Ok(data) => {
                    extraction
                        .artifacts
                        .push(make_artifact(document_id, kind, data));
                    found = true;
                    break;
                }
                Err(reason) => {
                    failure.get_or_insert(format!("{}: {}", key, reason));
                }
            }
        }

        if !found {
            if let Some(reason) = failure {
                extraction.skipped.push(RecoveryError::MalformedArtifact {
                    kind: kind.to_string(),
                    reason,
                });
            }
        }
    }

    Ok(extraction)
}

fn make_artifact(document_id: &str, kind: ArtifactKind, data: DataUrl) -> ExtractedArtifact {
    let size = data.bytes.len();
    ExtractedArtifact {
        document_id: document_id.to_string(),
        kind,
        bytes: data.bytes,
        mime_type: data.mime_type,
        size,
    }
}
