//! Core data models used throughout docvault.
//!
//! These types represent the records, blobs, and artifacts that flow through
//! the recovery pipeline.

use serde::{Deserialize, Serialize};

/// An item requiring recovery, supplied by the upstream write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub document_id: String,
    pub content_ref: String,
    /// Absent for documents that were pinned in plaintext.
    #[serde(default)]
    pub decryption_key: Option<String>,
    #[serde(default)]
    pub case_label: String,
}

/// Bytes served by one gateway for one content reference.
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    /// Gateway base URL that answered with HTTP 200.
    pub endpoint: String,
    pub bytes: Vec<u8>,
}

impl FetchedBlob {
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }
}

/// The named sub-payloads a document envelope can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Thumbnail,
    Document,
}

impl ArtifactKind {
    /// All kinds, in the order they are extracted and reported.
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Thumbnail, ArtifactKind::Document];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Thumbnail => "thumbnail",
            ArtifactKind::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "thumbnail" => Some(ArtifactKind::Thumbnail),
            "document" => Some(ArtifactKind::Document),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded artifact, owned by the caller until persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArtifact {
    pub document_id: String,
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size: usize,
}

/// Latest recovery outcome for one `document_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryStatus {
    pub recovered: bool,
    /// Unix seconds; only set when the latest attempt recovered something.
    pub recovered_at: Option<i64>,
    pub status_detail: String,
}

/// A persisted artifact row from `document_storage`.
#[derive(Debug, Clone)]
pub struct StoredArtifactRecord {
    pub id: String,
    pub document_id: String,
    pub kind: ArtifactKind,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub size: i64,
    pub sha256: String,
    pub uploaded_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Map a MIME type to a file extension for exported artifacts.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "application/pdf" => "pdf",
        "application/json" => "json",
        "text/plain" => "txt",
        "text/html" => "html",
        _ => "bin",
    }
}

/// File name used when an artifact is written to disk or stored.
pub fn artifact_file_name(document_id: &str, kind: ArtifactKind, mime_type: &str) -> String {
    format!(
        "{}_{}.{}",
        document_id,
        kind.as_str(),
        extension_for_mime(mime_type)
    )
}
