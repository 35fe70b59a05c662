//! Interactive decrypt entry point.
//!
//! Takes either a content reference (fetched through the gateways) or a raw
//! blob, runs it through [`pipeline::resolve`] and extraction, and returns a
//! [`DecryptResponse`] instead of persisting anything. Used by
//! `docvault decrypt` and `POST /decrypt`.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::classify::PayloadFormat;
use crate::config::Config;
use crate::error::RecoveryError;
use crate::export::write_artifact_files;
use crate::extract::{self, Extraction};
use crate::gateway::{BlobFetcher, GatewayFetcher};
use crate::models::{artifact_file_name, ArtifactKind};
use crate::pipeline;

/// `served_by` value for blobs supplied by the caller.
pub const INLINE_SOURCE: &str = "inline";

/// Body of `POST /decrypt`. Exactly one of `content_ref` and `blob` is set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecryptRequest {
    #[serde(default)]
    pub content_ref: Option<String>,
    #[serde(default)]
    pub blob: Option<String>,
    #[serde(default)]
    pub decryption_key: Option<String>,
}

/// Where the payload comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptInput {
    ContentRef(String),
    Blob(String),
}

impl DecryptRequest {
    /// Validate the request shape. The error message is meant for the caller.
    pub fn input(&self) -> Result<DecryptInput, String> {
        let content_ref = self.content_ref.as_deref().filter(|s| !s.trim().is_empty());
        let blob = self.blob.as_deref().filter(|s| !s.trim().is_empty());
        match (content_ref, blob) {
            (Some(r), None) => Ok(DecryptInput::ContentRef(r.trim().to_string())),
            (None, Some(b)) => Ok(DecryptInput::Blob(b.to_string())),
            (Some(_), Some(_)) => Err("provide either content_ref or blob, not both".to_string()),
            (None, None) => Err("one of content_ref or blob is required".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactView {
    pub kind: ArtifactKind,
    pub mime_type: String,
    pub size: usize,
    pub data_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedView {
    pub kind: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecryptResponse {
    /// Gateway base URL that served the blob, or `"inline"`.
    pub served_by: String,
    pub initial_format: PayloadFormat,
    pub decrypted: bool,
    /// Tag of the final, possibly decrypted, payload.
    pub format: PayloadFormat,
    pub artifacts: Vec<ArtifactView>,
    pub skipped: Vec<SkippedView>,
    /// Parsed plaintext when it is JSON.
    pub json: Option<serde_json::Value>,
}

/// Everything one decrypt produced, with artifact bytes still raw.
#[derive(Debug)]
pub struct DecryptOutcome {
    pub served_by: String,
    /// File stem for written artifacts: the content reference, or `inline`.
    pub label: String,
    pub initial_format: PayloadFormat,
    pub decrypted: bool,
    pub format: PayloadFormat,
    pub extraction: Extraction,
    pub json: Option<serde_json::Value>,
}

impl DecryptOutcome {
    pub fn response(&self) -> DecryptResponse {
        DecryptResponse {
            served_by: self.served_by.clone(),
            initial_format: self.initial_format,
            decrypted: self.decrypted,
            format: self.format,
            artifacts: self
                .extraction
                .artifacts
                .iter()
                .map(|a| ArtifactView {
                    kind: a.kind,
                    mime_type: a.mime_type.clone(),
                    size: a.size,
                    data_base64: STANDARD.encode(&a.bytes),
                })
                .collect(),
            skipped: self
                .extraction
                .skipped
                .iter()
                .map(|e| SkippedView {
                    kind: match e {
                        RecoveryError::MalformedArtifact { kind, .. } => kind.clone(),
                        _ => String::new(),
                    },
                    code: e.code().to_string(),
                    message: e.to_string(),
                })
                .collect(),
            json: self.json.clone(),
        }
    }
}

/// Resolve one input to its artifacts without touching the store.
pub async fn decrypt_input(
    fetcher: &dyn BlobFetcher,
    input: &DecryptInput,
    key: Option<&str>,
) -> Result<DecryptOutcome, RecoveryError> {
    let (served_by, label, text) = match input {
        DecryptInput::ContentRef(content_ref) => {
            let blob = fetcher.fetch(content_ref).await?;
            let text = blob
                .text()
                .map_err(|_| RecoveryError::UnsupportedFormat("blob is not UTF-8 text".to_string()))?
                .to_string();
            (blob.endpoint, content_ref.replace(['/', '\\'], "_"), text)
        }
        DecryptInput::Blob(blob) => (
            INLINE_SOURCE.to_string(),
            INLINE_SOURCE.to_string(),
            blob.clone(),
        ),
    };

    let resolved = pipeline::resolve(&text, key)?;
    let extraction = extract::extract(&label, &resolved.payload)?;
    let json = match resolved.payload.format {
        PayloadFormat::JsonEnvelope => serde_json::from_str(resolved.payload.text.trim()).ok(),
        _ => None,
    };

    Ok(DecryptOutcome {
        served_by,
        label,
        initial_format: resolved.initial_format,
        decrypted: resolved.decrypted,
        format: resolved.payload.format,
        extraction,
        json,
    })
}

/// CLI options for `docvault decrypt`.
#[derive(Debug, Clone)]
pub struct DecryptCommand {
    pub content_ref: Option<String>,
    pub blob: Option<String>,
    pub file: Option<PathBuf>,
    pub key: Option<String>,
    pub out: Option<PathBuf>,
    pub json: bool,
}

/// CLI entry point. Exits with status 1 and the error code on failure.
pub async fn run_decrypt(config: &Config, cmd: DecryptCommand) -> Result<()> {
    let blob = match (&cmd.blob, &cmd.file) {
        (Some(b), _) => Some(b.clone()),
        (None, Some(path)) => Some(std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("failed to read blob file {}: {}", path.display(), e)
        })?),
        (None, None) => None,
    };
    let request = DecryptRequest {
        content_ref: cmd.content_ref.clone(),
        blob,
        decryption_key: cmd.key.clone(),
    };
    let input = request.input().map_err(|e| anyhow::anyhow!(e))?;

    let fetcher = GatewayFetcher::from_config(&config.gateways)?;
    let outcome = match decrypt_input(&fetcher, &input, request.decryption_key.as_deref()).await {
        Ok(o) => o,
        Err(e) => {
            if cmd.json {
                println!(
                    "{}",
                    serde_json::json!({ "error": { "code": e.code(), "message": e.to_string() } })
                );
            } else {
                eprintln!("Error [{}]: {}", e.code(), e);
            }
            std::process::exit(1);
        }
    };

    if let Some(ref dir) = cmd.out {
        write_outcome(&outcome, dir)?;
    }

    let response = outcome.response();
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("--- Decrypt ---");
    println!("served_by:      {}", response.served_by);
    println!("initial_format: {}", response.initial_format);
    println!("decrypted:      {}", response.decrypted);
    println!("format:         {}", response.format);
    println!();
    println!("--- Artifacts ({}) ---", response.artifacts.len());
    for a in &response.artifacts {
        println!("  {:<10} {:<24} {:>10} bytes", a.kind, a.mime_type, a.size);
    }
    for s in &response.skipped {
        println!("  {:<10} skipped: {}", s.kind, s.message);
    }
    if response.artifacts.is_empty() {
        if let Some(ref json) = response.json {
            println!();
            println!("--- Plaintext JSON ---");
            println!("{}", serde_json::to_string_pretty(json)?);
        }
    }

    Ok(())
}

fn write_outcome(outcome: &DecryptOutcome, dir: &Path) -> Result<()> {
    let files: Vec<(String, &[u8])> = outcome
        .extraction
        .artifacts
        .iter()
        .map(|a| {
            (
                artifact_file_name(&outcome.label, a.kind, &a.mime_type),
                a.bytes.as_slice(),
            )
        })
        .collect();
    let written = write_artifact_files(dir, &files)?;
    for path in &written {
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchedBlob;
    use async_trait::async_trait;

    const FIXTURE: &str = "U2FsdGVkX18BAgMEBQYHCHf/R8L2HUmKRaM/gPRwpvVLT2X4jzZ7LGiXeN7jN00TWJU9RTYelj8mspM8vNH0x/fUJs5zOXi1X73qShoehU8=";

    struct FixedFetcher(&'static str);

    #[async_trait]
    impl BlobFetcher for FixedFetcher {
        async fn fetch(&self, _content_ref: &str) -> Result<FetchedBlob, RecoveryError> {
            Ok(FetchedBlob {
                endpoint: "https://gw.test/ipfs/".to_string(),
                bytes: self.0.as_bytes().to_vec(),
            })
        }
    }

    #[test]
    fn request_requires_exactly_one_source() {
        let neither = DecryptRequest::default();
        assert!(neither.input().is_err());

        let both = DecryptRequest {
            content_ref: Some("Qm1".to_string()),
            blob: Some("x".to_string()),
            decryption_key: None,
        };
        assert!(both.input().is_err());

        let blank_ref = DecryptRequest {
            content_ref: Some("  ".to_string()),
            blob: Some("data".to_string()),
            decryption_key: None,
        };
        assert_eq!(blank_ref.input().unwrap(), DecryptInput::Blob("data".to_string()));
    }

    #[tokio::test]
    async fn inline_fixture_yields_json_without_artifacts() {
        let fetcher = FixedFetcher("");
        let outcome = decrypt_input(
            &fetcher,
            &DecryptInput::Blob(FIXTURE.to_string()),
            Some("test-key-123"),
        )
        .await
        .unwrap();

        let response = outcome.response();
        assert_eq!(response.served_by, "inline");
        assert_eq!(response.initial_format, PayloadFormat::CipherEnvelope);
        assert!(response.decrypted);
        assert_eq!(response.format, PayloadFormat::JsonEnvelope);
        assert!(response.artifacts.is_empty());
        assert_eq!(
            response.json,
            Some(serde_json::json!({"test": true, "message": "Decryption is working!"}))
        );
    }

    #[tokio::test]
    async fn content_ref_reports_serving_gateway() {
        let fetcher = FixedFetcher("data:image/png;base64,iVBORw0KGgo=");
        let outcome = decrypt_input(&fetcher, &DecryptInput::ContentRef("QmX".to_string()), None)
            .await
            .unwrap();

        let response = outcome.response();
        assert_eq!(response.served_by, "https://gw.test/ipfs/");
        assert!(!response.decrypted);
        assert_eq!(response.artifacts.len(), 2);
        assert_eq!(response.artifacts[0].kind, ArtifactKind::Thumbnail);
        assert_eq!(response.artifacts[1].mime_type, "image/png");
        assert_eq!(response.artifacts[1].data_base64, "iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn wrong_key_surfaces_typed_error() {
        let fetcher = FixedFetcher("");
        let err = decrypt_input(
            &fetcher,
            &DecryptInput::Blob(FIXTURE.to_string()),
            Some("wrong-key"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "decryption_failed");
    }
}
