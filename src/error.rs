//! Per-record error taxonomy.
//!
//! Every failure a single record can hit during recovery maps to one
//! [`RecoveryError`] variant. The orchestrator turns these into status
//! details; the interactive entry points turn them into stable error codes.
//! Configuration-level failures (bad config, unreachable database) are plain
//! `anyhow` errors and never pass through this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Every configured gateway failed for the content reference.
    #[error("all {attempts} gateways failed for {content_ref}: {last_error}")]
    FetchExhausted {
        content_ref: String,
        attempts: usize,
        last_error: String,
    },

    /// The payload could not be classified into a usable shape.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The payload is a cipher envelope but no key was supplied.
    #[error("missing key for encrypted payload")]
    MissingKey,

    /// Padding or UTF-8 validation failed after decryption.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// One artifact inside an otherwise usable payload could not be decoded.
    #[error("malformed artifact '{kind}': {reason}")]
    MalformedArtifact { kind: String, reason: String },

    /// The persistence layer rejected a write.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl RecoveryError {
    /// Stable machine-readable code, used in API responses and CLI exit output.
    pub fn code(&self) -> &'static str {
        match self {
            RecoveryError::FetchExhausted { .. } => "fetch_exhausted",
            RecoveryError::UnsupportedFormat(_) => "unsupported_format",
            RecoveryError::MissingKey => "missing_key",
            RecoveryError::DecryptionFailed(_) => "decryption_failed",
            RecoveryError::MalformedArtifact { .. } => "malformed_artifact",
            RecoveryError::StorageFailure(_) => "storage_failure",
        }
    }

    /// Text persisted in `recovery_status` when a record fails with this error.
    pub fn status_detail(&self) -> String {
        match self {
            RecoveryError::FetchExhausted { .. } => format!("fetch: {}", self),
            RecoveryError::MissingKey => self.to_string(),
            RecoveryError::DecryptionFailed(cause) => format!("decrypt: {}", cause),
            RecoveryError::StorageFailure(cause) => format!("storage: {}", cause),
            RecoveryError::UnsupportedFormat(_) | RecoveryError::MalformedArtifact { .. } => {
                self.to_string()
            }
        }
    }
}

impl From<sqlx::Error> for RecoveryError {
    fn from(err: sqlx::Error) -> Self {
        RecoveryError::StorageFailure(err.to_string())
    }
}
