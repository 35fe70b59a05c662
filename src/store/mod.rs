//! Persistence of recovered artifacts and recovery status.
//!
//! The [`RecoveryStore`] trait is the only write path the orchestrator
//! uses. Both operations are upserts:
//!
//! | Method | Key | Effect on re-run |
//! |--------|-----|------------------|
//! | [`upsert_artifact`](RecoveryStore::upsert_artifact) | `(document_id, kind)` | overwrites bytes, MIME type, size, uploader |
//! | [`mark_recovery_status`](RecoveryStore::mark_recovery_status) | `document_id` | overwrites the latest outcome |
//!
//! Two backends are provided: [`sqlite::SqliteRecoveryStore`] (durable) and
//! [`memory::InMemoryRecoveryStore`] (tests and embedding).

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::RecoveryError;
use crate::models::{ExtractedArtifact, RecoveryStatus};

pub use memory::InMemoryRecoveryStore;
pub use sqlite::SqliteRecoveryStore;

#[async_trait]
pub trait RecoveryStore: Send + Sync {
    /// Insert or replace the artifact stored under `(document_id, kind)`.
    ///
    /// Returns the row id, which stays stable across overwrites.
    async fn upsert_artifact(
        &self,
        artifact: &ExtractedArtifact,
        uploaded_by: &str,
    ) -> Result<String, RecoveryError>;

    /// Record the outcome of the latest recovery attempt.
    ///
    /// `recovered_at` is set to the current time when `recovered` is true
    /// and cleared otherwise.
    async fn mark_recovery_status(
        &self,
        document_id: &str,
        recovered: bool,
        detail: &str,
    ) -> Result<(), RecoveryError>;

    /// Latest outcome, or `None` if no attempt was ever recorded.
    async fn recovery_status(&self, document_id: &str)
        -> Result<Option<RecoveryStatus>, RecoveryError>;
}

pub(crate) fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}
