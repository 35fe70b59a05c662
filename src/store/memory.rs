//! In-memory [`RecoveryStore`] implementation.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Nothing survives the
//! process; intended for tests and for embedding the engine where the caller
//! persists results itself.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RecoveryError;
use crate::models::{
    artifact_file_name, ArtifactKind, ExtractedArtifact, RecoveryStatus, StoredArtifactRecord,
};

use super::{sha256_hex, RecoveryStore};

/// In-memory store keyed exactly like the SQLite schema.
pub struct InMemoryRecoveryStore {
    artifacts: RwLock<HashMap<(String, ArtifactKind), StoredArtifactRecord>>,
    statuses: RwLock<HashMap<String, RecoveryStatus>>,
}

impl InMemoryRecoveryStore {
    pub fn new() -> Self {
        Self {
            artifacts: RwLock::new(HashMap::new()),
            statuses: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored artifact rows across all documents.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or(0)
    }

    /// Stored artifact for `(document_id, kind)`.
    pub fn artifact(&self, document_id: &str, kind: ArtifactKind) -> Option<StoredArtifactRecord> {
        self.artifacts
            .read()
            .ok()?
            .get(&(document_id.to_string(), kind))
            .cloned()
    }

    /// All stored artifacts of a document, in kind order.
    pub fn artifacts_for(&self, document_id: &str) -> Vec<StoredArtifactRecord> {
        let Ok(artifacts) = self.artifacts.read() else {
            return Vec::new();
        };
        let mut rows: Vec<StoredArtifactRecord> = artifacts
            .values()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.kind);
        rows
    }

    fn write_artifacts(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<(String, ArtifactKind), StoredArtifactRecord>>, RecoveryError>
    {
        self.artifacts
            .write()
            .map_err(|_| RecoveryError::StorageFailure("artifact map lock poisoned".to_string()))
    }

    fn read_statuses(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<String, RecoveryStatus>>, RecoveryError> {
        self.statuses
            .read()
            .map_err(|_| RecoveryError::StorageFailure("status map lock poisoned".to_string()))
    }
}

impl Default for InMemoryRecoveryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecoveryStore for InMemoryRecoveryStore {
    async fn upsert_artifact(
        &self,
        artifact: &ExtractedArtifact,
        uploaded_by: &str,
    ) -> Result<String, RecoveryError> {
        let now = chrono::Utc::now().timestamp();
        let key = (artifact.document_id.clone(), artifact.kind);
        let mut artifacts = self.write_artifacts()?;

        let (id, created_at) = match artifacts.get(&key) {
            Some(existing) => (existing.id.clone(), existing.created_at),
            None => (Uuid::new_v4().to_string(), now),
        };

        artifacts.insert(
            key,
            StoredArtifactRecord {
                id: id.clone(),
                document_id: artifact.document_id.clone(),
                kind: artifact.kind,
                file_name: artifact_file_name(
                    &artifact.document_id,
                    artifact.kind,
                    &artifact.mime_type,
                ),
                mime_type: artifact.mime_type.clone(),
                bytes: artifact.bytes.clone(),
                size: artifact.size as i64,
                sha256: sha256_hex(&artifact.bytes),
                uploaded_by: uploaded_by.to_string(),
                created_at,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn mark_recovery_status(
        &self,
        document_id: &str,
        recovered: bool,
        detail: &str,
    ) -> Result<(), RecoveryError> {
        let now = chrono::Utc::now().timestamp();
        let mut statuses = self
            .statuses
            .write()
            .map_err(|_| RecoveryError::StorageFailure("status map lock poisoned".to_string()))?;
        statuses.insert(
            document_id.to_string(),
            RecoveryStatus {
                recovered,
                recovered_at: recovered.then_some(now),
                status_detail: detail.to_string(),
            },
        );
        Ok(())
    }

    async fn recovery_status(
        &self,
        document_id: &str,
    ) -> Result<Option<RecoveryStatus>, RecoveryError> {
        Ok(self.read_statuses()?.get(document_id).cloned())
    }
}
