//! SQLite-backed [`RecoveryStore`] implementation.
//!
//! Artifacts live in `document_storage` (unique on `document_id, kind`),
//! recovery outcomes in the status columns of `source_records`. Besides the
//! trait, this store also serves the worklist (`source_records` rows with a
//! content reference) and the read side used by `status`, `export`, and the
//! HTTP adapter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::RecoveryError;
use crate::migrate;
use crate::models::{
    artifact_file_name, ArtifactKind, ExtractedArtifact, RecoveryStatus, SourceRecord,
    StoredArtifactRecord,
};

use super::{sha256_hex, RecoveryStore};

/// Aggregate counts for the `status` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub records: i64,
    pub recovered: i64,
    pub failed: i64,
    pub never_attempted: i64,
    pub artifacts: i64,
    pub artifact_bytes: i64,
}

pub struct SqliteRecoveryStore {
    pool: SqlitePool,
}

impl SqliteRecoveryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert or update a source record. Status columns are left untouched.
    pub async fn upsert_source_record(&self, record: &SourceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_records (document_id, content_ref, decryption_key, case_label)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                content_ref = excluded.content_ref,
                decryption_key = excluded.decryption_key,
                case_label = excluded.case_label
            "#,
        )
        .bind(&record.document_id)
        .bind(&record.content_ref)
        .bind(&record.decryption_key)
        .bind(&record.case_label)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records that have a content reference, ordered by `document_id`.
    ///
    /// Unless `include_recovered` is set, records already marked recovered
    /// are left out before `limit` applies.
    pub async fn list_source_records(
        &self,
        limit: Option<i64>,
        include_recovered: bool,
    ) -> Result<Vec<SourceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT document_id, content_ref, decryption_key, case_label
            FROM source_records
            WHERE content_ref != ''
              AND (? OR documents_recovered = 0)
            ORDER BY document_id ASC
            LIMIT ?
            "#,
        )
        .bind(include_recovered)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_source_record).collect())
    }

    pub async fn get_source_record(&self, document_id: &str) -> Result<Option<SourceRecord>> {
        let row = sqlx::query(
            "SELECT document_id, content_ref, decryption_key, case_label FROM source_records WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_source_record))
    }

    /// Stored artifacts of one document, thumbnail first.
    pub async fn list_artifacts(&self, document_id: &str) -> Result<Vec<StoredArtifactRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, document_id, kind, file_name, mime_type, file_data_base64, file_size,
                   sha256, uploaded_by, created_at, updated_at
            FROM document_storage
            WHERE document_id = ?
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let kind_str: String = row.get("kind");
            let kind = ArtifactKind::parse(&kind_str)
                .with_context(|| format!("unknown artifact kind in database: {}", kind_str))?;
            let data: String = row.get("file_data_base64");
            let bytes = STANDARD
                .decode(data.as_bytes())
                .with_context(|| format!("corrupt file data for {} {}", document_id, kind_str))?;

            records.push(StoredArtifactRecord {
                id: row.get("id"),
                document_id: row.get("document_id"),
                kind,
                file_name: row.get("file_name"),
                mime_type: row.get("mime_type"),
                bytes,
                size: row.get("file_size"),
                sha256: row.get("sha256"),
                uploaded_by: row.get("uploaded_by"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }
        records.sort_by_key(|r| r.kind);
        Ok(records)
    }

    pub async fn load_artifact(
        &self,
        document_id: &str,
        kind: ArtifactKind,
    ) -> Result<Option<StoredArtifactRecord>> {
        Ok(self
            .list_artifacts(document_id)
            .await?
            .into_iter()
            .find(|r| r.kind == kind))
    }

    pub async fn summary(&self) -> Result<StoreSummary> {
        let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM source_records")
            .fetch_one(&self.pool)
            .await?;
        let recovered: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM source_records WHERE documents_recovered = 1")
                .fetch_one(&self.pool)
                .await?;
        let failed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM source_records WHERE documents_recovered = 0 AND recovery_status IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        let never_attempted: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM source_records WHERE recovery_status IS NULL")
                .fetch_one(&self.pool)
                .await?;
        let artifacts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_storage")
            .fetch_one(&self.pool)
            .await?;
        let artifact_bytes: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(file_size), 0) FROM document_storage")
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreSummary {
            records,
            recovered,
            failed,
            never_attempted,
            artifacts,
            artifact_bytes,
        })
    }
}

fn row_to_source_record(row: &sqlx::sqlite::SqliteRow) -> SourceRecord {
    SourceRecord {
        document_id: row.get("document_id"),
        content_ref: row.get("content_ref"),
        decryption_key: row.get("decryption_key"),
        case_label: row.get("case_label"),
    }
}

#[async_trait]
impl RecoveryStore for SqliteRecoveryStore {
    async fn upsert_artifact(
        &self,
        artifact: &ExtractedArtifact,
        uploaded_by: &str,
    ) -> Result<String, RecoveryError> {
        let now = chrono::Utc::now().timestamp();
        let kind = artifact.kind.as_str();

        // Reuse the id of an existing row so it stays stable across re-runs
        let existing_id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM document_storage WHERE document_id = ? AND kind = ?",
        )
        .bind(&artifact.document_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await?;

        let id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        sqlx::query(
            r#"
            INSERT INTO document_storage (id, document_id, kind, file_name, mime_type, file_data_base64,
                                          file_size, sha256, uploaded_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(document_id, kind) DO UPDATE SET
                file_name = excluded.file_name,
                mime_type = excluded.mime_type,
                file_data_base64 = excluded.file_data_base64,
                file_size = excluded.file_size,
                sha256 = excluded.sha256,
                uploaded_by = excluded.uploaded_by,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&artifact.document_id)
        .bind(kind)
        .bind(artifact_file_name(
            &artifact.document_id,
            artifact.kind,
            &artifact.mime_type,
        ))
        .bind(&artifact.mime_type)
        .bind(STANDARD.encode(&artifact.bytes))
        .bind(artifact.size as i64)
        .bind(sha256_hex(&artifact.bytes))
        .bind(uploaded_by)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn mark_recovery_status(
        &self,
        document_id: &str,
        recovered: bool,
        detail: &str,
    ) -> Result<(), RecoveryError> {
        let recovery_date: Option<i64> = recovered.then(|| chrono::Utc::now().timestamp());

        sqlx::query(
            r#"
            INSERT INTO source_records (document_id, documents_recovered, recovery_date, recovery_status)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(document_id) DO UPDATE SET
                documents_recovered = excluded.documents_recovered,
                recovery_date = excluded.recovery_date,
                recovery_status = excluded.recovery_status
            "#,
        )
        .bind(document_id)
        .bind(recovered)
        .bind(recovery_date)
        .bind(detail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recovery_status(
        &self,
        document_id: &str,
    ) -> Result<Option<RecoveryStatus>, RecoveryError> {
        let row = sqlx::query(
            r#"
            SELECT documents_recovered, recovery_date, recovery_status
            FROM source_records
            WHERE document_id = ? AND recovery_status IS NOT NULL
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| RecoveryStatus {
            recovered: row.get("documents_recovered"),
            recovered_at: row.get("recovery_date"),
            status_detail: row.get("recovery_status"),
        }))
    }
}
