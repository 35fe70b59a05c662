use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Source records and their recovery status columns
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_records (
            document_id TEXT PRIMARY KEY,
            content_ref TEXT NOT NULL DEFAULT '',
            decryption_key TEXT,
            case_label TEXT NOT NULL DEFAULT '',
            documents_recovered INTEGER NOT NULL DEFAULT 0,
            recovery_date INTEGER,
            recovery_status TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Recovered artifacts, one row per (document_id, kind)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_storage (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            file_name TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            file_data_base64 TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            sha256 TEXT NOT NULL,
            uploaded_by TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(document_id, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_storage_document_id ON document_storage(document_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_source_records_recovered ON source_records(documents_recovered)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
