//! Recovery status reporting.
//!
//! `docvault status` prints worklist totals; `docvault status <ID>` prints
//! one record with its stored artifacts. [`record_status`] returns the same
//! data structured for `GET /status/{document_id}`.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::store::{format_ts_iso, RecoveryStore, SqliteRecoveryStore};

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub id: String,
    pub kind: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
    pub sha256: String,
    pub uploaded_by: String,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordStatusReport {
    pub document_id: String,
    pub content_ref: String,
    pub case_label: String,
    pub has_key: bool,
    pub recovered: bool,
    pub recovered_at: Option<String>,
    /// `None` until the first recovery attempt.
    pub status_detail: Option<String>,
    pub artifacts: Vec<ArtifactSummary>,
}

/// Structured status for one record, or `None` if the id is unknown.
pub async fn record_status(
    store: &SqliteRecoveryStore,
    document_id: &str,
) -> Result<Option<RecordStatusReport>> {
    let Some(record) = store.get_source_record(document_id).await? else {
        return Ok(None);
    };
    let status = store.recovery_status(document_id).await?;
    let artifacts = store.list_artifacts(document_id).await?;

    Ok(Some(RecordStatusReport {
        document_id: record.document_id,
        content_ref: record.content_ref,
        case_label: record.case_label,
        has_key: record
            .decryption_key
            .as_deref()
            .is_some_and(|k| !k.is_empty()),
        recovered: status.as_ref().is_some_and(|s| s.recovered),
        recovered_at: status
            .as_ref()
            .and_then(|s| s.recovered_at)
            .map(format_ts_iso),
        status_detail: status.map(|s| s.status_detail),
        artifacts: artifacts
            .into_iter()
            .map(|a| ArtifactSummary {
                id: a.id,
                kind: a.kind.to_string(),
                file_name: a.file_name,
                mime_type: a.mime_type,
                size: a.size,
                sha256: a.sha256,
                uploaded_by: a.uploaded_by,
                created_at: format_ts_iso(a.created_at),
                updated_at: format_ts_iso(a.updated_at),
            })
            .collect(),
    }))
}

/// CLI entry point for `docvault status [ID]`.
pub async fn run_status(config: &Config, document_id: Option<&str>) -> Result<()> {
    let store = SqliteRecoveryStore::open(config).await?;
    let result = match document_id {
        Some(id) => print_record(&store, id).await,
        None => print_summary(config, &store).await,
    };
    store.close().await;
    result
}

async fn print_record(store: &SqliteRecoveryStore, document_id: &str) -> Result<()> {
    let Some(report) = record_status(store, document_id).await? else {
        eprintln!("Error: document not found: {}", document_id);
        std::process::exit(1);
    };

    println!("--- Record ---");
    println!("document_id:  {}", report.document_id);
    println!("content_ref:  {}", report.content_ref);
    if !report.case_label.is_empty() {
        println!("case:         {}", report.case_label);
    }
    println!("encrypted:    {}", if report.has_key { "yes" } else { "no key" });
    println!("recovered:    {}", report.recovered);
    if let Some(ref at) = report.recovered_at {
        println!("recovered_at: {}", at);
    }
    println!(
        "status:       {}",
        report.status_detail.as_deref().unwrap_or("never attempted")
    );
    println!();

    println!("--- Artifacts ({}) ---", report.artifacts.len());
    for a in &report.artifacts {
        println!(
            "  {:<10} {:<28} {:>10}  {}  {}",
            a.kind,
            a.file_name,
            format_bytes(a.size.max(0) as u64),
            a.updated_at,
            a.uploaded_by
        );
    }
    Ok(())
}

async fn print_summary(config: &Config, store: &SqliteRecoveryStore) -> Result<()> {
    let s = store.summary().await?;
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docvault — Recovery Status");
    println!("==========================");
    println!();
    println!("  Database:        {}", config.db.path.display());
    println!("  Size:            {}", format_bytes(db_size));
    println!();
    println!("  Records:         {}", s.records);
    println!(
        "  Recovered:       {} / {} ({}%)",
        s.recovered,
        s.records,
        if s.records > 0 {
            (s.recovered * 100) / s.records
        } else {
            0
        }
    );
    println!("  Failed:          {}", s.failed);
    println!("  Never attempted: {}", s.never_attempted);
    println!(
        "  Artifacts:       {} ({})",
        s.artifacts,
        format_bytes(s.artifact_bytes.max(0) as u64)
    );
    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
