//! Worklist import.
//!
//! Loads a JSON array of [`SourceRecord`]s (as exported by the upstream
//! write path) into `source_records`. Rows are upserted by `document_id`;
//! recovery status columns are never touched, so re-importing a worklist
//! does not cause recovered records to be fetched again.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::Path;

use crate::config::Config;
use crate::models::SourceRecord;
use crate::store::SqliteRecoveryStore;

/// Parse and check a worklist file.
///
/// Rejects empty or duplicate `document_id`s. Records without a content
/// reference are kept but never picked up by `recover`.
pub fn parse_worklist(json: &str) -> Result<Vec<SourceRecord>> {
    let records: Vec<SourceRecord> =
        serde_json::from_str(json).context("worklist must be a JSON array of source records")?;

    let mut seen = HashSet::new();
    for (i, rec) in records.iter().enumerate() {
        if rec.document_id.trim().is_empty() {
            bail!("record {} has an empty document_id", i);
        }
        if !seen.insert(rec.document_id.as_str()) {
            bail!("duplicate document_id in worklist: {}", rec.document_id);
        }
    }
    Ok(records)
}

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read worklist {}", path.display()))?;
    let records = parse_worklist(&json)?;

    let store = SqliteRecoveryStore::open(config).await?;
    let mut without_ref = 0u64;
    for rec in &records {
        store.upsert_source_record(rec).await?;
        if rec.content_ref.trim().is_empty() {
            without_ref += 1;
        }
    }
    store.close().await;

    println!("import {}", path.display());
    println!("  records upserted: {}", records.len());
    if without_ref > 0 {
        println!("  without content_ref (not recoverable): {}", without_ref);
    }
    Ok(())
}
