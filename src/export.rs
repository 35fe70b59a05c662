//! Write stored artifacts back out as files.
//!
//! `docvault export <ID> --out DIR` writes each stored artifact of a record
//! to `DIR/<document_id>_<kind>.<ext>`. The same writer backs
//! `docvault decrypt --out`.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::store::SqliteRecoveryStore;

/// Write `(file_name, bytes)` pairs into `dir`, creating it if needed.
///
/// Existing files are overwritten. Returns the written paths in order.
pub fn write_artifact_files(dir: &Path, files: &[(String, &[u8])]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        if name.contains('/') || name.contains('\\') || name.starts_with('.') {
            bail!("refusing to write artifact with unsafe file name: {}", name);
        }
        let path = dir.join(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Export all stored artifacts of `document_id` into `out`.
pub async fn run_export(config: &Config, document_id: &str, out: &Path) -> Result<()> {
    let store = SqliteRecoveryStore::open(config).await?;
    let artifacts = store.list_artifacts(document_id).await?;
    store.close().await;

    if artifacts.is_empty() {
        bail!("no stored artifacts for document: {}", document_id);
    }

    let files: Vec<(String, &[u8])> = artifacts
        .iter()
        .map(|a| (a.file_name.clone(), a.bytes.as_slice()))
        .collect();
    let written = write_artifact_files(out, &files)?;

    for path in &written {
        println!("{}", path.display());
    }
    eprintln!(
        "Exported {} artifact{} for {} to {}",
        written.len(),
        if written.len() == 1 { "" } else { "s" },
        document_id,
        out.display()
    );
    Ok(())
}
