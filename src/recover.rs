//! Batch recovery orchestration.
//!
//! Drives each [`SourceRecord`] through
//! `Pending → Fetching → Classifying → (Decrypting →) Extracting → Persisting`
//! and ends it in `Recovered` or `Failed`. Records are processed strictly one
//! after another with a fixed pause between gateway fetches, because public
//! gateways throttle callers that fan out.
//!
//! Per-record failures never leave this module as errors: they become the
//! record's status detail. Only a failure to read or write the status itself
//! aborts the batch, since that means the database is gone.
//!
//! | Failure | Status detail |
//! |---------|---------------|
//! | every gateway failed | `fetch: <cause>` |
//! | encrypted payload, no key | `missing key for encrypted payload` |
//! | wrong key / corrupt envelope | `decrypt: <cause>` |
//! | nothing extractable | `no artifacts found` |
//! | every upsert rejected | `storage: <cause>` |
//!
//! A record is marked recovered only after its upserts completed, so a
//! batch interrupted mid-record retries that record from `Fetching` on the
//! next run.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RecoveryError;
use crate::extract;
use crate::gateway::{BlobFetcher, GatewayFetcher};
use crate::models::{ArtifactKind, SourceRecord};
use crate::pipeline;
use crate::progress::{NoProgress, ProgressMode, RecoveryProgressEvent, RecoveryProgressReporter};
use crate::store::{RecoveryStore, SqliteRecoveryStore};

/// Position of a record in the recovery state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStage {
    Pending,
    Fetching,
    Classifying,
    Decrypting,
    Extracting,
    Persisting,
    Recovered,
    Failed,
}

impl RecoveryStage {
    /// Stage at which an error of this kind surfaces.
    fn of_error(err: &RecoveryError) -> Self {
        match err {
            RecoveryError::FetchExhausted { .. } => RecoveryStage::Fetching,
            RecoveryError::MissingKey | RecoveryError::UnsupportedFormat(_) => {
                RecoveryStage::Classifying
            }
            RecoveryError::DecryptionFailed(_) => RecoveryStage::Decrypting,
            RecoveryError::MalformedArtifact { .. } => RecoveryStage::Extracting,
            RecoveryError::StorageFailure(_) => RecoveryStage::Persisting,
        }
    }
}

/// Result of one record for one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Recovered { kinds: Vec<ArtifactKind> },
    /// `code` is a [`RecoveryError::code`] or `no_artifacts`.
    Failed { stage: RecoveryStage, code: String },
    /// Already recovered and not forced.
    Skipped,
}

impl ItemOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Recovered { .. } => "recovered",
            ItemOutcome::Failed { .. } => "failed",
            ItemOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemReport {
    pub document_id: String,
    pub outcome: ItemOutcome,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub recovered: usize,
    pub failed: usize,
    pub skipped: usize,
    /// The batch stopped early because cancellation was requested.
    pub cancelled: bool,
    pub items: Vec<ItemReport>,
}

impl BatchSummary {
    fn push(&mut self, report: ItemReport) {
        match report.outcome {
            ItemOutcome::Recovered { .. } => self.recovered += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
            ItemOutcome::Skipped => self.skipped += 1,
        }
        self.items.push(report);
    }
}

/// A record as a dry run would treat it.
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub document_id: String,
    pub content_ref: String,
    pub has_key: bool,
    pub will_skip: bool,
    pub last_status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    /// Reprocess records already marked recovered.
    pub force: bool,
    /// Pause between two gateway fetches.
    pub delay: Duration,
    pub uploaded_by: String,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            force: false,
            delay: Duration::from_millis(750),
            uploaded_by: "recovery".to_string(),
        }
    }
}

impl RecoveryOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            force: false,
            delay: Duration::from_millis(config.recovery.delay_ms),
            uploaded_by: config.recovery.uploaded_by.clone(),
        }
    }
}

pub struct RecoveryOrchestrator {
    fetcher: Arc<dyn BlobFetcher>,
    store: Arc<dyn RecoveryStore>,
    options: RecoveryOptions,
    progress: Box<dyn RecoveryProgressReporter>,
}

impl RecoveryOrchestrator {
    pub fn new(
        fetcher: Arc<dyn BlobFetcher>,
        store: Arc<dyn RecoveryStore>,
        options: RecoveryOptions,
    ) -> Self {
        Self {
            fetcher,
            store,
            options,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn RecoveryProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &RecoveryOptions {
        &self.options
    }

    /// Process `records` in order until done or `cancel` fires.
    ///
    /// A `document_id` listed more than once is processed at its first
    /// position only. Cancellation is checked between records and during the
    /// inter-record pause; the record in flight always completes.
    pub async fn run(
        &self,
        records: &[SourceRecord],
        cancel: &CancellationToken,
    ) -> Result<BatchSummary> {
        let records = dedupe_by_document(records);
        let mut summary = BatchSummary {
            total: records.len(),
            ..Default::default()
        };
        self.progress.report(RecoveryProgressEvent::Started {
            total: records.len() as u64,
        });

        let mut fetched_any = false;

        for (i, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let report = if self.should_skip(record).await? {
                debug!(document_id = %record.document_id, "already recovered, skipping");
                ItemReport {
                    document_id: record.document_id.clone(),
                    outcome: ItemOutcome::Skipped,
                    detail: "already recovered".to_string(),
                }
            } else {
                if fetched_any && !self.options.delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(self.options.delay) => {}
                        _ = cancel.cancelled() => {
                            summary.cancelled = true;
                            break;
                        }
                    }
                }
                fetched_any = true;
                self.recover_one(record).await?
            };

            self.progress.report(RecoveryProgressEvent::Finished {
                n: (i + 1) as u64,
                total: records.len() as u64,
                document_id: report.document_id.clone(),
                outcome: report.outcome.label().to_string(),
                detail: report.detail.clone(),
            });
            summary.push(report);
        }

        if summary.cancelled {
            info!(
                processed = summary.items.len(),
                total = summary.total,
                "recovery cancelled after current record"
            );
        }

        Ok(summary)
    }

    /// What `run` would do with each record, without fetching anything.
    pub async fn plan(&self, records: &[SourceRecord]) -> Result<Vec<PlannedItem>> {
        let mut planned = Vec::with_capacity(records.len());
        for record in records {
            let status = self
                .store
                .recovery_status(&record.document_id)
                .await
                .context("failed to read recovery status")?;
            planned.push(PlannedItem {
                document_id: record.document_id.clone(),
                content_ref: record.content_ref.clone(),
                has_key: record
                    .decryption_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty()),
                will_skip: !self.options.force
                    && status.as_ref().is_some_and(|s| s.recovered),
                last_status: status.map(|s| s.status_detail),
            });
        }
        Ok(planned)
    }

    async fn should_skip(&self, record: &SourceRecord) -> Result<bool> {
        if self.options.force {
            return Ok(false);
        }
        let status = self
            .store
            .recovery_status(&record.document_id)
            .await
            .context("failed to read recovery status")?;
        Ok(status.is_some_and(|s| s.recovered))
    }

    /// Run one record through the state machine and persist its status.
    ///
    /// Returns `Err` only when the status itself cannot be written.
    pub async fn recover_one(&self, record: &SourceRecord) -> Result<ItemReport> {
        let document_id = record.document_id.as_str();
        info!(document_id, case = %record.case_label, "recovering record");

        let (outcome, detail) = match self.attempt(record).await {
            Ok(kinds) => {
                let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
                let detail = format!("Recovered: {}", names.join(", "));
                (ItemOutcome::Recovered { kinds }, detail)
            }
            Err(failure) => (
                ItemOutcome::Failed {
                    stage: failure.stage,
                    code: failure.code,
                },
                failure.detail,
            ),
        };

        let recovered = matches!(outcome, ItemOutcome::Recovered { .. });
        self.store
            .mark_recovery_status(document_id, recovered, &detail)
            .await
            .with_context(|| format!("failed to record recovery status for {}", document_id))?;

        if recovered {
            info!(document_id, stage = ?RecoveryStage::Recovered, %detail, "record recovered");
        } else {
            warn!(document_id, stage = ?RecoveryStage::Failed, %detail, "record failed");
        }

        Ok(ItemReport {
            document_id: document_id.to_string(),
            outcome,
            detail,
        })
    }

    async fn attempt(&self, record: &SourceRecord) -> Result<Vec<ArtifactKind>, Failure> {
        let document_id = record.document_id.as_str();

        debug!(document_id, stage = ?RecoveryStage::Fetching);
        let blob = self.fetcher.fetch(&record.content_ref).await?;

        debug!(document_id, stage = ?RecoveryStage::Classifying, endpoint = %blob.endpoint);
        let text = blob.text().map_err(|_| {
            RecoveryError::UnsupportedFormat("blob is not UTF-8 text".to_string())
        })?;
        let resolved = pipeline::resolve(text, record.decryption_key.as_deref())?;

        debug!(
            document_id,
            stage = ?RecoveryStage::Extracting,
            decrypted = resolved.decrypted,
            format = %resolved.payload.format
        );
        let extraction = extract::extract(document_id, &resolved.payload)?;
        for skipped in &extraction.skipped {
            warn!(document_id, error = %skipped, "artifact skipped");
        }

        if extraction.artifacts.is_empty() {
            let mut detail = "no artifacts found".to_string();
            for skipped in &extraction.skipped {
                detail.push_str("; ");
                detail.push_str(&skipped.to_string());
            }
            return Err(Failure {
                stage: RecoveryStage::Extracting,
                code: "no_artifacts".to_string(),
                detail,
            });
        }

        debug!(document_id, stage = ?RecoveryStage::Persisting, count = extraction.artifacts.len());
        let mut stored = Vec::new();
        let mut first_error: Option<RecoveryError> = None;
        for artifact in &extraction.artifacts {
            match self
                .store
                .upsert_artifact(artifact, &self.options.uploaded_by)
                .await
            {
                Ok(_) => stored.push(artifact.kind),
                Err(err) => {
                    warn!(document_id, kind = %artifact.kind, error = %err, "artifact upsert failed");
                    first_error.get_or_insert(err);
                }
            }
        }

        match (stored.is_empty(), first_error) {
            (false, _) => Ok(stored),
            (true, Some(err)) => Err(err.into()),
            (true, None) => Err(Failure {
                stage: RecoveryStage::Persisting,
                code: "no_artifacts".to_string(),
                detail: "no artifacts found".to_string(),
            }),
        }
    }
}

/// Terminal failure of one record.
struct Failure {
    stage: RecoveryStage,
    code: String,
    detail: String,
}

impl From<RecoveryError> for Failure {
    fn from(err: RecoveryError) -> Self {
        Self {
            stage: RecoveryStage::of_error(&err),
            code: err.code().to_string(),
            detail: err.status_detail(),
        }
    }
}

/// First occurrence of each `document_id`, in input order.
fn dedupe_by_document(records: &[SourceRecord]) -> Vec<&SourceRecord> {
    let mut seen = HashSet::new();
    let unique: Vec<&SourceRecord> = records
        .iter()
        .filter(|r| seen.insert(r.document_id.as_str()))
        .collect();
    if unique.len() < records.len() {
        warn!(
            duplicates = records.len() - unique.len(),
            "worklist repeats document ids; later entries ignored"
        );
    }
    unique
}

/// CLI options for `docvault recover`.
#[derive(Debug, Clone)]
pub struct RecoverCommand {
    pub force: bool,
    pub limit: Option<i64>,
    pub document: Option<String>,
    pub delay_ms: Option<u64>,
    pub dry_run: bool,
    pub progress: ProgressMode,
}

/// CLI entry point: load the worklist and run one batch.
pub async fn run_recover(
    config: &Config,
    cmd: RecoverCommand,
    cancel: &CancellationToken,
) -> Result<()> {
    let store = Arc::new(SqliteRecoveryStore::open(config).await?);

    let records = match cmd.document {
        Some(ref id) => match store.get_source_record(id).await? {
            Some(rec) if !rec.content_ref.trim().is_empty() => vec![rec],
            Some(_) => bail!("record {} has no content_ref", id),
            None => bail!("document not found: {}", id),
        },
        None => store.list_source_records(cmd.limit, cmd.force).await?,
    };

    let fetcher = Arc::new(GatewayFetcher::from_config(&config.gateways)?);
    let mut options = RecoveryOptions::from_config(config);
    options.force = cmd.force;
    if let Some(ms) = cmd.delay_ms {
        options.delay = Duration::from_millis(ms);
    }

    let orchestrator = RecoveryOrchestrator::new(fetcher, store.clone(), options)
        .with_progress(cmd.progress.reporter());

    if cmd.dry_run {
        let planned = orchestrator.plan(&records).await?;
        let to_process = planned.iter().filter(|p| !p.will_skip).count();
        println!("recover (dry-run)");
        println!("  records: {}", planned.len());
        println!("  would process: {}", to_process);
        println!("  would skip: {}", planned.len() - to_process);
        for p in &planned {
            println!(
                "  {:<6} {:<24} {:<48} {}",
                if p.will_skip { "skip" } else { "fetch" },
                p.document_id,
                p.content_ref,
                p.last_status.as_deref().unwrap_or("never attempted")
            );
        }
        store.close().await;
        return Ok(());
    }

    let summary = orchestrator.run(&records, cancel).await?;
    store.close().await;

    println!("recover");
    println!("  records: {}", summary.total);
    println!("  recovered: {}", summary.recovered);
    println!("  failed: {}", summary.failed);
    println!("  skipped: {}", summary.skipped);
    if summary.cancelled {
        println!(
            "  cancelled: {} not processed",
            summary.total - summary.items.len()
        );
    }
    for item in &summary.items {
        if let ItemOutcome::Failed { .. } = item.outcome {
            println!("  FAILED {}: {}", item.document_id, item.detail);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchedBlob;
    use crate::store::InMemoryRecoveryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PNG_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

    /// Serves canned bodies by content reference and counts calls.
    struct MapFetcher {
        bodies: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                bodies: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BlobFetcher for MapFetcher {
        async fn fetch(&self, content_ref: &str) -> Result<FetchedBlob, RecoveryError> {
            self.calls.lock().unwrap().push(content_ref.to_string());
            match self.bodies.get(content_ref) {
                Some(body) => Ok(FetchedBlob {
                    endpoint: "mem://".to_string(),
                    bytes: body.clone().into_bytes(),
                }),
                None => Err(RecoveryError::FetchExhausted {
                    content_ref: content_ref.to_string(),
                    attempts: 1,
                    last_error: "HTTP 404".to_string(),
                }),
            }
        }
    }

    fn record(id: &str, content_ref: &str, key: Option<&str>) -> SourceRecord {
        SourceRecord {
            document_id: id.to_string(),
            content_ref: content_ref.to_string(),
            decryption_key: key.map(str::to_string),
            case_label: String::new(),
        }
    }

    fn orchestrator(
        fetcher: Arc<MapFetcher>,
        store: Arc<InMemoryRecoveryStore>,
        force: bool,
    ) -> RecoveryOrchestrator {
        RecoveryOrchestrator::new(
            fetcher,
            store,
            RecoveryOptions {
                force,
                delay: Duration::ZERO,
                uploaded_by: "test".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn data_url_record_recovers_both_kinds() {
        let fetcher = Arc::new(MapFetcher::new(&[("QmA", PNG_URL)]));
        let store = Arc::new(InMemoryRecoveryStore::new());
        let orch = orchestrator(fetcher, store.clone(), false);

        let summary = orch
            .run(&[record("d1", "QmA", None)], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.recovered, 1);
        assert_eq!(summary.items[0].detail, "Recovered: thumbnail, document");
        assert_eq!(store.artifacts_for("d1").len(), 2);
        let status = store.recovery_status("d1").await.unwrap().unwrap();
        assert!(status.recovered);
    }

    #[tokio::test]
    async fn failure_details_match_taxonomy() {
        let fetcher = Arc::new(MapFetcher::new(&[
            ("QmEnc", "U2FsdGVkX18BAgMEBQYHCHf/R8L2HUmKRaM/gPRwpvVLT2X4jzZ7LGiXeN7jN00TWJU9RTYelj8mspM8vNH0x/fUJs5zOXi1X73qShoehU8="),
            ("QmText", "just some text"),
        ]));
        let store = Arc::new(InMemoryRecoveryStore::new());
        let orch = orchestrator(fetcher, store.clone(), false);

        let records = [
            record("gone", "QmMissing", None),
            record("nokey", "QmEnc", None),
            record("badkey", "QmEnc", Some("wrong-key")),
            record("empty", "QmEnc", Some("test-key-123")),
            record("text", "QmText", None),
        ];
        let summary = orch.run(&records, &CancellationToken::new()).await.unwrap();

        assert_eq!(summary.failed, 5);
        let detail = |id: &str| {
            summary
                .items
                .iter()
                .find(|i| i.document_id == id)
                .map(|i| i.detail.clone())
                .unwrap()
        };
        assert!(detail("gone").starts_with("fetch: "));
        assert_eq!(detail("nokey"), "missing key for encrypted payload");
        assert!(detail("badkey").starts_with("decrypt: "));
        assert_eq!(detail("empty"), "no artifacts found");
        assert!(detail("text").starts_with("unsupported format"));

        let badkey = &summary.items[2].outcome;
        assert_eq!(
            badkey,
            &ItemOutcome::Failed {
                stage: RecoveryStage::Decrypting,
                code: "decryption_failed".to_string()
            }
        );
        assert_eq!(store.artifact_count(), 0);
    }

    #[tokio::test]
    async fn recovered_records_are_skipped_unless_forced() {
        let fetcher = Arc::new(MapFetcher::new(&[("QmA", PNG_URL)]));
        let store = Arc::new(InMemoryRecoveryStore::new());
        let records = [record("d1", "QmA", None)];

        orchestrator(fetcher.clone(), store.clone(), false)
            .run(&records, &CancellationToken::new())
            .await
            .unwrap();
        let second = orchestrator(fetcher.clone(), store.clone(), false)
            .run(&records, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.skipped, 1);
        assert_eq!(fetcher.calls().len(), 1);

        let forced = orchestrator(fetcher.clone(), store.clone(), true)
            .run(&records, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(forced.recovered, 1);
        assert_eq!(fetcher.calls().len(), 2);
        assert_eq!(store.artifact_count(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_next_record() {
        let fetcher = Arc::new(MapFetcher::new(&[("QmA", PNG_URL)]));
        let store = Arc::new(InMemoryRecoveryStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = orchestrator(fetcher.clone(), store, false)
            .run(&[record("d1", "QmA", None)], &cancel)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert!(summary.items.is_empty());
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn repeated_document_id_is_attempted_once() {
        let fetcher = Arc::new(MapFetcher::new(&[("QmA", PNG_URL)]));
        let store = Arc::new(InMemoryRecoveryStore::new());
        let records = [
            record("d1", "QmMissing", None),
            record("d2", "QmA", None),
            record("d1", "QmA", None),
        ];

        let summary = orchestrator(fetcher.clone(), store.clone(), true)
            .run(&records, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.recovered, 1);
        assert_eq!(fetcher.calls(), vec!["QmMissing", "QmA"]);
        let d1 = store.recovery_status("d1").await.unwrap().unwrap();
        assert!(!d1.recovered);
        assert!(d1.status_detail.starts_with("fetch: "));
    }

    #[tokio::test]
    async fn plan_marks_recovered_records() {
        let fetcher = Arc::new(MapFetcher::new(&[]));
        let store = Arc::new(InMemoryRecoveryStore::new());
        store
            .mark_recovery_status("d1", true, "Recovered: document")
            .await
            .unwrap();

        let planned = orchestrator(fetcher.clone(), store, false)
            .plan(&[record("d1", "QmA", None), record("d2", "QmB", Some("k"))])
            .await
            .unwrap();
        assert!(planned[0].will_skip);
        assert!(!planned[1].will_skip);
        assert!(planned[1].has_key);
        assert_eq!(planned[1].last_status, None);
        assert!(fetcher.calls().is_empty());
    }
}
