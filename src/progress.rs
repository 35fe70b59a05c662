//! Recovery progress reporting.
//!
//! A batch can run for a long time (one gateway round-trip plus a pause per
//! record), so `docvault recover` reports each finished record. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a recovery batch.
#[derive(Clone, Debug)]
pub enum RecoveryProgressEvent {
    /// The worklist has been loaded.
    Started { total: u64 },
    /// Record `n` of `total` reached a terminal state for this pass.
    Finished {
        n: u64,
        total: u64,
        document_id: String,
        outcome: String,
        detail: String,
    },
}

/// Reports recovery progress. Implementations write to stderr (human or JSON).
pub trait RecoveryProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the orchestrator loop.
    fn report(&self, event: RecoveryProgressEvent);
}

/// Human-friendly progress on stderr: "recover  12 / 340  doc-17  recovered  Recovered: document".
pub struct StderrProgress;

impl RecoveryProgressReporter for StderrProgress {
    fn report(&self, event: RecoveryProgressEvent) {
        let line = match &event {
            RecoveryProgressEvent::Started { total } => {
                format!("recover  {} records queued\n", format_number(*total))
            }
            RecoveryProgressEvent::Finished {
                n,
                total,
                document_id,
                outcome,
                detail,
            } => format!(
                "recover  {} / {}  {}  {}  {}\n",
                format_number(*n),
                format_number(*total),
                document_id,
                outcome,
                detail
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl RecoveryProgressReporter for JsonProgress {
    fn report(&self, event: RecoveryProgressEvent) {
        let obj = match &event {
            RecoveryProgressEvent::Started { total } => serde_json::json!({
                "event": "progress",
                "phase": "started",
                "total": total
            }),
            RecoveryProgressEvent::Finished {
                n,
                total,
                document_id,
                outcome,
                detail,
            } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "n": n,
                "total": total,
                "document_id": document_id,
                "outcome": outcome,
                "detail": detail
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl RecoveryProgressReporter for NoProgress {
    fn report(&self, _event: RecoveryProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse a `--progress` value. `auto` defers to [`default_for_tty`](Self::default_for_tty).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Self::default_for_tty()),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            "off" => Some(ProgressMode::Off),
            _ => None,
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn RecoveryProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
