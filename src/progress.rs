//! Ingestion progress reporting.
//!
//! Reports observable progress during `tvr ingest` so operators see how far
//! a reload got. Progress is emitted on **stderr** so stdout remains
//! parseable for scripts. Because the reload clears the directory before
//! filling it, the last `saving` line also shows how much of the catalog
//! survived if the run was interrupted.

use std::io::Write;

/// A single progress event for ingestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// The playlist was parsed.
    Parsed {
        catalog: String,
        entries: u64,
        skipped: u64,
    },
    /// The directory was cleared and n of total records have been saved.
    Saving { catalog: String, n: u64, total: u64 },
    /// All records were saved.
    Done { catalog: String, saved: u64 },
}

/// Reports ingestion progress.
pub trait IngestProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the ingestion pipeline.
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest tv  saving  1,234 / 5,000 channels".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Parsed {
                catalog,
                entries,
                skipped,
            } => format!(
                "ingest {}  parsed  {} entries ({} skipped)\n",
                catalog,
                format_number(*entries),
                format_number(*skipped)
            ),
            IngestProgressEvent::Saving { catalog, n, total } => format!(
                "ingest {}  saving  {} / {} channels\n",
                catalog,
                format_number(*n),
                format_number(*total)
            ),
            IngestProgressEvent::Done { catalog, saved } => {
                format!("ingest {}  done  {} channels\n", catalog, format_number(*saved))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Parsed {
                catalog,
                entries,
                skipped,
            } => serde_json::json!({
                "event": "progress",
                "catalog": catalog,
                "phase": "parsed",
                "entries": entries,
                "skipped": skipped
            }),
            IngestProgressEvent::Saving { catalog, n, total } => serde_json::json!({
                "event": "progress",
                "catalog": catalog,
                "phase": "saving",
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Done { catalog, saved } => serde_json::json!({
                "event": "progress",
                "catalog": catalog,
                "phase": "done",
                "saved": saved
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

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
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

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    /// Build a reporter for this mode. Caller can pass it to ingest.
    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
