//! Ingestion pipeline: playlist text → parsed entries → directory.
//!
//! A reload clears the catalog's namespace, then saves each valid entry in
//! parse order with ids `0..n`. There is no atomic swap: if the run stops
//! between the clear and the last save, the directory is left partially
//! populated until the next reload. Readers running concurrently may see
//! the namespace empty or half filled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::OpContext;
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::kv;
use crate::playlist::{self, ParsedPlaylist, SkippedEntry};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress, ProgressMode};

const PROGRESS_EVERY: u64 = 500;

/// Outcome of one reload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestReport {
    pub catalog: String,
    pub namespace: String,
    /// Keys removed by the initial clear.
    pub cleared: usize,
    pub saved: u64,
    pub skipped: Vec<SkippedEntry>,
}

/// Parse `text` and replace the directory's contents with its entries.
pub async fn ingest_text(
    cx: &OpContext,
    directory: &Directory,
    catalog: &str,
    text: &str,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    ingest_parsed(cx, directory, catalog, playlist::parse_playlist(text), progress).await
}

/// Replace the directory's contents with an already parsed playlist.
pub async fn ingest_parsed(
    cx: &OpContext,
    directory: &Directory,
    catalog: &str,
    parsed: ParsedPlaylist,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let skipped = parsed.skipped.clone();
    for entry in &skipped {
        warn!(catalog, line = entry.line, reason = %entry.reason, "skipping playlist entry");
    }

    let records = parsed.into_records();
    let total = records.len() as u64;
    progress.report(IngestProgressEvent::Parsed {
        catalog: catalog.to_string(),
        entries: total,
        skipped: skipped.len() as u64,
    });

    let cleared = directory.delete_all(cx).await?;

    let mut saved = 0u64;
    for record in &records {
        directory.save(cx, record).await?;
        saved += 1;
        if saved % PROGRESS_EVERY == 0 {
            progress.report(IngestProgressEvent::Saving {
                catalog: catalog.to_string(),
                n: saved,
                total,
            });
        }
    }
    progress.report(IngestProgressEvent::Done {
        catalog: catalog.to_string(),
        saved,
    });

    info!(
        catalog,
        namespace = directory.namespace(),
        saved,
        skipped = skipped.len(),
        "playlist ingested"
    );

    Ok(IngestReport {
        catalog: catalog.to_string(),
        namespace: directory.namespace().to_string(),
        cleared,
        saved,
        skipped,
    })
}

/// Read the playlist file of `catalog` (or `file` when given) and reload.
pub async fn ingest_catalog(
    cx: &OpContext,
    config: &Config,
    store: Arc<dyn kv::KeyValueStore>,
    catalog: &str,
    file: Option<&Path>,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let directory = Directory::for_catalog(store, config, catalog)?;
    let path = playlist_path(config, catalog, file)?;
    let parsed = playlist::read_playlist(&path).await?;
    ingest_parsed(cx, &directory, catalog, parsed, progress).await
}

/// Reload every catalog that has a playlist file configured.
pub async fn ingest_all(
    cx: &OpContext,
    config: &Config,
    store: Arc<dyn kv::KeyValueStore>,
    progress: &dyn IngestProgressReporter,
) -> Result<Vec<IngestReport>> {
    let mut reports = Vec::new();
    for (name, catalog) in &config.catalogs {
        if catalog.playlist.is_none() {
            info!(catalog = %name, "no playlist configured, skipping");
            continue;
        }
        reports.push(ingest_catalog(cx, config, store.clone(), name, None, progress).await?);
    }
    Ok(reports)
}

fn playlist_path(config: &Config, catalog: &str, file: Option<&Path>) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file.to_path_buf());
    }
    config.catalog(catalog)?.playlist.clone().ok_or_else(|| {
        Error::Configuration(format!(
            "catalogs.{}.playlist is not set; pass --file",
            catalog
        ))
    })
}

/// CLI entry point for `tvr ingest`.
pub async fn run_ingest(
    config: &Config,
    catalog: &str,
    file: Option<PathBuf>,
    mode: ProgressMode,
) -> anyhow::Result<()> {
    let store = kv::open(&config.store).await?;
    let reporter = mode.reporter();
    let report = ingest_catalog(
        &OpContext::background(),
        config,
        store,
        catalog,
        file.as_deref(),
        reporter.as_ref(),
    )
    .await
    .with_context(|| format!("ingest {} failed", catalog))?;
    print_report(&report);
    println!("ok");
    Ok(())
}

/// CLI entry point for `tvr ingest-all`.
pub async fn run_ingest_all(config: &Config, mode: ProgressMode) -> anyhow::Result<()> {
    let store = kv::open(&config.store).await?;
    let reporter = mode.reporter();
    let reports = ingest_all(&OpContext::background(), config, store, reporter.as_ref()).await?;
    for report in &reports {
        print_report(report);
    }
    println!("ok");
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!("ingest {}", report.catalog);
    println!("  namespace: {}", report.namespace);
    println!("  cleared keys: {}", report.cleared);
    println!("  saved channels: {}", report.saved);
    println!("  skipped entries: {}", report.skipped.len());
    for skipped in &report.skipped {
        println!("    line {}: {}", skipped.line, skipped.reason);
    }
}

/// Reporter for callers that do not want progress output.
pub fn no_progress() -> &'static dyn IngestProgressReporter {
    &NoProgress
}
