//! Directory statistics and index health.
//!
//! Used by `tvr stats` to show, per catalog, the save counter next to the
//! number of records actually stored, plus index entries that no longer
//! match their record. The counter counts saves, so a counter larger than
//! the record count means some ids were saved more than once.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::context::OpContext;
use crate::directory::{Directory, IndexAudit};
use crate::kv::{self, KeyValueStore};

/// Per-catalog numbers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CatalogStats {
    pub catalog: String,
    pub namespace: String,
    pub counter: u64,
    pub current: Option<String>,
    pub audit: IndexAudit,
}

/// Gather stats for every configured catalog.
pub async fn collect(
    cx: &OpContext,
    config: &Config,
    store: Arc<dyn KeyValueStore>,
) -> crate::Result<Vec<CatalogStats>> {
    let mut out = Vec::new();
    for name in config.catalogs.keys() {
        let directory = Directory::for_catalog(store.clone(), config, name)?;
        let current = directory.get_current(cx).await.ok().map(|r| r.id);
        out.push(CatalogStats {
            catalog: name.clone(),
            namespace: directory.namespace().to_string(),
            counter: directory.count(cx).await?,
            current,
            audit: directory.audit_indexes(cx).await?,
        });
    }
    Ok(out)
}

/// Run the stats command: read the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = kv::open(&config.store).await?;
    let stats = collect(&OpContext::background(), config, store.clone()).await?;

    println!("tvremote - Directory Stats");
    println!("==========================");
    println!();
    println!("  Backend:     {}", store.backend());
    if let Some(path) = config.store.path.as_ref().filter(|_| store.backend() == "sqlite") {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        println!("  Database:    {}", path.display());
        println!("  Size:        {}", format_bytes(size));
    }
    println!();
    println!(
        "  {:<12} {:<12} {:>8} {:>8} {:>9} {:>8} {:>6}   {}",
        "CATALOG", "NAMESPACE", "COUNTER", "RECORDS", "NAME IDX", "URL IDX", "STALE", "CURRENT"
    );
    println!("  {}", "-".repeat(84));
    for s in &stats {
        println!(
            "  {:<12} {:<12} {:>8} {:>8} {:>9} {:>8} {:>6}   {}",
            s.catalog,
            s.namespace,
            s.counter,
            s.audit.records,
            s.audit.name_entries,
            s.audit.url_entries,
            s.audit.stale_name_entries + s.audit.stale_url_entries,
            s.current.as_deref().unwrap_or("-")
        );
    }
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
