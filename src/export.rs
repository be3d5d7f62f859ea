//! Catalog export as a two-column CSV (`ID,Name`).
//!
//! Fields are written verbatim without quoting, so a name containing a
//! comma produces a row with an extra column.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::ChannelRecord;

/// Where an export landed and how many rows it holds.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CatalogExport {
    pub path: PathBuf,
    pub rows: usize,
}

/// File name of the export for a namespace, e.g. `channel-catalog.csv`.
pub fn catalog_file_name(namespace: &str) -> String {
    format!("{}-catalog.csv", namespace)
}

pub fn render_csv(records: &[ChannelRecord]) -> String {
    let mut out = String::from("ID,Name\n");
    for record in records {
        out.push_str(&record.id);
        out.push(',');
        out.push_str(&record.name);
        out.push('\n');
    }
    out
}

/// Write `records` to `path`, creating the parent directory if needed.
pub async fn write_catalog(path: &Path, records: &[ChannelRecord]) -> Result<CatalogExport> {
    let io_err = |source| Error::Io {
        path: path.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
    }
    tokio::fs::write(path, render_csv(records))
        .await
        .map_err(io_err)?;

    Ok(CatalogExport {
        path: path.to_path_buf(),
        rows: records.len(),
    })
}
