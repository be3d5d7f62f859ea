//! The channel directory: records, secondary indexes, counter, and the
//! current-channel pointer, all under one fixed namespace.
//!
//! # Storage layout
//!
//! | Key | Kind | Value |
//! |-----|------|-------|
//! | `<ns>:<id>` | hash | `id`, `name`, `url`, `category` |
//! | `<ns>:name:<NORMALIZED_NAME>` | string | id |
//! | `<ns>:url:<url>` | string | id |
//! | `<ns>:counter` | string | number of successful saves |
//! | `<ns>:current` | string | id of the last channel played |
//!
//! # Consistency
//!
//! There is no cross-key locking. A reader running alongside [`Directory::save`]
//! may see a record before its index entries exist, and a reader running
//! alongside [`Directory::delete_all`] may see a partially cleared namespace.
//!
//! Saving a record under an existing id with a different name or url leaves
//! the previous index entries in place. They still point at the id, but at
//! field values that no longer exist. [`Directory::audit_indexes`] reports
//! such stale entries.
//!
//! The counter is incremented on every save, including overwrites, so it is
//! an approximate cardinality rather than an exact record count.

use std::path::PathBuf;
use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::context::OpContext;
use crate::error::{Error, Result};
use crate::export::{self, CatalogExport};
use crate::kv::{pattern, Fields, KeyPattern, KeyValueStore};
use crate::models::ChannelRecord;

/// Normalized form used in name-index keys: uppercase, whitespace runs
/// collapsed to one space, trimmed.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Index health for one namespace.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IndexAudit {
    pub records: usize,
    pub name_entries: usize,
    pub url_entries: usize,
    /// Name entries whose target is gone or whose record has another name.
    pub stale_name_entries: usize,
    /// Url entries whose target is gone or whose record has another url.
    pub stale_url_entries: usize,
}

/// Channel directory bound to one namespace.
pub struct Directory {
    kv: Arc<dyn KeyValueStore>,
    namespace: String,
    export_dir: PathBuf,
}

impl Directory {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        namespace: impl Into<String>,
        export_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kv,
            namespace: namespace.into(),
            export_dir: export_dir.into(),
        }
    }

    /// Directory for a configured catalog, exporting into `export.dir`.
    pub fn for_catalog(kv: Arc<dyn KeyValueStore>, config: &Config, catalog: &str) -> Result<Self> {
        let entry = config.catalog(catalog)?;
        Ok(Self::new(kv, entry.namespace.clone(), config.export.dir.clone()))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn export_path(&self) -> PathBuf {
        self.export_dir
            .join(export::catalog_file_name(&self.namespace))
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    fn record_key(&self, id: &str) -> String {
        format!("{}:{}", self.namespace, id)
    }

    fn name_key(&self, name: &str) -> String {
        format!("{}:name:{}", self.namespace, normalize_name(name))
    }

    fn url_key(&self, url: &str) -> String {
        format!("{}:url:{}", self.namespace, url)
    }

    fn counter_key(&self) -> String {
        format!("{}:counter", self.namespace)
    }

    fn current_key(&self) -> String {
        format!("{}:current", self.namespace)
    }

    fn pattern(&self, suffix: &str) -> Result<KeyPattern> {
        KeyPattern::new(&format!("{}:{}", pattern::escape(&self.namespace), suffix))
    }

    /// Write the record hash, bump the counter, then write both index entries.
    ///
    /// Index entries left over from an earlier value at the same id are not
    /// removed.
    pub async fn save(&self, cx: &OpContext, record: &ChannelRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(Error::InvalidRecord("record id must not be empty".into()));
        }
        if record.category.as_deref() == Some("") {
            return Err(Error::InvalidRecord(
                "record category must be absent rather than empty".into(),
            ));
        }

        cx.run(async {
            let mut fields = Fields::new();
            fields.insert("id".into(), record.id.clone());
            fields.insert("name".into(), record.name.clone());
            fields.insert("url".into(), record.url.clone());
            fields.insert(
                "category".into(),
                record.category.clone().unwrap_or_default(),
            );
            self.kv.hset(&self.record_key(&record.id), &fields).await?;

            self.kv.incr(&self.counter_key()).await?;

            self.kv.set(&self.name_key(&record.name), &record.id).await?;
            self.kv.set(&self.url_key(&record.url), &record.id).await?;

            debug!(namespace = %self.namespace, id = %record.id, name = %record.name, "saved channel");
            Ok(())
        })
        .await
    }

    pub async fn get_by_id(&self, cx: &OpContext, id: &str) -> Result<ChannelRecord> {
        cx.run(async {
            match self.load(id).await? {
                Some(record) => Ok(record),
                None => Err(Error::not_found("channel", id)),
            }
        })
        .await
    }

    /// Exact lookup through the name index.
    pub async fn get_by_name(&self, cx: &OpContext, name: &str) -> Result<ChannelRecord> {
        cx.run(async {
            let id = self
                .kv
                .get(&self.name_key(name))
                .await?
                .ok_or_else(|| Error::not_found("channel name", name))?;
            self.load(&id)
                .await?
                .ok_or_else(|| Error::not_found("channel", id))
        })
        .await
    }

    /// Exact lookup through the url index.
    pub async fn get_by_url(&self, cx: &OpContext, url: &str) -> Result<ChannelRecord> {
        cx.run(async {
            let id = self
                .kv
                .get(&self.url_key(url))
                .await?
                .ok_or_else(|| Error::not_found("channel url", url))?;
            self.load(&id)
                .await?
                .ok_or_else(|| Error::not_found("channel", id))
        })
        .await
    }

    /// Wildcard search over the name index.
    ///
    /// The term is split on whitespace, the tokens are uppercased and joined
    /// with `*`, and the result is matched anywhere in the normalized name.
    /// Results come back in scan order, which is unspecified; the full match
    /// set is returned.
    pub async fn search_by_name(&self, cx: &OpContext, term: &str) -> Result<Vec<ChannelRecord>> {
        let tokens: Vec<String> = term
            .split_whitespace()
            .map(|t| pattern::escape(&t.to_uppercase()))
            .collect();
        let pattern = if tokens.is_empty() {
            self.pattern("name:*")?
        } else {
            self.pattern(&format!("name:*{}*", tokens.join("*")))?
        };

        cx.run(async {
            let mut channels = Vec::new();
            for key in self.kv.scan(&pattern).await? {
                // Keys can vanish between scan and read while a reload runs.
                let Some(id) = self.kv.get(&key).await? else {
                    continue;
                };
                if let Some(record) = self.load(&id).await? {
                    channels.push(record);
                }
            }
            debug!(namespace = %self.namespace, term, found = channels.len(), "searched channels");
            Ok(channels)
        })
        .await
    }

    /// The save counter; 0 when it was never set.
    pub async fn count(&self, cx: &OpContext) -> Result<u64> {
        cx.run(async {
            match self.kv.get(&self.counter_key()).await? {
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                    Error::Parse(format!("counter {} is not a count: '{}'", self.counter_key(), raw))
                }),
                None => Ok(0),
            }
        })
        .await
    }

    /// Delete every key in the namespace, counter and current pointer included.
    ///
    /// Returns the number of keys removed. Not transactional.
    pub async fn delete_all(&self, cx: &OpContext) -> Result<usize> {
        let pattern = self.pattern("*")?;
        cx.run(async {
            let mut removed = 0;
            for key in self.kv.scan(&pattern).await? {
                if self.kv.del(&key).await? {
                    removed += 1;
                }
            }
            info!(namespace = %self.namespace, removed, "cleared channel directory");
            Ok(removed)
        })
        .await
    }

    /// Uniform draw from `[0, count)`.
    pub async fn random_id(&self, cx: &OpContext) -> Result<u64> {
        let count = self.count(cx).await?;
        if count == 0 {
            return Err(Error::EmptyDirectory);
        }
        Ok(rand::rng().random_range(0..count))
    }

    pub async fn register_current(&self, cx: &OpContext, record: &ChannelRecord) -> Result<()> {
        cx.run(async {
            self.kv.set(&self.current_key(), &record.id).await?;
            debug!(namespace = %self.namespace, id = %record.id, "registered current channel");
            Ok(())
        })
        .await
    }

    /// The record the current pointer names.
    ///
    /// Fails with `NotFound` when the pointer was never set, and also when
    /// it names an id that no longer exists (for example after a reload).
    pub async fn get_current(&self, cx: &OpContext) -> Result<ChannelRecord> {
        cx.run(async {
            let id = self
                .kv
                .get(&self.current_key())
                .await?
                .ok_or_else(|| Error::not_found("current channel", self.namespace.clone()))?;
            self.load(&id)
                .await?
                .ok_or_else(|| Error::not_found("channel", id))
        })
        .await
    }

    /// All records, sorted by numeric id.
    pub async fn all_records(&self, cx: &OpContext) -> Result<Vec<ChannelRecord>> {
        let pattern = self.pattern("[0-9]*")?;
        cx.run(async {
            let mut records = Vec::new();
            for key in self.kv.scan(&pattern).await? {
                if let Some(fields) = self.kv.hgetall(&key).await? {
                    let fallback = key
                        .strip_prefix(&format!("{}:", self.namespace))
                        .unwrap_or(&key)
                        .to_string();
                    records.push(record_from_fields(fallback, fields));
                }
            }
            records.sort_by(|a, b| {
                let ka = a.id.parse::<u64>().ok();
                let kb = b.id.parse::<u64>().ok();
                ka.cmp(&kb).then_with(|| a.id.cmp(&b.id))
            });
            Ok(records)
        })
        .await
    }

    /// Snapshot all records into `<export_dir>/<namespace>-catalog.csv`.
    ///
    /// The scan always completes; a failed write is returned as an `Io` error.
    pub async fn export_csv(&self, cx: &OpContext) -> Result<CatalogExport> {
        let records = self.all_records(cx).await?;
        let path = self.export_path();
        let exported = cx.run(export::write_catalog(&path, &records)).await?;
        info!(namespace = %self.namespace, rows = exported.rows, path = %exported.path.display(), "exported catalog");
        Ok(exported)
    }

    /// Count records and index entries, flagging stale index entries.
    pub async fn audit_indexes(&self, cx: &OpContext) -> Result<IndexAudit> {
        let records = self.all_records(cx).await?;
        let name_pattern = self.pattern("name:*")?;
        let url_pattern = self.pattern("url:*")?;

        cx.run(async {
            let by_id: std::collections::HashMap<&str, &ChannelRecord> =
                records.iter().map(|r| (r.id.as_str(), r)).collect();
            let mut audit = IndexAudit {
                records: records.len(),
                ..IndexAudit::default()
            };

            let name_prefix = format!("{}:name:", self.namespace);
            for key in self.kv.scan(&name_pattern).await? {
                audit.name_entries += 1;
                let indexed = key.strip_prefix(&name_prefix).unwrap_or_default();
                let target = self.kv.get(&key).await?;
                let fresh = target
                    .as_deref()
                    .and_then(|id| by_id.get(id))
                    .is_some_and(|r| normalize_name(&r.name) == indexed);
                if !fresh {
                    audit.stale_name_entries += 1;
                }
            }

            let url_prefix = format!("{}:url:", self.namespace);
            for key in self.kv.scan(&url_pattern).await? {
                audit.url_entries += 1;
                let indexed = key.strip_prefix(&url_prefix).unwrap_or_default();
                let target = self.kv.get(&key).await?;
                let fresh = target
                    .as_deref()
                    .and_then(|id| by_id.get(id))
                    .is_some_and(|r| r.url == indexed);
                if !fresh {
                    audit.stale_url_entries += 1;
                }
            }

            Ok(audit)
        })
        .await
    }

    async fn load(&self, id: &str) -> Result<Option<ChannelRecord>> {
        Ok(self
            .kv
            .hgetall(&self.record_key(id))
            .await?
            .map(|fields| record_from_fields(id.to_string(), fields)))
    }
}

fn record_from_fields(fallback_id: String, mut fields: Fields) -> ChannelRecord {
    let category = fields.remove("category").filter(|c| !c.is_empty());
    ChannelRecord {
        id: fields.remove("id").unwrap_or(fallback_id),
        name: fields.remove("name").unwrap_or_default(),
        category,
        url: fields.remove("url").unwrap_or_default(),
    }
}
