//! Keyed storage abstraction.
//!
//! The [`KeyValueStore`] trait is the minimal surface the channel directory
//! needs from a Redis-like store: hashes, strings, an atomic counter, key
//! deletion, and glob scans. Implementations must be `Send + Sync`; the
//! same store is shared by every component and every concurrent caller.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`hset`](KeyValueStore::hset) | Write fields of a hash (merging with existing fields) |
//! | [`hgetall`](KeyValueStore::hgetall) | Read a whole hash |
//! | [`set`](KeyValueStore::set) / [`get`](KeyValueStore::get) | String values |
//! | [`incr`](KeyValueStore::incr) | Atomic integer increment, from 0 when absent |
//! | [`del`](KeyValueStore::del) | Remove a key of any kind |
//! | [`scan`](KeyValueStore::scan) | Keys matching a [`KeyPattern`], unspecified order |
//!
//! No operation spans more than one key atomically.

pub mod memory;
pub mod pattern;
pub mod sqlite;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::error::{Error, Result};

pub use memory::MemoryKv;
pub use pattern::KeyPattern;
pub use sqlite::SqliteKv;

/// Field map of a hash value.
pub type Fields = HashMap<String, String>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs and stats.
    fn backend(&self) -> &'static str;

    async fn hset(&self, key: &str, fields: &Fields) -> Result<()>;

    /// `None` when no hash exists under `key`.
    async fn hgetall(&self, key: &str) -> Result<Option<Fields>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Increment the integer under `key` and return the new value.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Returns whether a key was removed.
    async fn del(&self, key: &str) -> Result<bool>;

    async fn scan(&self, pattern: &KeyPattern) -> Result<Vec<String>>;
}

/// Open the backend selected by `[store]`.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryKv::new())),
        "sqlite" => {
            let path = config.path.as_ref().ok_or_else(|| {
                Error::Configuration("store.path is required for the sqlite backend".into())
            })?;
            Ok(Arc::new(SqliteKv::open(path).await?))
        }
        other => Err(Error::Configuration(format!(
            "unknown store backend '{}'; must be sqlite or memory",
            other
        ))),
    }
}

pub(crate) fn parse_counter(key: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Parse(format!("value at {} is not an integer: '{}'", key, raw)))
}
