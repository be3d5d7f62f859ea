//! In-memory [`KeyValueStore`] for tests and single-process deployments.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Locks are never held across
//! an await point. Contents are lost when the process exits.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{parse_counter, Fields, KeyPattern, KeyValueStore};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(Fields),
}

/// In-memory keyed store.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Value>>> {
        self.entries
            .read()
            .map_err(|_| Error::Transport("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Value>>> {
        self.entries
            .write()
            .map_err(|_| Error::Transport("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn hset(&self, key: &str, fields: &Fields) -> Result<()> {
        let mut entries = self.write()?;
        match entries.get_mut(key) {
            Some(Value::Hash(existing)) => {
                existing.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            _ => {
                entries.insert(key.to_string(), Value::Hash(fields.clone()));
            }
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Option<Fields>> {
        let entries = self.read()?;
        Ok(match entries.get(key) {
            Some(Value::Hash(fields)) if !fields.is_empty() => Some(fields.clone()),
            _ => None,
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write()?
            .insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.read()?;
        Ok(match entries.get(key) {
            Some(Value::Str(s)) => Some(s.clone()),
            _ => None,
        })
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut entries = self.write()?;
        let current = match entries.get(key) {
            Some(Value::Str(s)) => parse_counter(key, s)?,
            Some(Value::Hash(_)) => {
                return Err(Error::Parse(format!("value at {} is a hash", key)));
            }
            None => 0,
        };
        let next = current + 1;
        entries.insert(key.to_string(), Value::Str(next.to_string()));
        Ok(next)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    async fn scan(&self, pattern: &KeyPattern) -> Result<Vec<String>> {
        let entries = self.read()?;
        Ok(entries
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect())
    }
}
