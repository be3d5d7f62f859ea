//! SQLite-backed [`KeyValueStore`].
//!
//! String values live in `kv`, hash values in `kv_hash` (one row per field).
//! A key holds a single kind of value: writing one kind removes the other.
//! Scans narrow candidates by the pattern's literal prefix in SQL and apply
//! the full glob in Rust.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::db;
use crate::error::Result;
use crate::migrate;

use super::{parse_counter, Fields, KeyPattern, KeyValueStore};

/// SQLite implementation of [`KeyValueStore`].
pub struct SqliteKv {
    pool: SqlitePool,
}

impl SqliteKv {
    /// Connect to (and if needed create) the database, then ensure the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SqliteKv {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn hset(&self, key: &str, fields: &Fields) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        for (field, value) in fields {
            sqlx::query(
                r#"
                INSERT INTO kv_hash (key, field, value) VALUES (?, ?, ?)
                ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(field)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<Option<Fields>> {
        let rows = sqlx::query("SELECT field, value FROM kv_hash WHERE key = ?")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            rows.iter()
                .map(|row| (row.get("field"), row.get("value")))
                .collect(),
        ))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM kv_hash WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO kv (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        if let Some(existing) = self.get(key).await? {
            parse_counter(key, &existing)?;
        }

        // The upsert itself is a single atomic statement.
        let value: String = sqlx::query_scalar(
            r#"
            INSERT INTO kv (key, value) VALUES (?, '1')
            ON CONFLICT(key) DO UPDATE SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT)
            RETURNING value
            "#,
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        parse_counter(key, &value)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let strings = sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let fields = sqlx::query("DELETE FROM kv_hash WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(strings + fields > 0)
    }

    async fn scan(&self, pattern: &KeyPattern) -> Result<Vec<String>> {
        let prefix = pattern.literal_prefix();
        let prefix_len = prefix.chars().count() as i64;

        let keys: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT key FROM kv WHERE substr(key, 1, ?) = ?
            UNION
            SELECT DISTINCT key FROM kv_hash WHERE substr(key, 1, ?) = ?
            "#,
        )
        .bind(prefix_len)
        .bind(prefix)
        .bind(prefix_len)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys.into_iter().filter(|k| pattern.matches(k)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    async fn open_tmp() -> (TempDir, SqliteKv) {
        let tmp = TempDir::new().unwrap();
        let kv = SqliteKv::open(&tmp.path().join("data").join("kv.sqlite"))
            .await
            .unwrap();
        (tmp, kv)
    }

    #[tokio::test]
    async fn hash_round_trip() {
        let (_tmp, kv) = open_tmp().await;
        let mut fields = Fields::new();
        fields.insert("id".into(), "0".into());
        fields.insert("name".into(), "Channel One".into());
        kv.hset("channel:0", &fields).await.unwrap();
        assert_eq!(kv.hgetall("channel:0").await.unwrap(), Some(fields));
        assert!(kv.hgetall("channel:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counter_increments_atomically() {
        let (_tmp, kv) = open_tmp().await;
        assert_eq!(kv.incr("channel:counter").await.unwrap(), 1);
        assert_eq!(kv.incr("channel:counter").await.unwrap(), 2);
        kv.set("channel:other", "nope").await.unwrap();
        assert!(matches!(
            kv.incr("channel:other").await,
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn scan_covers_both_value_kinds() {
        let (_tmp, kv) = open_tmp().await;
        let mut fields = Fields::new();
        fields.insert("id".into(), "0".into());
        kv.hset("channel:0", &fields).await.unwrap();
        kv.set("channel:counter", "1").await.unwrap();
        kv.set("movies:counter", "1").await.unwrap();

        let mut keys = kv
            .scan(&KeyPattern::new("channel:*").unwrap())
            .await
            .unwrap();
        keys.sort();
        assert_eq!(keys, vec!["channel:0", "channel:counter"]);

        assert!(kv.del("channel:0").await.unwrap());
        assert!(!kv.del("channel:0").await.unwrap());
    }
}
