use sqlx::SqlitePool;

use crate::error::Result;

/// Create the keyed-storage tables. Safe to run any number of times.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // String values (indexes, counter, current pointer)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Hash values (channel records), one row per field
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_hash (
            key TEXT NOT NULL,
            field TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (key, field)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
