//! Event store initialization: pragmas plus a versioned, idempotent schema.

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use tracing::{debug, info, warn};

/// Layout version stamped into `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Open (creating if needed) the event store at `db_path` and apply the schema.
///
/// A store written by a newer layout is refused rather than silently reused.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas_conn(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    let found = schema_version(&pool).await?;
    if found > SCHEMA_VERSION {
        warn!(found, supported = SCHEMA_VERSION, "Event store is newer than this build");
        return Err(sqlx::Error::Configuration(
            format!(
                "event store schema version {} is newer than supported {}",
                found, SCHEMA_VERSION
            )
            .into(),
        ));
    }
    apply_schema(&pool).await?;

    info!(path = %db_path, previous_version = found, "Event store ready");
    Ok(pool)
}

async fn schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("PRAGMA user_version").fetch_one(pool).await?;
    row.try_get(0)
}

/// Statements are `IF NOT EXISTS`, so reapplying to an existing store is harmless.
async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!(version = SCHEMA_VERSION, "Applying event store schema");
    let mut tx = pool.begin().await?;
    for statement in include_str!("schema.sql").split(';') {
        let trimmed = statement.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(&mut *tx).await?;
        }
    }
    // PRAGMA does not take bind parameters.
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

/// WAL journaling, foreign keys and a busy timeout on every pooled connection.
async fn configure_pragmas_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode answers with the mode actually applied
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    debug!(journal_mode = %journal_mode, "SQLite journal mode");

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_path(temp_dir: &TempDir) -> String {
        temp_dir
            .path()
            .join("nested")
            .join("pool.db")
            .to_string_lossy()
            .to_string()
    }

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_as::<_, (String,)>(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .unwrap()
        .into_iter()
        .map(|(name,)| name)
        .collect()
    }

    #[tokio::test]
    async fn test_init_creates_parent_dir_tables_and_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = store_path(&temp_dir);

        let pool = init_db(&path).await.expect("init_db failed");
        assert!(Path::new(&path).exists());
        assert_eq!(table_names(&pool).await, vec!["delegators", "pool_events"]);
        assert_eq!(schema_version(&pool).await.unwrap(), SCHEMA_VERSION);

        let fk: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fk.0, 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_stored_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = store_path(&temp_dir);

        let pool = init_db(&path).await.unwrap();
        sqlx::query(
            "INSERT INTO pool_events (seq, time_ms, kind, account, value, payload, event_key, created_at)
             VALUES (1, 0, 'bid', '0x00', '5', '{}', 'evt:one', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        let pool = init_db(&path).await.expect("reopen failed");
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pool_events")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_newer_store_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let path = store_path(&temp_dir);

        let pool = init_db(&path).await.unwrap();
        sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1))
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let err = init_db(&path).await.unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
