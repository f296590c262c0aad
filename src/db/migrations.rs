//! Opening the index database and bringing its schema up to date.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Executor;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("schema.sql");

/// Stored in `PRAGMA user_version` once [`SCHEMA`] has been applied.
pub const SCHEMA_VERSION: i64 = 1;

/// Open (creating if needed) the SQLite database at `db_path`.
///
/// Connections run in WAL mode with a busy timeout, since every event is its
/// own commit. The schema is idempotent and reapplied on each open.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    let from = schema_version(&pool).await?;
    apply_schema(&pool).await?;
    info!(path = db_path, from, to = SCHEMA_VERSION, "database ready");
    Ok(pool)
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    (&mut *tx).execute(SCHEMA).await?;
    (&mut *tx)
        .execute(format!("PRAGMA user_version = {}", SCHEMA_VERSION).as_str())
        .await?;
    tx.commit().await?;
    debug!(version = SCHEMA_VERSION, "schema applied");
    Ok(())
}

pub async fn schema_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let (version,): (i64,) = sqlx::query_as("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}
