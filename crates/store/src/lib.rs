//! Embedded relational store for traces, spans, replay runs, and prompt
//! versions.
//!
//! One SQLite file, WAL mode, foreign keys enforced on every connection.
//! All write paths run inside a transaction; a failed write rolls back
//! and surfaces as [`Error::Store`]. Trace rows carry derived columns
//! (span count, time window, totals, status) that are recomputed from the
//! committed span set on every span write — callers never write them.

mod ingest;
mod queries;
mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use bn_domain::error::{Error, Result};

/// Handle to the embedded trace database. Cheap to clone via `Arc`.
pub struct TraceStore {
    pool: Pool<Sqlite>,
    db_path: PathBuf,
}

impl TraceStore {
    /// Open (or create) the database at `path`, creating parent
    /// directories, the schema, and running forward-only migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(|e| {
                Error::Store(format!("opening database at '{}': {e}", path.display()))
            })?;

        schema::create_schema(&pool).await?;
        schema::run_migrations(&pool).await?;

        tracing::info!(path = %path.display(), "trace database ready");

        Ok(Self {
            pool,
            db_path: path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

/// Map a driver error onto the domain error type.
pub(crate) fn store_err(e: sqlx::Error) -> Error {
    Error::Store(e.to_string())
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::TraceStore;

    /// A throwaway store backed by a real file in a temp dir. The dir
    /// guard must be kept alive for the store's lifetime.
    pub async fn open_temp() -> (TraceStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = TraceStore::open(&dir.path().join("traces.db"))
            .await
            .unwrap();
        (store, dir)
    }
}
