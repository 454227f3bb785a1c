//! SQLite-backed span store
//!
//! One database file holds the append-only span log plus the tenant
//! metadata around it (tenants, API keys, service discovery). The access
//! pattern is bursts of small inserts from the ingest queues interleaved
//! with long index range scans when an analysis snapshots a tenant, so the
//! connection tuning leans on WAL (snapshot reads stay open during ingest)
//! and a large mmap window over the span indexes.

mod migrations;
pub mod repositories;
pub mod schema;

pub use sqlx::SqlitePool;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::log::LevelFilter;

use crate::core::constants::{
    SQLITE_BUSY_TIMEOUT_SECS, SQLITE_CACHE_SIZE, SQLITE_DB_FILENAME, SQLITE_MAINTENANCE_INTERVAL_SECS,
    SQLITE_MAX_CONNECTIONS, SQLITE_MMAP_SIZE, SQLITE_WAL_AUTOCHECKPOINT,
};
use crate::core::storage::{AppStorage, DataSubdir};
use crate::data::error::DataError;

/// SQLite span store service
///
/// Owns the connection pool and the periodic maintenance task. Created once
/// at server startup and shared across all modules.
pub struct SqliteService {
    pool: SqlitePool,
}

impl SqliteService {
    /// Open (or create) the store under the data directory and bring the
    /// schema up to date.
    pub async fn init(storage: &AppStorage) -> Result<Self, DataError> {
        let db_path = storage.subdir(DataSubdir::Sqlite).join(SQLITE_DB_FILENAME);

        let pool = SqlitePoolOptions::new()
            .max_connections(SQLITE_MAX_CONNECTIONS)
            .connect_with(Self::connect_options(&db_path))
            .await?;

        migrations::migrate(&pool).await?;

        tracing::debug!(path = %db_path.display(), "Span store opened");
        Ok(Self { pool })
    }

    /// Connection tuning for the span workload.
    ///
    /// Durability is NORMAL rather than FULL: a span lost to a power cut is
    /// telemetry, not a ledger entry, and ingest throughput matters more.
    /// The mmap window keeps the (tenant, service, start_time) and
    /// (tenant, trace, start_time) indexes out of read syscalls.
    fn connect_options(db_path: &Path) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(SQLITE_BUSY_TIMEOUT_SECS))
            .pragma("cache_size", SQLITE_CACHE_SIZE)
            .pragma("mmap_size", SQLITE_MMAP_SIZE)
            .pragma("temp_store", "MEMORY")
            .pragma("wal_autocheckpoint", SQLITE_WAL_AUTOCHECKPOINT)
            .log_statements(LevelFilter::Trace)
    }

    /// Open an in-memory store (tests and ephemeral runs)
    pub async fn init_in_memory() -> Result<Self, DataError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        migrations::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Flush the WAL into the main database file
    pub async fn checkpoint(&self) -> Result<(), DataError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Refresh query planner statistics. The span log only ever grows, and
    /// stale statistics eventually flip the planner off the span indexes
    /// onto full scans.
    pub async fn optimize(&self) -> Result<(), DataError> {
        sqlx::query("PRAGMA optimize").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Span store closed");
    }

    /// Periodic maintenance: WAL checkpoint plus planner statistics refresh
    pub fn start_maintenance_task(
        self: &Arc<Self>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(SQLITE_MAINTENANCE_INTERVAL_SECS));
            // The first tick fires immediately; skip it so maintenance
            // never races startup migrations
            interval.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Span store maintenance task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = store.checkpoint().await {
                            tracing::warn!(error = %e, "WAL checkpoint failed");
                        }
                        if let Err(e) = store.optimize().await {
                            tracing::warn!(error = %e, "Planner statistics refresh failed");
                        } else {
                            tracing::debug!("Span store maintenance completed");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_in_memory_applies_schema() {
        let store = SqliteService::init_in_memory().await.unwrap();

        let spans_table: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='spans'",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert!(spans_table);
    }

    #[tokio::test]
    async fn test_maintenance_operations_run() {
        let store = SqliteService::init_in_memory().await.unwrap();

        store.checkpoint().await.unwrap();
        store.optimize().await.unwrap();
    }

    #[test]
    fn test_connect_options_use_wal() {
        // The debug rendering carries the journal mode pragma
        let options = SqliteService::connect_options(Path::new("spans.db"));
        assert!(format!("{:?}", options).to_lowercase().contains("wal"));
    }
}
