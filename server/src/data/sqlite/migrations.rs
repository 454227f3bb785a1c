//! Span store schema migrations
//!
//! Migrations are a static, ordered table; each applies inside its own
//! transaction and is recorded with a content checksum. A checksum mismatch
//! on an already-applied version means the running binary disagrees with
//! the database about what that migration did, and startup aborts rather
//! than ingesting into a diverged schema.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use super::schema;
use crate::data::error::DataError;
use crate::utils::crypto::sha256_hex;

struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "span_store_schema",
    sql: schema::SCHEMA,
}];

/// The tracking table is bootstrapped outside the migration list so that
/// version 1 is an ordinary migration like any later one.
const TRACKING_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    checksum TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    execution_time_ms INTEGER NOT NULL
)";

/// Bring the database up to date with the migration table
pub async fn migrate(pool: &SqlitePool) -> Result<(), DataError> {
    sqlx::query(TRACKING_TABLE).execute(pool).await?;

    let applied = applied_checksums(pool).await?;

    for migration in MIGRATIONS {
        let checksum = sha256_hex(migration.sql);
        match applied.get(&migration.version) {
            Some(recorded) if *recorded == checksum => {
                tracing::trace!(version = migration.version, "Migration already applied");
            }
            Some(recorded) => {
                return Err(DataError::MigrationFailed {
                    version: migration.version,
                    name: migration.name.to_string(),
                    error: format!(
                        "checksum mismatch: database has {}, binary has {}",
                        recorded, checksum
                    ),
                });
            }
            None => apply(pool, migration, &checksum).await?,
        }
    }

    Ok(())
}

async fn applied_checksums(pool: &SqlitePool) -> Result<HashMap<i32, String>, DataError> {
    let rows = sqlx::query("SELECT version, checksum FROM schema_migrations")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .iter()
        .map(|row| (row.get::<i32, _>("version"), row.get::<String, _>("checksum")))
        .collect())
}

async fn apply(pool: &SqlitePool, migration: &Migration, checksum: &str) -> Result<(), DataError> {
    let start = std::time::Instant::now();

    let mut tx = pool.begin().await?;

    sqlx::query(migration.sql)
        .execute(&mut *tx)
        .await
        .map_err(|e| DataError::MigrationFailed {
            version: migration.version,
            name: migration.name.to_string(),
            error: e.to_string(),
        })?;

    let elapsed_ms = start.elapsed().as_millis() as i64;
    sqlx::query(
        "INSERT INTO schema_migrations (version, name, checksum, applied_at, execution_time_ms) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(migration.version)
    .bind(migration.name)
    .bind(checksum)
    .bind(chrono::Utc::now().timestamp_millis())
    .bind(elapsed_ms)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        version = migration.version,
        name = migration.name,
        elapsed_ms,
        "Migration applied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_database_gets_schema() {
        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();

        let applied = applied_checksums(&pool).await.unwrap();
        assert_eq!(applied.len(), MIGRATIONS.len());
        assert_eq!(applied[&1], sha256_hex(schema::SCHEMA));
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();
        migrate(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_checksum_drift_aborts() {
        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();

        sqlx::query("UPDATE schema_migrations SET checksum = 'tampered' WHERE version = 1")
            .execute(&pool)
            .await
            .unwrap();

        let result = migrate(&pool).await;
        assert!(matches!(
            result,
            Err(DataError::MigrationFailed { version: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_default_tenant_is_seeded() {
        let pool = memory_pool().await;
        migrate(&pool).await.unwrap();

        let id: String = sqlx::query_scalar("SELECT id FROM tenants WHERE id = 'default'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(id, "default");
    }
}
