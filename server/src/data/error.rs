//! Data layer error types

use thiserror::Error;

/// Errors surfaced by the storage layer
#[derive(Debug, Error)]
pub enum DataError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration to version {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("tenant not found: {0}")]
    TenantNotFound(String),
}
