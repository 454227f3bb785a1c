//! Tenant and API key repository

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::data::error::DataError;
use crate::data::types::TenantRecord;

pub struct TenantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TenantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a tenant by id
    pub async fn get(&self, tenant_id: &str) -> Result<Option<TenantRecord>, DataError> {
        let row = sqlx::query(
            "SELECT id, name, lat_max_ms, err_max, depth_max, fanout_max, in_max \
             FROM tenants WHERE id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_tenant))
    }

    /// Create a tenant if it does not exist
    pub async fn ensure(&self, tenant_id: &str, name: &str) -> Result<(), DataError> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT OR IGNORE INTO tenants (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(tenant_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Look up the tenant that owns an API key hash
    pub async fn tenant_for_key_hash(&self, key_hash: &str) -> Result<Option<String>, DataError> {
        let tenant_id: Option<String> =
            sqlx::query_scalar("SELECT tenant_id FROM api_keys WHERE key_hash = ?")
                .bind(key_hash)
                .fetch_optional(self.pool)
                .await?;
        Ok(tenant_id)
    }

    /// Store an API key hash for a tenant (idempotent on the hash)
    pub async fn insert_key(
        &self,
        tenant_id: &str,
        key_hash: &str,
        key_prefix: &str,
    ) -> Result<(), DataError> {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("key-{}", &key_hash[..key_hash.len().min(12)]);
        sqlx::query(
            "INSERT OR IGNORE INTO api_keys (id, tenant_id, key_hash, key_prefix, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(key_hash)
        .bind(key_prefix)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Record key usage. Failures are logged, not propagated; a stale
    /// last_used_at never fails a request.
    pub async fn touch_key(&self, key_hash: &str) {
        let now = chrono::Utc::now().timestamp_millis();
        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE key_hash = ?")
            .bind(now)
            .bind(key_hash)
            .execute(self.pool)
            .await
        {
            tracing::warn!(error = %e, "Failed to update api key last_used_at");
        }
    }
}

fn row_to_tenant(row: &SqliteRow) -> TenantRecord {
    TenantRecord {
        id: row.get("id"),
        name: row.get("name"),
        lat_max_ms: row.get("lat_max_ms"),
        err_max: row.get("err_max"),
        depth_max: row.get::<Option<i64>, _>("depth_max").map(|v| v as u32),
        fanout_max: row.get::<Option<i64>, _>("fanout_max").map(|v| v as u32),
        in_max: row.get::<Option<i64>, _>("in_max").map(|v| v as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::SqliteService;

    #[tokio::test]
    async fn test_default_tenant_exists() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());

        let tenant = repo.get("default").await.unwrap().unwrap();
        assert_eq!(tenant.id, "default");
        assert!(tenant.lat_max_ms.is_none());
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());

        repo.ensure("acme", "Acme Corp").await.unwrap();
        repo.ensure("acme", "Acme Renamed").await.unwrap();

        let tenant = repo.get("acme").await.unwrap().unwrap();
        assert_eq!(tenant.name, "Acme Corp");
    }

    #[tokio::test]
    async fn test_key_lookup() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());

        repo.insert_key("default", "hash-abc", "alk_abc").await.unwrap();

        assert_eq!(
            repo.tenant_for_key_hash("hash-abc").await.unwrap().as_deref(),
            Some("default")
        );
        assert!(repo.tenant_for_key_hash("hash-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_tenant_is_none() {
        let db = SqliteService::init_in_memory().await.unwrap();
        let repo = TenantRepository::new(db.pool());
        assert!(repo.get("ghost").await.unwrap().is_none());
    }
}
