//! Service discovery repository
//!
//! Stores service self-descriptions keyed by (tenant, service_name). The
//! graph builder's classifier prefers a declared type over its substring
//! heuristics.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use crate::data::error::DataError;
use crate::data::types::{DeclaredType, DiscoveryRecord};
use crate::utils::time::from_epoch_ms;

pub struct DiscoveryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DiscoveryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a self-description for (tenant, service_name)
    pub async fn upsert(
        &self,
        tenant_id: &str,
        service_name: &str,
        declared_type: DeclaredType,
        description: Option<&str>,
    ) -> Result<(), DataError> {
        let now = chrono::Utc::now().timestamp_millis();
        sqlx::query(
            r#"
            INSERT INTO service_discovery (tenant_id, service_name, declared_type, description, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (tenant_id, service_name) DO UPDATE SET
                declared_type = excluded.declared_type,
                description = excluded.description,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tenant_id)
        .bind(service_name)
        .bind(declared_type.as_str())
        .bind(description)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// List all self-descriptions for a tenant
    pub async fn list(&self, tenant_id: &str) -> Result<Vec<DiscoveryRecord>, DataError> {
        let rows = sqlx::query(
            "SELECT service_name, declared_type, description, updated_at \
             FROM service_discovery WHERE tenant_id = ? ORDER BY service_name",
        )
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let type_str: String = row.get("declared_type");
            let Some(declared_type) = DeclaredType::parse(&type_str) else {
                tracing::warn!(tenant_id, declared_type = %type_str, "Skipping unknown declared type");
                continue;
            };
            records.push(DiscoveryRecord {
                service_name: row.get("service_name"),
                declared_type,
                description: row.get("description"),
                updated_at: from_epoch_ms(row.get("updated_at")),
            });
        }
        Ok(records)
    }

    /// Declared types for a tenant as a lookup map for the classifier
    pub async fn declared_types(
        &self,
        tenant_id: &str,
    ) -> Result<HashMap<String, DeclaredType>, DataError> {
        Ok(self
            .list(tenant_id)
            .await?
            .into_iter()
            .map(|r| (r.service_name, r.declared_type))
            .collect())
    }
}
