//! API key verification against the tenant store, with cached lookups

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use super::{TenantContext, extract_credential};
use crate::api::types::ApiError;
use crate::core::constants::{
    API_KEY_PREFIX, CACHE_TTL_API_KEY_INVALID, CACHE_TTL_API_KEY_VALID, DEFAULT_TENANT_ID,
};
use crate::data::cache::{CacheService, key};
use crate::data::sqlite::SqliteService;
use crate::data::sqlite::repositories::TenantRepository;
use crate::utils::crypto::sha256_hex;

/// Cached outcome of one key lookup. Misses are cached too, with a shorter
/// TTL, so repeated invalid keys do not hammer the store.
#[derive(Debug, Serialize, Deserialize)]
struct CachedLookup {
    tenant_id: Option<String>,
}

pub struct AuthManager {
    database: Arc<SqliteService>,
    cache: Arc<CacheService>,
    enabled: bool,
}

impl AuthManager {
    /// Initialize the manager. A configured bootstrap token is hashed and
    /// bound to the default tenant so a fresh install has one working key.
    pub async fn init(
        database: Arc<SqliteService>,
        cache: Arc<CacheService>,
        enabled: bool,
        bootstrap_token: Option<&str>,
    ) -> Result<Self, crate::data::DataError> {
        if let Some(token) = bootstrap_token {
            let repo = TenantRepository::new(database.pool());
            let key_hash = sha256_hex(token);
            let prefix: String = token.chars().take(API_KEY_PREFIX.len() + 8).collect();
            repo.insert_key(DEFAULT_TENANT_ID, &key_hash, &prefix).await?;
            tracing::debug!("Bootstrap API key registered for default tenant");
        }

        if !enabled {
            tracing::warn!("Authentication disabled; all requests bind to the default tenant");
        }

        Ok(Self {
            database,
            cache,
            enabled,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Resolve request headers to a tenant context
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<TenantContext, ApiError> {
        if !self.enabled {
            return Ok(TenantContext {
                tenant_id: DEFAULT_TENANT_ID.to_string(),
            });
        }

        let credential = extract_credential(headers)
            .ok_or_else(|| ApiError::unauthorized("Missing API key"))?;
        let key_hash = sha256_hex(&credential);

        match self.lookup(&key_hash).await? {
            Some(tenant_id) => Ok(TenantContext { tenant_id }),
            None => Err(ApiError::unauthorized("Invalid API key")),
        }
    }

    async fn lookup(&self, key_hash: &str) -> Result<Option<String>, ApiError> {
        let cache_key = key::api_key(key_hash);
        if let Some(cached) = self.cache.get_json::<CachedLookup>(&cache_key).await {
            return Ok(cached.tenant_id);
        }

        let repo = TenantRepository::new(self.database.pool());
        let tenant_id = repo
            .tenant_for_key_hash(key_hash)
            .await
            .map_err(ApiError::from_data)?;

        if tenant_id.is_some() {
            repo.touch_key(key_hash).await;
        }

        let ttl = if tenant_id.is_some() {
            Duration::from_secs(CACHE_TTL_API_KEY_VALID)
        } else {
            Duration::from_secs(CACHE_TTL_API_KEY_INVALID)
        };
        let bytes = serde_json::to_vec(&CachedLookup {
            tenant_id: tenant_id.clone(),
        })
        .unwrap_or_default();
        self.cache.set(&cache_key, bytes, Some(ttl)).await;

        Ok(tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use axum::http::header::AUTHORIZATION;

    async fn make_manager(enabled: bool, bootstrap: Option<&str>) -> AuthManager {
        let database = Arc::new(SqliteService::init_in_memory().await.unwrap());
        let cache = Arc::new(CacheService::new(&CacheConfig {
            ttl_secs: 60,
            max_entries: 100,
        }));
        AuthManager::init(database, cache, enabled, bootstrap)
            .await
            .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_disabled_auth_binds_default_tenant() {
        let manager = make_manager(false, None).await;
        let context = manager.authenticate(&HeaderMap::new()).await.unwrap();
        assert_eq!(context.tenant_id, DEFAULT_TENANT_ID);
    }

    #[tokio::test]
    async fn test_missing_credential_is_unauthorized() {
        let manager = make_manager(true, None).await;
        let result = manager.authenticate(&HeaderMap::new()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_bootstrap_token_authenticates() {
        let manager = make_manager(true, Some("alk_bootstrap")).await;

        let context = manager.authenticate(&bearer("alk_bootstrap")).await.unwrap();
        assert_eq!(context.tenant_id, DEFAULT_TENANT_ID);
    }

    #[tokio::test]
    async fn test_invalid_key_is_unauthorized() {
        let manager = make_manager(true, Some("alk_bootstrap")).await;

        let result = manager.authenticate(&bearer("alk_wrong")).await;
        assert!(matches!(result, Err(ApiError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_lookup_is_cached() {
        let manager = make_manager(true, Some("alk_bootstrap")).await;

        // First call populates the cache; second succeeds from cache
        manager.authenticate(&bearer("alk_bootstrap")).await.unwrap();
        let hash = sha256_hex("alk_bootstrap");
        assert!(manager.cache.get(&key::api_key(&hash)).await.is_some());
        manager.authenticate(&bearer("alk_bootstrap")).await.unwrap();
    }
}
