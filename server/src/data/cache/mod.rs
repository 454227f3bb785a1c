//! In-memory cache service using moka + dashmap
//!
//! moka backs the main value cache with TinyLFU eviction and per-entry TTLs;
//! dashmap backs atomic counters for rate limiting. A tenant's cached
//! analyses are invalidated as one prefix on ingest.

pub mod error;
pub mod key;
pub mod rate_limiter;

pub use error::CacheError;
pub use rate_limiter::{RateLimitBucket, RateLimitResult, RateLimiter};

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::config::CacheConfig;

/// A cached document with its resolved TTL.
///
/// Nothing lives here forever: analysis documents get the configured TTL,
/// auth lookups pass their own shorter ones. The TTL is resolved at insert
/// time so the expiry policy below never needs a fallback.
#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    ttl: Duration,
}

/// Expiry policy: each entry lives for its own resolved TTL, unchanged by
/// reads, reset on overwrite.
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _entry: &CacheEntry,
        _read_at: Instant,
        remaining: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        remaining
    }
}

/// Counter entry for rate limiting
struct CounterEntry {
    count: AtomicI64,
    expires_at: Instant,
}

/// In-memory cache service
pub struct CacheService {
    cache: Cache<String, CacheEntry>,
    counters: DashMap<String, CounterEntry>,
    /// Counter for cleanup scheduling (increments on every incr operation)
    cleanup_ops: AtomicU64,
    /// Default TTL applied to analysis entries
    default_ttl: Duration,
}

impl CacheService {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .initial_capacity((config.max_entries as usize / 4).min(10_000))
            .expire_after(EntryTtl)
            .build();

        Self {
            cache,
            counters: DashMap::new(),
            cleanup_ops: AtomicU64::new(0),
            default_ttl: Duration::from_secs(config.ttl_secs),
        }
    }

    /// Default TTL for analysis entries
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key).await.map(|entry| entry.data.clone())
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let entry = CacheEntry {
            data: value,
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        self.cache.insert(key.to_string(), entry).await;
    }

    pub async fn delete(&self, key: &str) -> bool {
        let existed = self.cache.contains_key(key);
        self.cache.invalidate(key).await;
        existed
    }

    /// Fetch and deserialize a cached JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Dropping undecodable cache entry");
                self.cache.invalidate(key).await;
                None
            }
        }
    }

    /// Serialize and store a JSON document with the default TTL
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes, None).await;
        Ok(())
    }

    /// Delete every key with the given prefix. Returns the number removed.
    pub async fn delete_prefix(&self, prefix: &str) -> u64 {
        let mut count = 0u64;

        let keys_to_delete: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| (*k).clone())
            .collect();

        for key in keys_to_delete {
            self.cache.invalidate(&key).await;
            count += 1;
        }

        self.counters.retain(|k, _| {
            if k.starts_with(prefix) {
                count += 1;
                false
            } else {
                true
            }
        });

        count
    }

    /// Invalidate every cached analysis for a tenant (called on ingest)
    pub async fn invalidate_tenant(&self, tenant_id: &str) {
        let removed = self.delete_prefix(&key::tenant_prefix(tenant_id)).await;
        if removed > 0 {
            tracing::debug!(tenant_id, removed, "Invalidated tenant cache");
        }
    }

    /// Atomically increment a windowed counter, creating it with the TTL
    pub fn incr(&self, key: &str, ttl: Duration) -> i64 {
        use dashmap::mapref::entry::Entry;

        let now = Instant::now();
        let expires_at = now + ttl;

        // Entry API keeps the check-and-reset atomic
        let count = match self.counters.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let counter = occupied.get_mut();
                if now >= counter.expires_at {
                    counter.count.store(1, Ordering::SeqCst);
                    counter.expires_at = expires_at;
                    1
                } else {
                    counter.count.fetch_add(1, Ordering::SeqCst) + 1
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CounterEntry {
                    count: AtomicI64::new(1),
                    expires_at,
                });
                1
            }
        };

        // Periodic cleanup keeps expired counters from accumulating
        let ops = self.cleanup_ops.fetch_add(1, Ordering::Relaxed);
        if ops % 256 == 0 {
            let now = Instant::now();
            self.counters.retain(|_, entry| now < entry.expires_at);
        }

        count
    }
}
