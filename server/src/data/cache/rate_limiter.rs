//! Fixed-window rate limiter over the cache counters
//!
//! Windows are aligned to wall-clock minutes; each (bucket, subject, window)
//! triple gets its own atomic counter. Subjects are tenant ids, so one
//! tenant's burst cannot consume another's budget.

use std::sync::Arc;
use std::time::Duration;

use crate::core::constants::DEFAULT_RATE_LIMIT_WINDOW_SECS;
use crate::data::cache::{CacheService, key};

/// A named rate limit bucket with its per-window budget
#[derive(Debug, Clone, Copy)]
pub struct RateLimitBucket {
    pub name: &'static str,
    pub limit: u32,
}

impl RateLimitBucket {
    pub fn api(limit: u32) -> Self {
        Self { name: "api", limit }
    }

    pub fn ingestion(limit: u32) -> Self {
        Self {
            name: "ingestion",
            limit,
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds when the current window closes
    pub reset_at: u64,
    /// Seconds to wait before retrying, set when denied
    pub retry_after: Option<u64>,
}

pub struct RateLimiter {
    cache: Arc<CacheService>,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self {
            cache,
            window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
        }
    }

    #[cfg(test)]
    pub fn with_window(cache: Arc<CacheService>, window_secs: u64) -> Self {
        Self { cache, window_secs }
    }

    /// Count a request against the bucket for the subject and report the verdict
    pub fn check(&self, bucket: &RateLimitBucket, subject: &str) -> RateLimitResult {
        let now_secs = chrono::Utc::now().timestamp() as u64;
        let window = now_secs / self.window_secs;
        let reset_at = (window + 1) * self.window_secs;

        let key = key::rate_limit(bucket.name, subject, window);
        let count = self
            .cache
            .incr(&key, Duration::from_secs(self.window_secs));

        let allowed = count <= bucket.limit as i64;
        let remaining = (bucket.limit as i64 - count).max(0) as u32;

        RateLimitResult {
            allowed,
            limit: bucket.limit,
            remaining,
            reset_at,
            retry_after: if allowed {
                None
            } else {
                Some(reset_at.saturating_sub(now_secs).max(1))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;

    fn make_limiter() -> RateLimiter {
        let cache = Arc::new(CacheService::new(&CacheConfig {
            ttl_secs: 60,
            max_entries: 1000,
        }));
        RateLimiter::with_window(cache, 3600)
    }

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = make_limiter();
        let bucket = RateLimitBucket::api(3);

        for i in 0..3 {
            let result = limiter.check(&bucket, "t1");
            assert!(result.allowed, "request {} should be allowed", i);
        }

        let denied = limiter.check(&bucket, "t1");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.retry_after.is_some());
    }

    #[test]
    fn test_subjects_are_isolated() {
        let limiter = make_limiter();
        let bucket = RateLimitBucket::ingestion(1);

        assert!(limiter.check(&bucket, "t1").allowed);
        assert!(!limiter.check(&bucket, "t1").allowed);
        // A second tenant still has its own budget
        assert!(limiter.check(&bucket, "t2").allowed);
    }

    #[test]
    fn test_buckets_are_isolated() {
        let limiter = make_limiter();

        assert!(limiter.check(&RateLimitBucket::api(1), "t1").allowed);
        assert!(limiter.check(&RateLimitBucket::ingestion(1), "t1").allowed);
    }

    #[test]
    fn test_remaining_decrements() {
        let limiter = make_limiter();
        let bucket = RateLimitBucket::api(5);

        assert_eq!(limiter.check(&bucket, "t1").remaining, 4);
        assert_eq!(limiter.check(&bucket, "t1").remaining, 3);
    }
}
