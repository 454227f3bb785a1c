//! Cache key construction
//!
//! All keys are versioned and tenant-partitioned so per-tenant invalidation
//! is a prefix delete and a schema bump invalidates everything at once.

use crate::core::constants::CACHE_KEY_VERSION;

/// Prefix covering every key for one tenant
pub fn tenant_prefix(tenant_id: &str) -> String {
    format!("{}:tenant:{}:", CACHE_KEY_VERSION, tenant_id)
}

/// Key for a cached analysis document (architecture, issues, workflows, ...)
pub fn analysis(tenant_id: &str, kind: &str) -> String {
    format!("{}analysis:{}", tenant_prefix(tenant_id), kind)
}

/// Key for an API key lookup result
pub fn api_key(key_hash: &str) -> String {
    format!("{}:apikey:{}", CACHE_KEY_VERSION, key_hash)
}

/// Key for a rate limit counter window
pub fn rate_limit(bucket: &str, subject: &str, window: u64) -> String {
    format!("{}:rl:{}:{}:{}", CACHE_KEY_VERSION, bucket, subject, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_keys_are_tenant_partitioned() {
        let a = analysis("t1", "architecture");
        let b = analysis("t2", "architecture");
        assert_ne!(a, b);
        assert!(a.starts_with(&tenant_prefix("t1")));
    }

    #[test]
    fn test_tenant_prefix_covers_analysis_keys() {
        assert!(analysis("acme", "issues").starts_with(&tenant_prefix("acme")));
        assert!(!api_key("h").starts_with(&tenant_prefix("acme")));
    }

    #[test]
    fn test_rate_limit_keys_differ_by_window() {
        assert_ne!(rate_limit("api", "t1", 100), rate_limit("api", "t1", 101));
    }
}
