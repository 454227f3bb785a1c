//! Span store schema
//!
//! Timestamps are stored as epoch milliseconds so range scans stay
//! index-friendly. Migration tracking lives in `migrations`, not here.

/// Complete schema SQL (applied as migration version 1)
pub const SCHEMA: &str = r#"
-- =============================================================================
-- 1. Tenants (must be before api_keys due to FK)
-- =============================================================================
CREATE TABLE IF NOT EXISTS tenants (
    id TEXT PRIMARY KEY CHECK(length(id) >= 1 AND length(id) <= 64),
    name TEXT NOT NULL CHECK(length(name) >= 1 AND length(name) <= 100),
    -- Detection threshold overrides; NULL falls back to instance defaults
    lat_max_ms REAL CHECK(lat_max_ms IS NULL OR lat_max_ms >= 0),
    err_max REAL CHECK(err_max IS NULL OR (err_max >= 0 AND err_max <= 1)),
    depth_max INTEGER CHECK(depth_max IS NULL OR depth_max >= 1),
    fanout_max INTEGER CHECK(fanout_max IS NULL OR fanout_max >= 1),
    in_max INTEGER CHECK(in_max IS NULL OR in_max >= 1),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- =============================================================================
-- 2. API Keys (references tenants)
-- =============================================================================
CREATE TABLE IF NOT EXISTS api_keys (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    key_hash TEXT NOT NULL UNIQUE,
    key_prefix TEXT NOT NULL,
    last_used_at INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_api_keys_hash ON api_keys(key_hash);
CREATE INDEX IF NOT EXISTS idx_api_keys_tenant ON api_keys(tenant_id);

-- =============================================================================
-- 3. Spans (append-only telemetry facts)
-- =============================================================================
CREATE TABLE IF NOT EXISTS spans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id TEXT NOT NULL,
    trace_id TEXT NOT NULL CHECK(length(trace_id) >= 1 AND length(trace_id) <= 128),
    span_id TEXT NOT NULL CHECK(length(span_id) >= 1 AND length(span_id) <= 128),
    parent_span_id TEXT,
    service_name TEXT NOT NULL CHECK(length(service_name) >= 1),
    operation TEXT NOT NULL CHECK(length(operation) >= 1),
    kind TEXT NOT NULL CHECK(kind IN ('server', 'client', 'internal')),
    start_time_ms INTEGER NOT NULL,
    end_time_ms INTEGER NOT NULL CHECK(end_time_ms >= start_time_ms),
    latency_ms REAL NOT NULL CHECK(latency_ms >= 0),
    status_code INTEGER,
    error TEXT,
    downstream TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE(tenant_id, span_id)
);

CREATE INDEX IF NOT EXISTS idx_spans_trace ON spans(tenant_id, trace_id, start_time_ms);
CREATE INDEX IF NOT EXISTS idx_spans_service ON spans(tenant_id, service_name, start_time_ms);

-- =============================================================================
-- 4. Service Discovery (self-descriptions, optional classifier input)
-- =============================================================================
CREATE TABLE IF NOT EXISTS service_discovery (
    tenant_id TEXT NOT NULL,
    service_name TEXT NOT NULL CHECK(length(service_name) >= 1),
    declared_type TEXT NOT NULL CHECK(declared_type IN ('service', 'database', 'external')),
    description TEXT,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (tenant_id, service_name)
);

-- =============================================================================
-- Default Data
-- =============================================================================

-- Default tenant (bound to all requests when auth is disabled)
INSERT OR IGNORE INTO tenants (id, name, created_at, updated_at)
VALUES ('default', 'Default Tenant', strftime('%s', 'now') * 1000, strftime('%s', 'now') * 1000);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_contains_required_tables() {
        let required_tables = ["tenants", "api_keys", "spans", "service_discovery"];

        for table in required_tables {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)),
                "Schema missing table: {}",
                table
            );
        }
    }

    #[test]
    fn test_schema_contains_span_indexes() {
        assert!(SCHEMA.contains("idx_spans_trace"));
        assert!(SCHEMA.contains("idx_spans_service"));
        assert!(SCHEMA.contains("UNIQUE(tenant_id, span_id)"));
    }

    #[test]
    fn test_schema_seeds_default_tenant() {
        assert!(
            SCHEMA.contains("INSERT OR IGNORE INTO tenants"),
            "Schema missing default tenant"
        );
    }
}
