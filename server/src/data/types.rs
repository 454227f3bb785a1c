//! Storage-facing record types shared by repositories and the domain layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Span kind as reported by the instrumented application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Server,
    Client,
    Internal,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKind::Server => "server",
            SpanKind::Client => "client",
            SpanKind::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "server" => Some(SpanKind::Server),
            "client" => Some(SpanKind::Client),
            "internal" => Some(SpanKind::Internal),
            _ => None,
        }
    }
}

/// A validated span ready for insertion
#[derive(Debug, Clone)]
pub struct NewSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service_name: String,
    pub operation: String,
    pub kind: SpanKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub latency_ms: f64,
    pub status_code: Option<i32>,
    pub error: Option<String>,
    pub downstream: Option<String>,
}

/// A span row read back from the store
#[derive(Debug, Clone)]
pub struct StoredSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service_name: String,
    pub operation: String,
    pub kind: SpanKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub latency_ms: f64,
    pub status_code: Option<i32>,
    pub error: Option<String>,
    pub downstream: Option<String>,
}

impl StoredSpan {
    /// Whether this span counts as failed: explicit error or 5xx status
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.status_code.is_some_and(|c| c >= 500)
    }
}

/// Outcome of a single span insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A span with this span_id already exists for the tenant; insert was a no-op
    Duplicate,
}

/// Filters for span queries. All predicates are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct SpanFilters {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub service_name: Option<String>,
    pub trace_id: Option<String>,
    pub has_downstream: Option<bool>,
}

/// Per-tenant span statistics
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SpanStats {
    pub total_spans: u64,
    pub unique_services: u64,
    pub unique_traces: u64,
    pub error_spans: u64,
}

/// A tenant row, including optional detection threshold overrides
#[derive(Debug, Clone)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub lat_max_ms: Option<f64>,
    pub err_max: Option<f64>,
    pub depth_max: Option<u32>,
    pub fanout_max: Option<u32>,
    pub in_max: Option<u32>,
}

/// Declared node type from a service self-description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredType {
    Service,
    Database,
    External,
}

impl DeclaredType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclaredType::Service => "service",
            DeclaredType::Database => "database",
            DeclaredType::External => "external",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "service" => Some(DeclaredType::Service),
            "database" => Some(DeclaredType::Database),
            "external" => Some(DeclaredType::External),
            _ => None,
        }
    }
}

/// A service self-description row, keyed by (tenant, service_name)
#[derive(Debug, Clone)]
pub struct DiscoveryRecord {
    pub service_name: String,
    pub declared_type: DeclaredType,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn span(status_code: Option<i32>, error: Option<&str>) -> StoredSpan {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        StoredSpan {
            trace_id: "t1".into(),
            span_id: "s1".into(),
            parent_span_id: None,
            service_name: "checkout".into(),
            operation: "GET /".into(),
            kind: SpanKind::Server,
            start_time: t,
            end_time: t,
            latency_ms: 0.0,
            status_code,
            error: error.map(String::from),
            downstream: None,
        }
    }

    #[test]
    fn test_is_error_on_explicit_error() {
        assert!(span(None, Some("boom")).is_error());
    }

    #[test]
    fn test_is_error_on_server_status() {
        assert!(span(Some(500), None).is_error());
        assert!(span(Some(503), None).is_error());
    }

    #[test]
    fn test_client_errors_do_not_count() {
        // 4xx responses are not failures for error-rate purposes
        assert!(!span(Some(404), None).is_error());
        assert!(!span(Some(499), None).is_error());
        assert!(!span(Some(200), None).is_error());
    }

    #[test]
    fn test_span_kind_parse_roundtrip() {
        for kind in [SpanKind::Server, SpanKind::Client, SpanKind::Internal] {
            assert_eq!(SpanKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SpanKind::parse("producer"), None);
    }

    #[test]
    fn test_declared_type_parse() {
        assert_eq!(DeclaredType::parse("database"), Some(DeclaredType::Database));
        assert_eq!(DeclaredType::parse("queue"), None);
    }
}
