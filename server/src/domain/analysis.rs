//! Analysis service: snapshots, graph construction, and cached read documents
//!
//! Every read is computed from a private snapshot of the tenant's spans;
//! once the snapshot is taken, computation never reaches back into the
//! store. Results for windowless requests are cached per (tenant, document)
//! and invalidated on ingest or TTL expiry. Callers provide a deadline;
//! exceeding it aborts the operation with no partial result.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::core::config::ThresholdsConfig;
use crate::data::cache::{CacheService, key};
use crate::data::sqlite::SqliteService;
use crate::data::sqlite::repositories::{DiscoveryRepository, SpanRepository, TenantRepository};
use crate::data::types::{DeclaredType, SpanFilters, StoredSpan};
use crate::domain::graph::analysis::GraphInsights;
use crate::domain::graph::{DependencyGraph, GraphEdge, GraphNode, MetricsSummary, analysis};
use crate::domain::issues::{Issue, RuleEngine, Severity, Thresholds};
use crate::domain::reasoning::{self, Workflow};
use crate::utils::time::now_rfc3339;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Data(#[from] crate::data::DataError),

    #[error("analysis deadline exceeded")]
    Timeout,

    #[error("analysis task failed")]
    TaskFailed,
}

/// The current architecture document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArchitectureDoc {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metrics_summary: MetricsSummary,
}

/// Ranked issues with severity buckets
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssuesDoc {
    pub issues: Vec<Issue>,
    pub total_count: usize,
    pub severity_buckets: BTreeMap<String, usize>,
}

/// The generated workflows document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowsDoc {
    pub workflows: Vec<Workflow>,
    pub generated_at: String,
}

/// Workflow comparison document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComparisonDoc {
    pub workflows: Vec<Workflow>,
    pub comparison_matrix: BTreeMap<String, BTreeMap<String, u64>>,
    pub recommendation: String,
}

/// One tenant's private, immutable analysis input
struct Snapshot {
    spans: Vec<StoredSpan>,
    declared: HashMap<String, DeclaredType>,
    thresholds: Thresholds,
}

pub struct AnalysisService {
    database: Arc<SqliteService>,
    cache: Arc<CacheService>,
    defaults: ThresholdsConfig,
}

impl AnalysisService {
    pub fn new(
        database: Arc<SqliteService>,
        cache: Arc<CacheService>,
        defaults: ThresholdsConfig,
    ) -> Self {
        Self {
            database,
            cache,
            defaults,
        }
    }

    /// Current architecture: nodes, edges, global metrics summary
    pub async fn architecture(
        &self,
        tenant_id: &str,
        window: &SpanFilters,
        deadline: Duration,
    ) -> Result<ArchitectureDoc, AnalysisError> {
        self.cached(tenant_id, "architecture", window, deadline, |snapshot| {
            let graph = DependencyGraph::build(&snapshot.spans, &snapshot.declared);
            ArchitectureDoc {
                nodes: graph.nodes().into_iter().cloned().collect(),
                edges: graph.edges(),
                metrics_summary: MetricsSummary::from_spans(&snapshot.spans),
            }
        })
        .await
    }

    /// Detected issues, ranked by severity
    pub async fn issues(
        &self,
        tenant_id: &str,
        window: &SpanFilters,
        deadline: Duration,
    ) -> Result<IssuesDoc, AnalysisError> {
        self.cached(tenant_id, "issues", window, deadline, |snapshot| {
            let graph = DependencyGraph::build(&snapshot.spans, &snapshot.declared);
            let issues = RuleEngine::run_all(&graph, &snapshot.thresholds);
            issues_doc(issues)
        })
        .await
    }

    /// Advanced graph measures
    pub async fn graph_analysis(
        &self,
        tenant_id: &str,
        window: &SpanFilters,
        deadline: Duration,
    ) -> Result<GraphInsights, AnalysisError> {
        self.cached(tenant_id, "graph_analysis", window, deadline, |snapshot| {
            let graph = DependencyGraph::build(&snapshot.spans, &snapshot.declared);
            analysis::analyze(&graph)
        })
        .await
    }

    /// The three generated workflows (empty when no issues are found)
    pub async fn workflows(
        &self,
        tenant_id: &str,
        window: &SpanFilters,
        deadline: Duration,
    ) -> Result<WorkflowsDoc, AnalysisError> {
        self.cached(tenant_id, "workflows", window, deadline, |snapshot| {
            let graph = DependencyGraph::build(&snapshot.spans, &snapshot.declared);
            let state = reasoning::run(&graph, &snapshot.thresholds);
            WorkflowsDoc {
                workflows: state.workflows,
                generated_at: now_rfc3339(),
            }
        })
        .await
    }

    /// Workflow comparison matrix with a recommendation
    pub async fn comparison(
        &self,
        tenant_id: &str,
        window: &SpanFilters,
        deadline: Duration,
    ) -> Result<ComparisonDoc, AnalysisError> {
        self.cached(tenant_id, "comparison", window, deadline, |snapshot| {
            let graph = DependencyGraph::build(&snapshot.spans, &snapshot.declared);
            let state = reasoning::run(&graph, &snapshot.thresholds);
            let comparison = reasoning::compare(&state.workflows, &state.issues);
            ComparisonDoc {
                workflows: state.workflows,
                comparison_matrix: comparison.comparison_matrix,
                recommendation: comparison.recommendation,
            }
        })
        .await
    }

    /// Run a snapshot-and-compute operation under the caller's deadline,
    /// consulting the cache for windowless requests.
    async fn cached<T, F>(
        &self,
        tenant_id: &str,
        kind: &str,
        window: &SpanFilters,
        deadline: Duration,
        compute: F,
    ) -> Result<T, AnalysisError>
    where
        T: serde::de::DeserializeOwned + Serialize + Send + 'static,
        F: FnOnce(&Snapshot) -> T + Send + 'static,
    {
        // Windowed requests bypass the cache: the contract only covers the
        // default view of a tenant's data
        let cache_key = if is_default_window(window) {
            Some(key::analysis(tenant_id, kind))
        } else {
            None
        };

        if let Some(ref cache_key) = cache_key {
            if let Some(doc) = self.cache.get_json::<T>(cache_key).await {
                tracing::debug!(tenant_id, kind, "Analysis cache hit");
                return Ok(doc);
            }
        }

        let result = tokio::time::timeout(deadline, async {
            let snapshot = self.load_snapshot(tenant_id, window).await?;
            // CPU-bound from here on; run off the async worker threads
            tokio::task::spawn_blocking(move || compute(&snapshot))
                .await
                .map_err(|_| AnalysisError::TaskFailed)
        })
        .await
        .map_err(|_| AnalysisError::Timeout)??;

        if let Some(ref cache_key) = cache_key {
            if let Err(e) = self.cache.set_json(cache_key, &result).await {
                tracing::warn!(tenant_id, kind, error = %e, "Failed to cache analysis");
            }
        }

        Ok(result)
    }

    /// Read one tenant's spans, declared types, and thresholds as an
    /// immutable snapshot. This is the only store access on the read path.
    async fn load_snapshot(
        &self,
        tenant_id: &str,
        window: &SpanFilters,
    ) -> Result<Snapshot, AnalysisError> {
        let pool = self.database.pool();
        let spans = SpanRepository::new(pool).query(tenant_id, window).await?;
        let declared = DiscoveryRepository::new(pool).declared_types(tenant_id).await?;
        let tenant = TenantRepository::new(pool).get(tenant_id).await?;
        let thresholds = Thresholds::resolve(&self.defaults, tenant.as_ref());

        tracing::debug!(
            tenant_id,
            spans = spans.len(),
            declared = declared.len(),
            "Snapshot loaded"
        );

        Ok(Snapshot {
            spans,
            declared,
            thresholds,
        })
    }
}

fn is_default_window(window: &SpanFilters) -> bool {
    window.from.is_none()
        && window.to.is_none()
        && window.service_name.is_none()
        && window.trace_id.is_none()
        && window.has_downstream.is_none()
}

fn issues_doc(issues: Vec<Issue>) -> IssuesDoc {
    let mut severity_buckets: BTreeMap<String, usize> = BTreeMap::new();
    for severity in [Severity::Low, Severity::Medium, Severity::High, Severity::Critical] {
        severity_buckets.insert(severity.as_str().to_string(), 0);
    }
    for issue in &issues {
        *severity_buckets
            .entry(issue.severity.as_str().to_string())
            .or_insert(0) += 1;
    }

    IssuesDoc {
        total_count: issues.len(),
        severity_buckets,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::sqlite::repositories::SpanRepository;
    use crate::data::types::{NewSpan, SpanKind};
    use chrono::{TimeZone, Utc};

    const DEADLINE: Duration = Duration::from_secs(5);

    fn make_span(span_id: &str, service: &str, downstream: Option<&str>, latency_ms: f64, status: i32) -> NewSpan {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        NewSpan {
            trace_id: "trace".into(),
            span_id: span_id.into(),
            parent_span_id: None,
            service_name: service.into(),
            operation: "op".into(),
            kind: SpanKind::Client,
            start_time: t,
            end_time: t + chrono::Duration::milliseconds(latency_ms as i64),
            latency_ms,
            status_code: Some(status),
            error: None,
            downstream: downstream.map(String::from),
        }
    }

    async fn make_service() -> (AnalysisService, Arc<SqliteService>) {
        let database = Arc::new(SqliteService::init_in_memory().await.unwrap());
        let cache = Arc::new(CacheService::new(&CacheConfig {
            ttl_secs: 60,
            max_entries: 1000,
        }));
        let service = AnalysisService::new(
            Arc::clone(&database),
            cache,
            ThresholdsConfig::default(),
        );
        (service, database)
    }

    #[tokio::test]
    async fn test_scenario_s6_empty_tenant() {
        let (service, _db) = make_service().await;

        let arch = service
            .architecture("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert!(arch.nodes.is_empty());
        assert!(arch.edges.is_empty());
        assert_eq!(arch.metrics_summary, MetricsSummary::default());

        let issues = service
            .issues("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert_eq!(issues.total_count, 0);

        let workflows = service
            .workflows("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert!(workflows.workflows.is_empty());
    }

    #[tokio::test]
    async fn test_architecture_after_ingest() {
        let (service, database) = make_service().await;
        let repo = SpanRepository::new(database.pool());
        repo.insert("default", &make_span("s1", "A", Some("B"), 100.0, 200))
            .await
            .unwrap();

        let arch = service
            .architecture("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert_eq!(arch.nodes.len(), 2);
        assert_eq!(arch.edges.len(), 1);
        assert_eq!(arch.metrics_summary.total_spans, 1);
    }

    #[tokio::test]
    async fn test_issues_and_buckets() {
        let (service, database) = make_service().await;
        let repo = SpanRepository::new(database.pool());
        repo.insert("default", &make_span("s1", "A", Some("B"), 2000.0, 500))
            .await
            .unwrap();

        let doc = service
            .issues("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert!(doc.total_count >= 2);
        assert_eq!(doc.severity_buckets["critical"], 1);
        assert!(doc.severity_buckets["high"] >= 1);
        // Ranked: critical first
        assert_eq!(doc.issues[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_workflows_present_when_issues_exist() {
        let (service, database) = make_service().await;
        let repo = SpanRepository::new(database.pool());
        repo.insert("default", &make_span("s1", "A", Some("postgres://users"), 2000.0, 200))
            .await
            .unwrap();

        let doc = service
            .workflows("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        let ids: Vec<&str> = doc.workflows.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["workflow-minimal", "workflow-performance", "workflow-cost"]);
    }

    #[tokio::test]
    async fn test_comparison_document() {
        let (service, database) = make_service().await;
        let repo = SpanRepository::new(database.pool());
        repo.insert("default", &make_span("s1", "A", Some("B"), 2000.0, 500))
            .await
            .unwrap();

        let doc = service
            .comparison("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert_eq!(doc.workflows.len(), 3);
        assert_eq!(doc.comparison_matrix["complexity"].len(), 3);
        assert!(!doc.recommendation.is_empty());
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let (service, database) = make_service().await;
        let repo = SpanRepository::new(database.pool());
        repo.insert("t1", &make_span("s1", "secret-svc", None, 10.0, 200))
            .await
            .unwrap();

        let arch = service
            .architecture("t2", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert!(arch.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_cached_result_is_reused() {
        let (service, database) = make_service().await;
        let repo = SpanRepository::new(database.pool());

        let first = service
            .architecture("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert!(first.nodes.is_empty());

        // A write that bypasses the ingest pipeline does not invalidate,
        // so the cached empty document is still served
        repo.insert("default", &make_span("s1", "A", None, 10.0, 200))
            .await
            .unwrap();
        let second = service
            .architecture("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert!(second.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_windowed_request_bypasses_cache() {
        let (service, database) = make_service().await;
        let repo = SpanRepository::new(database.pool());

        // Prime the windowless cache
        service
            .architecture("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();

        repo.insert("default", &make_span("s1", "A", None, 10.0, 200))
            .await
            .unwrap();

        let windowed = service
            .architecture(
                "default",
                &SpanFilters {
                    service_name: Some("A".into()),
                    ..Default::default()
                },
                DEADLINE,
            )
            .await
            .unwrap();
        assert_eq!(windowed.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_deadline_zero_times_out() {
        let (service, _db) = make_service().await;

        let result = service
            .architecture("default", &SpanFilters::default(), Duration::ZERO)
            .await;
        assert!(matches!(result, Err(AnalysisError::Timeout)));
    }

    #[tokio::test]
    async fn test_idempotent_ingest_same_analysis() {
        let (service, database) = make_service().await;
        let repo = SpanRepository::new(database.pool());

        let span = make_span("s1", "A", Some("B"), 2000.0, 200);
        repo.insert("default", &span).await.unwrap();
        repo.insert("default", &span).await.unwrap();

        let arch = service
            .architecture("default", &SpanFilters::default(), DEADLINE)
            .await
            .unwrap();
        assert_eq!(arch.metrics_summary.total_spans, 1);
        assert_eq!(arch.edges[0].call_count, 1);
    }
}
