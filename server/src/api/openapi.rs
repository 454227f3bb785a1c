//! OpenAPI document and Swagger UI

use axum::Json;
use axum::response::Html;
use utoipa::OpenApi;

use crate::api::routes;
use crate::data::types::{DeclaredType, SpanKind, SpanStats};
use crate::domain::analysis::{ArchitectureDoc, ComparisonDoc, IssuesDoc, WorkflowsDoc};
use crate::domain::graph::analysis::GraphInsights;
use crate::domain::graph::{GraphEdge, GraphNode, Metrics, MetricsSummary, NodeType};
use crate::domain::issues::{Issue, IssueType, Severity};
use crate::domain::reasoning::{ProposedChange, Workflow};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Archlens API",
        description = "Architecture reconstruction and remediation planning from telemetry spans"
    ),
    paths(
        routes::health::health,
        routes::ingest::ingest_span,
        routes::ingest::ingest_batch,
        routes::architecture::get_current_architecture,
        routes::architecture::get_issues,
        routes::architecture::get_graph_analysis,
        routes::workflows::get_generated_workflows,
        routes::workflows::get_workflow_comparison,
        routes::discovery::put_discovery,
        routes::discovery::list_discovery,
        routes::system::get_system_stats,
    ),
    components(schemas(
        SpanKind,
        DeclaredType,
        SpanStats,
        Metrics,
        MetricsSummary,
        NodeType,
        GraphNode,
        GraphEdge,
        GraphInsights,
        Severity,
        IssueType,
        Issue,
        ProposedChange,
        Workflow,
        ArchitectureDoc,
        IssuesDoc,
        WorkflowsDoc,
        ComparisonDoc,
        routes::ingest::SpanPayload,
        routes::ingest::IngestResponse,
        routes::ingest::BatchIngestResponse,
        routes::ingest::BatchRejection,
        routes::discovery::DiscoveryPayload,
        routes::discovery::DiscoveryListResponse,
        routes::discovery::DiscoveryEntry,
        routes::system::SystemStatsResponse,
        routes::health::HealthResponse,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "ingest", description = "Span ingestion"),
        (name = "architecture", description = "Reconstructed architecture"),
        (name = "workflows", description = "Remediation workflows"),
        (name = "discovery", description = "Service self-descriptions"),
        (name = "system", description = "Tenant statistics"),
    )
)]
pub struct ApiDoc;

/// Serve the OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Serve a minimal Swagger UI shell pointing at the document
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8"/>
    <title>Archlens API</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css"/>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = () => {
            SwaggerUIBundle({ url: "/api/openapi.json", dom_id: "#swagger-ui" });
        };
    </script>
</body>
</html>"##,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("/api/v1/ingest"));
        assert!(json.contains("/api/v1/architecture/current"));
        assert!(json.contains("/api/v1/workflows/comparison"));
    }
}
