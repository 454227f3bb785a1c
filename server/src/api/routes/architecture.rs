//! Architecture read surface: current graph, issues, advanced measures

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use super::{ReadApiState, WindowQuery, effective_deadline};
use crate::api::auth::TenantContext;
use crate::api::extractors::ValidatedQuery;
use crate::api::types::ApiError;
use crate::domain::analysis::{ArchitectureDoc, IssuesDoc};
use crate::domain::graph::analysis::GraphInsights;

/// Current reconstructed architecture with aggregated metrics
#[utoipa::path(
    get,
    path = "/api/v1/architecture/current",
    tag = "architecture",
    params(
        ("from" = Option<String>, Query, description = "Window start (ISO 8601)"),
        ("to" = Option<String>, Query, description = "Window end (ISO 8601)")
    ),
    responses(
        (status = 200, description = "Nodes, edges, and metrics summary", body = ArchitectureDoc),
        (status = 401, description = "Missing or invalid API key"),
        (status = 504, description = "Deadline exceeded")
    )
)]
pub async fn get_current_architecture(
    State(state): State<ReadApiState>,
    tenant: TenantContext,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<WindowQuery>,
) -> Result<Json<ArchitectureDoc>, ApiError> {
    let filters = query.to_filters()?;
    let deadline = effective_deadline(&headers, state.read_timeout);
    let doc = state
        .analysis
        .architecture(&tenant.tenant_id, &filters, deadline)
        .await?;
    Ok(Json(doc))
}

/// Detected issues, ranked by severity
#[utoipa::path(
    get,
    path = "/api/v1/architecture/issues",
    tag = "architecture",
    params(
        ("from" = Option<String>, Query, description = "Window start (ISO 8601)"),
        ("to" = Option<String>, Query, description = "Window end (ISO 8601)")
    ),
    responses(
        (status = 200, description = "Ranked issues with severity buckets", body = IssuesDoc),
        (status = 401, description = "Missing or invalid API key"),
        (status = 504, description = "Deadline exceeded")
    )
)]
pub async fn get_issues(
    State(state): State<ReadApiState>,
    tenant: TenantContext,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<WindowQuery>,
) -> Result<Json<IssuesDoc>, ApiError> {
    let filters = query.to_filters()?;
    let deadline = effective_deadline(&headers, state.read_timeout);
    let doc = state
        .analysis
        .issues(&tenant.tenant_id, &filters, deadline)
        .await?;
    Ok(Json(doc))
}

/// Advanced graph measures: centrality, cycles, critical paths
#[utoipa::path(
    get,
    path = "/api/v1/architecture/analysis",
    tag = "architecture",
    params(
        ("from" = Option<String>, Query, description = "Window start (ISO 8601)"),
        ("to" = Option<String>, Query, description = "Window end (ISO 8601)")
    ),
    responses(
        (status = 200, description = "Graph measures", body = GraphInsights),
        (status = 401, description = "Missing or invalid API key"),
        (status = 504, description = "Deadline exceeded")
    )
)]
pub async fn get_graph_analysis(
    State(state): State<ReadApiState>,
    tenant: TenantContext,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<WindowQuery>,
) -> Result<Json<GraphInsights>, ApiError> {
    let filters = query.to_filters()?;
    let deadline = effective_deadline(&headers, state.read_timeout);
    let doc = state
        .analysis
        .graph_analysis(&tenant.tenant_id, &filters, deadline)
        .await?;
    Ok(Json(doc))
}
