//! Workflow read surface: generated plans and their comparison

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use super::{ReadApiState, WindowQuery, effective_deadline};
use crate::api::auth::TenantContext;
use crate::api::extractors::ValidatedQuery;
use crate::api::types::ApiError;
use crate::domain::analysis::{ComparisonDoc, WorkflowsDoc};

/// The generated remediation workflows (empty when no issues are found)
#[utoipa::path(
    get,
    path = "/api/v1/workflows/generated",
    tag = "workflows",
    params(
        ("from" = Option<String>, Query, description = "Window start (ISO 8601)"),
        ("to" = Option<String>, Query, description = "Window end (ISO 8601)")
    ),
    responses(
        (status = 200, description = "Generated workflows", body = WorkflowsDoc),
        (status = 401, description = "Missing or invalid API key"),
        (status = 504, description = "Deadline exceeded")
    )
)]
pub async fn get_generated_workflows(
    State(state): State<ReadApiState>,
    tenant: TenantContext,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<WindowQuery>,
) -> Result<Json<WorkflowsDoc>, ApiError> {
    let filters = query.to_filters()?;
    let deadline = effective_deadline(&headers, state.read_timeout);
    let doc = state
        .analysis
        .workflows(&tenant.tenant_id, &filters, deadline)
        .await?;
    Ok(Json(doc))
}

/// Comparison matrix across the workflows with a recommendation
#[utoipa::path(
    get,
    path = "/api/v1/workflows/comparison",
    tag = "workflows",
    params(
        ("from" = Option<String>, Query, description = "Window start (ISO 8601)"),
        ("to" = Option<String>, Query, description = "Window end (ISO 8601)")
    ),
    responses(
        (status = 200, description = "Comparison matrix and recommendation", body = ComparisonDoc),
        (status = 401, description = "Missing or invalid API key"),
        (status = 504, description = "Deadline exceeded")
    )
)]
pub async fn get_workflow_comparison(
    State(state): State<ReadApiState>,
    tenant: TenantContext,
    headers: HeaderMap,
    ValidatedQuery(query): ValidatedQuery<WindowQuery>,
) -> Result<Json<ComparisonDoc>, ApiError> {
    let filters = query.to_filters()?;
    let deadline = effective_deadline(&headers, state.read_timeout);
    let doc = state
        .analysis
        .comparison(&tenant.tenant_id, &filters, deadline)
        .await?;
    Ok(Json(doc))
}
