//! Tenant-scoped system statistics

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::auth::TenantContext;
use crate::api::types::ApiError;
use crate::data::sqlite::SqliteService;
use crate::data::sqlite::repositories::SpanRepository;
use crate::data::types::SpanStats;

/// Shared state for the system endpoints
#[derive(Clone)]
pub struct SystemApiState {
    pub database: Arc<SqliteService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatsResponse {
    pub tenant_id: String,
    #[serde(flatten)]
    pub stats: SpanStats,
}

/// Span statistics for the authenticated tenant
#[utoipa::path(
    get,
    path = "/api/v1/system/stats",
    tag = "system",
    responses(
        (status = 200, description = "Tenant span statistics", body = SystemStatsResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 503, description = "Span store unavailable")
    )
)]
pub async fn get_system_stats(
    State(state): State<SystemApiState>,
    tenant: TenantContext,
) -> Result<Json<SystemStatsResponse>, ApiError> {
    let repo = SpanRepository::new(state.database.pool());
    let stats = repo
        .stats(&tenant.tenant_id)
        .await
        .map_err(ApiError::from_data)?;

    Ok(Json(SystemStatsResponse {
        tenant_id: tenant.tenant_id,
        stats,
    }))
}
