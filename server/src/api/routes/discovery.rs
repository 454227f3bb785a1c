//! Service discovery endpoints: self-descriptions consumed by the
//! graph builder's node classifier

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::TenantContext;
use crate::api::extractors::ValidatedJson;
use crate::api::types::ApiError;
use crate::data::cache::CacheService;
use crate::data::sqlite::SqliteService;
use crate::data::sqlite::repositories::DiscoveryRepository;
use crate::data::types::DeclaredType;

/// Shared state for the discovery endpoints
#[derive(Clone)]
pub struct DiscoveryApiState {
    pub database: Arc<SqliteService>,
    pub cache: Arc<CacheService>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DiscoveryPayload {
    #[validate(length(min = 1, max = 255, message = "service_name must be 1-255 characters"))]
    pub service_name: String,
    #[serde(rename = "type")]
    pub declared_type: DeclaredType,
    #[validate(length(max = 1024, message = "description must be at most 1024 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscoveryEntry {
    pub service_name: String,
    #[serde(rename = "type")]
    pub declared_type: DeclaredType,
    pub description: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscoveryListResponse {
    pub services: Vec<DiscoveryEntry>,
}

/// Register or update a service self-description
#[utoipa::path(
    put,
    path = "/api/v1/discovery",
    tag = "discovery",
    request_body = DiscoveryPayload,
    responses(
        (status = 204, description = "Self-description stored"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid API key")
    )
)]
pub async fn put_discovery(
    State(state): State<DiscoveryApiState>,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<DiscoveryPayload>,
) -> Result<StatusCode, ApiError> {
    let repo = DiscoveryRepository::new(state.database.pool());
    repo.upsert(
        &tenant.tenant_id,
        &payload.service_name,
        payload.declared_type,
        payload.description.as_deref(),
    )
    .await
    .map_err(ApiError::from_data)?;

    // The classifier input changed, so cached analyses are stale
    state.cache.invalidate_tenant(&tenant.tenant_id).await;

    Ok(StatusCode::NO_CONTENT)
}

/// List the tenant's registered self-descriptions
#[utoipa::path(
    get,
    path = "/api/v1/discovery",
    tag = "discovery",
    responses(
        (status = 200, description = "Registered self-descriptions", body = DiscoveryListResponse),
        (status = 401, description = "Missing or invalid API key")
    )
)]
pub async fn list_discovery(
    State(state): State<DiscoveryApiState>,
    tenant: TenantContext,
) -> Result<Json<DiscoveryListResponse>, ApiError> {
    let repo = DiscoveryRepository::new(state.database.pool());
    let records = repo
        .list(&tenant.tenant_id)
        .await
        .map_err(ApiError::from_data)?;

    let services = records
        .into_iter()
        .map(|r| DiscoveryEntry {
            service_name: r.service_name,
            declared_type: r.declared_type,
            description: r.description,
            updated_at: r
                .updated_at
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        })
        .collect();

    Ok(Json(DiscoveryListResponse { services }))
}
