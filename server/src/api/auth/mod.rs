//! Tenant authentication
//!
//! Every ingest and read call carries a tenant-bound API key, presented as
//! `Authorization: Bearer <key>` or `X-API-Key`. Keys are stored hashed;
//! lookups are cached with short TTLs (shorter for misses so revocation
//! takes effect quickly). With auth disabled, every request binds to the
//! seeded default tenant.

mod manager;

pub use manager::AuthManager;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::ApiError;

/// The tenant bound to the current request
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
}

impl<S> axum::extract::FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<TenantContext>().cloned().ok_or_else(|| {
            // Reaching a handler without the auth middleware is a wiring bug
            tracing::error!("TenantContext missing from request extensions");
            ApiError::internal("Internal server error")
        })
    }
}

/// Middleware state for authenticated routes
#[derive(Clone)]
pub struct AuthState {
    pub auth: Arc<AuthManager>,
}

/// Resolve the credential to a tenant and stash it in request extensions
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = state.auth.authenticate(request.headers()).await?;
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Extract the presented API key from headers
pub(crate) fn extract_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(value) = value.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
