//! Per-tenant rate limiting middleware
//!
//! Runs after authentication so the subject is the resolved tenant id. The
//! verdict comes from the fixed-window counters in the cache layer; denials
//! are retryable 429s with the standard rate limit headers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::auth::TenantContext;
use crate::api::types::ApiError;
use crate::data::cache::{RateLimitBucket, RateLimitResult, RateLimiter};

/// Rate limit middleware state
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub bucket: RateLimitBucket,
}

fn add_rate_limit_headers(response: &mut Response, result: &RateLimitResult) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&result.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&result.reset_at.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
}

/// Rate limiting middleware function
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // The auth middleware has already bound the tenant
    let tenant_id = request
        .extensions()
        .get::<TenantContext>()
        .map(|c| c.tenant_id.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let result = state.limiter.check(&state.bucket, &tenant_id);

    if !result.allowed {
        tracing::debug!(
            bucket = state.bucket.name,
            tenant_id = %tenant_id,
            "Rate limit exceeded"
        );
        return Err(ApiError::rate_limited(
            "Rate limit exceeded",
            result.retry_after.unwrap_or(60),
        ));
    }

    let mut response = next.run(request).await;
    add_rate_limit_headers(&mut response, &result);
    Ok(response)
}
