//! Shared HTTP middleware helpers

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Fallback handler for unknown routes
pub async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "detail": "Not found" })),
    )
}
