//! Shared API types
//!
//! Error responses are `{detail}` JSON objects; the HTTP status is the
//! primary signal. Wrapping preserves the originating error kind so the
//! taxonomy (validation, auth, quota, dependency, programming) maps onto
//! precise statuses.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

use crate::domain::AnalysisError;

/// Parse an optional timestamp string parameter (RFC 3339 / ISO 8601 format)
pub fn parse_timestamp_param(s: &Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match s {
        Some(ts) => DateTime::parse_from_rfc3339(ts)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| {
                ApiError::bad_request(format!(
                    "Invalid timestamp format: {}. Use ISO 8601 format.",
                    ts
                ))
            }),
        None => Ok(None),
    }
}

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { detail: String },
    Unauthorized { detail: String },
    Forbidden { detail: String },
    NotFound { detail: String },
    RateLimited { detail: String, retry_after: u64 },
    ServiceUnavailable { detail: String },
    Timeout { detail: String },
    Internal { detail: String },
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest {
            detail: detail.into(),
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Unauthorized {
            detail: detail.into(),
        }
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden {
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound {
            detail: detail.into(),
        }
    }

    pub fn rate_limited(detail: impl Into<String>, retry_after: u64) -> Self {
        Self::RateLimited {
            detail: detail.into(),
            retry_after,
        }
    }

    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Map a data-layer failure. The store being unreachable is a
    /// dependency error; details are logged, not leaked.
    pub fn from_data(e: crate::data::DataError) -> Self {
        tracing::error!(error = %e, "Storage error");
        Self::ServiceUnavailable {
            detail: "Span store unavailable".to_string(),
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Data(inner) => Self::from_data(inner),
            AnalysisError::Timeout => Self::Timeout {
                detail: "Analysis deadline exceeded".to_string(),
            },
            AnalysisError::TaskFailed => {
                tracing::error!("Analysis task failed");
                Self::Internal {
                    detail: "Internal server error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail, retry_after) = match self {
            Self::BadRequest { detail } => (StatusCode::BAD_REQUEST, detail, None),
            Self::Unauthorized { detail } => (StatusCode::UNAUTHORIZED, detail, None),
            Self::Forbidden { detail } => (StatusCode::FORBIDDEN, detail, None),
            Self::NotFound { detail } => (StatusCode::NOT_FOUND, detail, None),
            Self::RateLimited {
                detail,
                retry_after,
            } => (StatusCode::TOO_MANY_REQUESTS, detail, Some(retry_after)),
            Self::ServiceUnavailable { detail } => (StatusCode::SERVICE_UNAVAILABLE, detail, None),
            Self::Timeout { detail } => (StatusCode::GATEWAY_TIMEOUT, detail, None),
            Self::Internal { detail } => (StatusCode::INTERNAL_SERVER_ERROR, detail, None),
        };

        let mut response =
            (status, Json(serde_json::json!({ "detail": detail }))).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::rate_limited("x", 1), StatusCode::TOO_MANY_REQUESTS),
            (ApiError::service_unavailable("x"), StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited("slow down", 42).into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }

    #[test]
    fn test_timeout_maps_to_504() {
        let response = ApiError::from(AnalysisError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_parse_timestamp_param() {
        assert_eq!(parse_timestamp_param(&None).unwrap(), None);
        assert!(parse_timestamp_param(&Some("2026-01-01T00:00:00Z".into()))
            .unwrap()
            .is_some());
        assert!(parse_timestamp_param(&Some("not-a-date".into())).is_err());
    }
}
