//! Span ingestion endpoints
//!
//! Validation runs at this edge; accepted spans are enqueued for durable
//! persistence without blocking the request on the write. Batch ingestion
//! is partial-success: one bad span never fails the batch.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::TenantContext;
use crate::api::extractors::{ValidatedJson, format_validation_errors};
use crate::api::types::ApiError;
use crate::core::constants::BACKPRESSURE_RETRY_AFTER_SECS;
use crate::data::types::{NewSpan, SpanKind};
use crate::domain::{EnqueueError, IngestPipeline};

/// Shared state for the ingestion endpoints
#[derive(Clone)]
pub struct IngestApiState {
    pub pipeline: Arc<IngestPipeline>,
    /// Per-span serialized byte cap
    pub max_span_bytes: usize,
    /// Maximum spans per batch request
    pub max_batch_spans: usize,
}

/// A span as submitted by the instrumentation agent
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct SpanPayload {
    #[validate(length(min = 1, max = 128, message = "trace_id must be 1-128 characters"))]
    pub trace_id: String,
    #[validate(length(min = 1, max = 128, message = "span_id must be 1-128 characters"))]
    pub span_id: String,
    #[validate(length(max = 128, message = "parent_span_id must be at most 128 characters"))]
    pub parent_span_id: Option<String>,
    #[validate(length(min = 1, max = 255, message = "service_name must be 1-255 characters"))]
    pub service_name: String,
    #[validate(length(min = 1, max = 255, message = "operation must be 1-255 characters"))]
    pub operation: String,
    pub kind: SpanKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 0.0, message = "latency_ms must be non-negative"))]
    pub latency_ms: f64,
    #[validate(range(min = 0, max = 599, message = "status_code must be within 0-599"))]
    pub status_code: Option<i32>,
    pub error: Option<String>,
    #[validate(length(max = 255, message = "downstream must be at most 255 characters"))]
    pub downstream: Option<String>,
}

impl SpanPayload {
    /// Checks beyond per-field constraints: time ordering and the byte cap
    fn check(&self, max_span_bytes: usize) -> Result<(), String> {
        if self.end_time < self.start_time {
            return Err("end_time must not be before start_time".to_string());
        }
        let size = serde_json::to_vec(self).map(|b| b.len()).unwrap_or(usize::MAX);
        if size > max_span_bytes {
            return Err(format!(
                "span exceeds the per-span byte cap ({} > {})",
                size, max_span_bytes
            ));
        }
        Ok(())
    }

    fn into_new_span(self) -> NewSpan {
        NewSpan {
            trace_id: self.trace_id,
            span_id: self.span_id,
            parent_span_id: self.parent_span_id,
            service_name: self.service_name,
            operation: self.operation,
            kind: self.kind,
            start_time: self.start_time,
            end_time: self.end_time,
            latency_ms: self.latency_ms,
            status_code: self.status_code,
            error: self.error,
            downstream: self.downstream,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    pub status: &'static str,
    pub span_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchRejection {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchIngestResponse {
    pub accepted: usize,
    pub rejected: Vec<BatchRejection>,
}

/// Ingest a single span
#[utoipa::path(
    post,
    path = "/api/v1/ingest",
    tag = "ingest",
    request_body = SpanPayload,
    responses(
        (status = 202, description = "Span accepted", body = IngestResponse),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 429, description = "Tenant queue saturated; retry later")
    )
)]
pub async fn ingest_span(
    State(state): State<IngestApiState>,
    tenant: TenantContext,
    ValidatedJson(payload): ValidatedJson<SpanPayload>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    payload
        .check(state.max_span_bytes)
        .map_err(ApiError::bad_request)?;

    let span_id = payload.span_id.clone();
    enqueue(&state.pipeline, &tenant.tenant_id, payload.into_new_span()).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            status: "accepted",
            span_id,
        }),
    ))
}

/// Ingest a batch of spans with per-item outcomes
#[utoipa::path(
    post,
    path = "/api/v1/ingest/batch",
    tag = "ingest",
    responses(
        (status = 202, description = "Batch processed", body = BatchIngestResponse),
        (status = 400, description = "Batch shape invalid"),
        (status = 401, description = "Missing or invalid API key")
    )
)]
pub async fn ingest_batch(
    State(state): State<IngestApiState>,
    tenant: TenantContext,
    payloads: Result<Json<Vec<serde_json::Value>>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchIngestResponse>), ApiError> {
    let Json(payloads) = payloads.map_err(|e| ApiError::bad_request(e.body_text()))?;

    if payloads.len() > state.max_batch_spans {
        return Err(ApiError::bad_request(format!(
            "batch exceeds the maximum of {} spans",
            state.max_batch_spans
        )));
    }

    let mut accepted = 0usize;
    let mut rejected = Vec::new();

    // Items are decoded individually: one bad span never fails the batch
    for (index, value) in payloads.into_iter().enumerate() {
        let payload = match serde_json::from_value::<SpanPayload>(value) {
            Ok(payload) => payload,
            Err(e) => {
                rejected.push(BatchRejection {
                    index,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let reason = match payload.validate() {
            Err(errors) => Some(format_validation_errors(&errors)),
            Ok(()) => payload.check(state.max_span_bytes).err(),
        };
        if let Some(reason) = reason {
            rejected.push(BatchRejection { index, reason });
            continue;
        }

        match enqueue(&state.pipeline, &tenant.tenant_id, payload.into_new_span()).await {
            Ok(()) => accepted += 1,
            Err(_) => rejected.push(BatchRejection {
                index,
                reason: "ingestion queue saturated; retry later".to_string(),
            }),
        }
    }

    tracing::debug!(
        tenant_id = %tenant.tenant_id,
        accepted,
        rejected = rejected.len(),
        "Batch ingested"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchIngestResponse { accepted, rejected }),
    ))
}

async fn enqueue(
    pipeline: &IngestPipeline,
    tenant_id: &str,
    span: NewSpan,
) -> Result<(), ApiError> {
    pipeline.enqueue(tenant_id, span).await.map_err(|e| match e {
        EnqueueError::QueueFull => ApiError::rate_limited(
            "Ingestion queue saturated; retry later",
            BACKPRESSURE_RETRY_AFTER_SECS,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload() -> SpanPayload {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        SpanPayload {
            trace_id: "trace-1".into(),
            span_id: "span-1".into(),
            parent_span_id: None,
            service_name: "checkout".into(),
            operation: "GET /orders".into(),
            kind: SpanKind::Server,
            start_time: t,
            end_time: t + chrono::Duration::milliseconds(50),
            latency_ms: 50.0,
            status_code: Some(200),
            error: None,
            downstream: None,
        }
    }

    #[test]
    fn test_valid_payload_passes() {
        let p = payload();
        assert!(p.validate().is_ok());
        assert!(p.check(64 * 1024).is_ok());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let mut p = payload();
        p.service_name = String::new();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut p = payload();
        p.end_time = p.start_time - chrono::Duration::milliseconds(1);
        assert!(p.check(64 * 1024).is_err());
    }

    #[test]
    fn test_negative_latency_rejected() {
        let mut p = payload();
        p.latency_ms = -0.5;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut p = payload();
        p.error = Some("x".repeat(1024));
        assert!(p.check(128).is_err());
    }

    #[test]
    fn test_unknown_kind_fails_deserialization() {
        let json = serde_json::json!({
            "trace_id": "t", "span_id": "s", "service_name": "svc",
            "operation": "op", "kind": "producer",
            "start_time": "2026-01-01T00:00:00Z", "end_time": "2026-01-01T00:00:01Z",
            "latency_ms": 1000.0
        });
        assert!(serde_json::from_value::<SpanPayload>(json).is_err());
    }

    #[test]
    fn test_payload_roundtrips_to_new_span() {
        let span = payload().into_new_span();
        assert_eq!(span.span_id, "span-1");
        assert_eq!(span.kind, SpanKind::Server);
        assert_eq!(span.latency_ms, 50.0);
    }
}
