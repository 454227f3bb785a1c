//! API route handlers

pub mod architecture;
pub mod discovery;
pub mod health;
pub mod ingest;
pub mod system;
pub mod workflows;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use serde::Deserialize;
use validator::Validate;

use crate::api::types::{ApiError, parse_timestamp_param};
use crate::core::constants::DEADLINE_HEADER;
use crate::data::types::SpanFilters;
use crate::domain::AnalysisService;

/// Shared state for the analysis read surface
#[derive(Clone)]
pub struct ReadApiState {
    pub analysis: Arc<AnalysisService>,
    /// Server-side ceiling for a single read operation
    pub read_timeout: Duration,
}

/// Optional analysis time window
#[derive(Debug, Default, Deserialize, Validate)]
pub struct WindowQuery {
    /// Window start (ISO 8601)
    pub from: Option<String>,
    /// Window end (ISO 8601)
    pub to: Option<String>,
}

impl WindowQuery {
    pub fn to_filters(&self) -> Result<SpanFilters, ApiError> {
        Ok(SpanFilters {
            from: parse_timestamp_param(&self.from)?,
            to: parse_timestamp_param(&self.to)?,
            ..Default::default()
        })
    }
}

/// Effective deadline for a read: the caller-provided `X-Deadline-Ms`
/// header, capped by the server-side ceiling.
pub fn effective_deadline(headers: &HeaderMap, ceiling: Duration) -> Duration {
    headers
        .get(DEADLINE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|&ms| ms > 0)
        .map(Duration::from_millis)
        .map(|d| d.min(ceiling))
        .unwrap_or(ceiling)
}
