//! Metric aggregation over span groups
//!
//! Sums are kept in u64/f64 so groups stay exact well past 2^53 spans for
//! counts; results are independent of span order and accumulators merge
//! associatively (concatenating two disjoint groups equals the weighted
//! combination of their aggregates).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::data::types::StoredSpan;

/// Aggregated metrics for a node or edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Metrics {
    pub call_count: u64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
}

/// Running aggregation state for one span group
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricAccumulator {
    count: u64,
    latency_sum: f64,
    error_count: u64,
}

impl MetricAccumulator {
    pub fn record(&mut self, span: &StoredSpan) {
        self.count += 1;
        self.latency_sum += span.latency_ms;
        if span.is_error() {
            self.error_count += 1;
        }
    }

    /// Combine two disjoint groups
    pub fn merge(&mut self, other: &MetricAccumulator) {
        self.count += other.count;
        self.latency_sum += other.latency_sum;
        self.error_count += other.error_count;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Finalize into reported metrics. An empty group reports zeros.
    pub fn finish(&self) -> Metrics {
        if self.count == 0 {
            return Metrics::default();
        }
        Metrics {
            call_count: self.count,
            avg_latency_ms: self.latency_sum / self.count as f64,
            error_rate: self.error_count as f64 / self.count as f64,
        }
    }
}

/// Tenant-wide summary across all spans in the snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricsSummary {
    pub total_spans: u64,
    pub unique_services: u64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
}

impl MetricsSummary {
    pub fn from_spans(spans: &[StoredSpan]) -> Self {
        if spans.is_empty() {
            return Self::default();
        }

        let mut acc = MetricAccumulator::default();
        let mut services = std::collections::HashSet::new();
        for span in spans {
            acc.record(span);
            services.insert(span.service_name.as_str());
        }
        let metrics = acc.finish();

        Self {
            total_spans: metrics.call_count,
            unique_services: services.len() as u64,
            avg_latency_ms: metrics.avg_latency_ms,
            error_rate: metrics.error_rate,
        }
    }
}
