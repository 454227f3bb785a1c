//! Rule-based issue detection over the dependency graph
//!
//! All rules are deterministic and independent. Issue ids are stable across
//! runs on the same graph: a hash of the rule type plus the sorted affected
//! nodes. A rule that fails internally is logged and skipped; the remaining
//! rules still produce output.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::core::config::ThresholdsConfig;
use crate::data::types::TenantRecord;
use crate::domain::graph::{DependencyGraph, analysis};
use crate::utils::crypto::sha256_hex;

/// Issue severity, ordered least to most severe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Detection rule identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    HighLatencyEdge,
    DeepSyncChain,
    HighErrorRate,
    FanOutOverload,
    SinglePointOfFailure,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::HighLatencyEdge => "high_latency_edge",
            IssueType::DeepSyncChain => "deep_sync_chain",
            IssueType::HighErrorRate => "high_error_rate",
            IssueType::FanOutOverload => "fan_out_overload",
            IssueType::SinglePointOfFailure => "single_point_of_failure",
        }
    }
}

/// An evidence-backed finding against the reconstructed graph
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Issue {
    pub id: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    pub affected_nodes: Vec<String>,
    pub metric_value: f64,
    pub evidence: serde_json::Value,
}

impl Issue {
    /// Stable id: hash of the rule type plus sorted affected nodes
    fn stable_id(issue_type: IssueType, affected_nodes: &[String]) -> String {
        let mut sorted = affected_nodes.to_vec();
        sorted.sort_unstable();
        let digest = sha256_hex(&format!("{}:{}", issue_type.as_str(), sorted.join(",")));
        digest[..16].to_string()
    }

    fn new(
        issue_type: IssueType,
        severity: Severity,
        description: String,
        affected_nodes: Vec<String>,
        metric_value: f64,
        evidence: serde_json::Value,
    ) -> Self {
        Self {
            id: Self::stable_id(issue_type, &affected_nodes),
            issue_type,
            severity,
            description,
            affected_nodes,
            metric_value,
            evidence,
        }
    }
}

/// Detection thresholds resolved for one tenant. All comparisons are
/// strict greater-than: values at the threshold do not trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub lat_max_ms: f64,
    pub err_max: f64,
    pub depth_max: u32,
    pub fanout_max: u32,
    pub in_max: u32,
}

impl Thresholds {
    /// Resolve per-tenant overrides against the instance defaults
    pub fn resolve(defaults: &ThresholdsConfig, tenant: Option<&TenantRecord>) -> Self {
        Self {
            lat_max_ms: tenant
                .and_then(|t| t.lat_max_ms)
                .unwrap_or(defaults.lat_max_ms),
            err_max: tenant.and_then(|t| t.err_max).unwrap_or(defaults.err_max),
            depth_max: tenant
                .and_then(|t| t.depth_max)
                .unwrap_or(defaults.depth_max),
            fanout_max: tenant
                .and_then(|t| t.fanout_max)
                .unwrap_or(defaults.fanout_max),
            in_max: tenant.and_then(|t| t.in_max).unwrap_or(defaults.in_max),
        }
    }
}

impl From<&ThresholdsConfig> for Thresholds {
    fn from(defaults: &ThresholdsConfig) -> Self {
        Self::resolve(defaults, None)
    }
}

/// Deterministic rule engine over a dependency graph
pub struct RuleEngine;

impl RuleEngine {
    /// Run every rule and return issues ranked by severity, then id.
    ///
    /// Rules share no mutable state; a panicking rule is logged and skipped
    /// so the detector stays infallible given a valid graph.
    pub fn run_all(graph: &DependencyGraph, thresholds: &Thresholds) -> Vec<Issue> {
        let rules: [(&str, fn(&DependencyGraph, &Thresholds) -> Vec<Issue>); 5] = [
            ("high_latency_edge", Self::detect_high_latency_edges),
            ("deep_sync_chain", Self::detect_deep_sync_chains),
            ("high_error_rate", Self::detect_high_error_nodes),
            ("fan_out_overload", Self::detect_fan_out_overload),
            ("single_point_of_failure", Self::detect_single_points_of_failure),
        ];

        let mut issues = Vec::new();
        for (name, rule) in rules {
            match catch_unwind(AssertUnwindSafe(|| rule(graph, thresholds))) {
                Ok(found) => issues.extend(found),
                Err(_) => {
                    tracing::error!(rule = name, "Detection rule failed; skipping");
                }
            }
        }

        issues.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.id.cmp(&b.id)));
        issues
    }

    /// Rule 1: edges whose mean latency exceeds the threshold
    fn detect_high_latency_edges(graph: &DependencyGraph, thresholds: &Thresholds) -> Vec<Issue> {
        graph
            .edges()
            .into_iter()
            .filter(|e| e.avg_latency_ms > thresholds.lat_max_ms)
            .map(|e| {
                Issue::new(
                    IssueType::HighLatencyEdge,
                    Severity::High,
                    format!(
                        "Edge {} -> {} has high latency ({:.0}ms)",
                        e.source, e.target, e.avg_latency_ms
                    ),
                    vec![e.source.clone(), e.target.clone()],
                    e.avg_latency_ms,
                    json!({
                        "threshold": thresholds.lat_max_ms,
                        "actual": e.avg_latency_ms,
                        "call_count": e.call_count,
                    }),
                )
            })
            .collect()
    }

    /// Rule 2: nodes that head a synchronous chain deeper than the threshold
    fn detect_deep_sync_chains(graph: &DependencyGraph, thresholds: &Thresholds) -> Vec<Issue> {
        let depths = analysis::depth_map(graph);
        let mut nodes: Vec<(&String, &u32)> = depths.iter().collect();
        nodes.sort_unstable_by(|a, b| a.0.cmp(b.0));

        nodes
            .into_iter()
            .filter(|(_, &depth)| depth > thresholds.depth_max)
            .map(|(id, &depth)| {
                Issue::new(
                    IssueType::DeepSyncChain,
                    Severity::Medium,
                    format!("Service {} heads a deep synchronous chain (depth={})", id, depth),
                    vec![id.clone()],
                    depth as f64,
                    json!({
                        "threshold": thresholds.depth_max,
                        "actual_depth": depth,
                    }),
                )
            })
            .collect()
    }

    /// Rule 3: nodes whose error rate exceeds the threshold
    fn detect_high_error_nodes(graph: &DependencyGraph, thresholds: &Thresholds) -> Vec<Issue> {
        graph
            .nodes()
            .into_iter()
            .filter(|n| n.metrics.error_rate > thresholds.err_max)
            .map(|n| {
                Issue::new(
                    IssueType::HighErrorRate,
                    Severity::Critical,
                    format!(
                        "Service {} has a high error rate ({:.1}%)",
                        n.id,
                        n.metrics.error_rate * 100.0
                    ),
                    vec![n.id.clone()],
                    n.metrics.error_rate,
                    json!({
                        "threshold": thresholds.err_max,
                        "actual": n.metrics.error_rate,
                        "call_count": n.metrics.call_count,
                    }),
                )
            })
            .collect()
    }

    /// Rule 4: nodes calling more downstream targets than the threshold
    fn detect_fan_out_overload(graph: &DependencyGraph, thresholds: &Thresholds) -> Vec<Issue> {
        graph
            .nodes()
            .into_iter()
            .filter(|n| graph.out_degree(&n.id) > thresholds.fanout_max as usize)
            .map(|n| {
                let out_degree = graph.out_degree(&n.id);
                Issue::new(
                    IssueType::FanOutOverload,
                    Severity::Medium,
                    format!("Service {} calls too many services ({})", n.id, out_degree),
                    vec![n.id.clone()],
                    out_degree as f64,
                    json!({
                        "threshold": thresholds.fanout_max,
                        "actual": out_degree,
                        "targets": graph.successors(&n.id),
                    }),
                )
            })
            .collect()
    }

    /// Rule 5: nodes that many services depend on
    fn detect_single_points_of_failure(
        graph: &DependencyGraph,
        thresholds: &Thresholds,
    ) -> Vec<Issue> {
        graph
            .nodes()
            .into_iter()
            .filter(|n| graph.in_degree(&n.id) > thresholds.in_max as usize)
            .map(|n| {
                let in_degree = graph.in_degree(&n.id);
                Issue::new(
                    IssueType::SinglePointOfFailure,
                    Severity::High,
                    format!(
                        "Service {} is a single point of failure with {} dependents",
                        n.id, in_degree
                    ),
                    vec![n.id.clone()],
                    in_degree as f64,
                    json!({
                        "dependent_services": graph.predecessors(&n.id),
                        "in_degree": in_degree,
                    }),
                )
            })
            .collect()
    }
}
