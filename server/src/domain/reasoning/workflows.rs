//! Remediation workflow types and the three generators
//!
//! Each generator is a pure function of the reasoning state. Workflow ids
//! are fixed slugs so repeated analyses of the same snapshot are identical.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::StrategySelection;
use crate::domain::graph::{DependencyGraph, NodeType};
use crate::domain::issues::{Issue, IssueType};

/// A single proposed architecture change
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProposedChange {
    #[serde(rename = "type")]
    pub change_type: String,
    pub target: String,
    pub description: String,
    pub impact: String,
}

/// A scored remediation bundle
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub proposed_changes: Vec<ProposedChange>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub complexity_score: u8,
    pub risk_score: u8,
    pub expected_impact: BTreeMap<String, String>,
    /// Issue ids this workflow's changes were derived from (internal)
    #[serde(skip)]
    pub addressed_issues: Vec<String>,
}

fn impact_map(latency: &str, errors: &str, cost: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("latency_improvement".to_string(), latency.to_string()),
        ("error_reduction".to_string(), errors.to_string()),
        ("cost_delta".to_string(), cost.to_string()),
    ])
}

/// Caching change for a high-latency edge. Targets the callee; the impact
/// wording depends on whether the callee is a database.
fn caching_change(issue: &Issue, graph: &DependencyGraph, distributed: bool) -> ProposedChange {
    let source = issue.affected_nodes.first().cloned().unwrap_or_default();
    let target = issue
        .affected_nodes
        .get(1)
        .cloned()
        .unwrap_or_else(|| source.clone());

    let target_is_database = graph
        .node(&target)
        .map(|n| n.node_type == NodeType::Database)
        .unwrap_or(false);

    let impact = if target_is_database {
        format!("Database load reduction of 30-50% on {}", target)
    } else {
        format!("Latency reduction of 30-50% on {} -> {}", source, target)
    };

    if distributed {
        ProposedChange {
            change_type: "distributed_cache".to_string(),
            target,
            description: format!("Deploy a shared cache tier for the {} call path", source),
            impact: format!(
                "50-70% latency reduction on the hottest path{}",
                if target_is_database {
                    " and matching database load reduction"
                } else {
                    ""
                }
            ),
        }
    } else {
        ProposedChange {
            change_type: "caching".to_string(),
            target: target.clone(),
            description: format!("Add a cache layer in front of {}", target),
            impact,
        }
    }
}

fn circuit_breaker_change(issue: &Issue) -> ProposedChange {
    let target = issue.affected_nodes.first().cloned().unwrap_or_default();
    ProposedChange {
        change_type: "resilience".to_string(),
        description: format!("Add a circuit breaker around calls to {}", target),
        impact: "Prevents cascade failures".to_string(),
        target,
    }
}

fn bulkhead_change(issue: &Issue) -> ProposedChange {
    let target = issue.affected_nodes.first().cloned().unwrap_or_default();
    ProposedChange {
        change_type: "bulkhead".to_string(),
        description: format!(
            "Isolate {} behind a bulkhead with per-dependency connection pools",
            target
        ),
        impact: format!("Contains failures of {} to one dependency at a time", target),
        target,
    }
}

/// Minimal workflow: the top three issues, the least-invasive move from the
/// selected strategies for each
pub fn generate_minimal(
    issues: &[Issue],
    strategies: &StrategySelection,
    graph: &DependencyGraph,
) -> Workflow {
    let mut changes = Vec::new();
    let mut addressed = Vec::new();

    for issue in issues.iter().take(3) {
        let change = match issue.issue_type {
            IssueType::HighLatencyEdge => Some(caching_change(issue, graph, false)),
            IssueType::HighErrorRate if strategies.needs_circuit_breaker => {
                Some(circuit_breaker_change(issue))
            }
            IssueType::SinglePointOfFailure if strategies.needs_bulkhead => {
                Some(bulkhead_change(issue))
            }
            // Chain and fan-out rework is never minimal; left to the other plans
            _ => None,
        };
        if let Some(change) = change {
            changes.push(change);
            addressed.push(issue.id.clone());
        }
    }

    if changes.is_empty() {
        changes.push(ProposedChange {
            change_type: "monitoring".to_string(),
            target: "all".to_string(),
            description: "Extend tracing coverage and tighten alert thresholds".to_string(),
            impact: "Better visibility into the flagged paths".to_string(),
        });
    }

    Workflow {
        id: "workflow-minimal".to_string(),
        name: "Minimal Change".to_string(),
        description: "Quick fixes with minimal infrastructure changes".to_string(),
        proposed_changes: changes,
        pros: vec![
            "Low risk".to_string(),
            "Fast implementation".to_string(),
            "Minimal downtime".to_string(),
        ],
        cons: vec![
            "Limited impact".to_string(),
            "May not solve root causes".to_string(),
        ],
        complexity_score: 2,
        risk_score: 1,
        expected_impact: impact_map("10-20%", "20-30%", "+5-10%"),
        addressed_issues: addressed,
    }
}

/// Performance workflow: every performance-relevant strategy, applied maximally
pub fn generate_performance(
    issues: &[Issue],
    strategies: &StrategySelection,
    graph: &DependencyGraph,
) -> Workflow {
    let mut changes = Vec::new();
    let mut addressed = Vec::new();

    if strategies.needs_caching {
        for issue in issues
            .iter()
            .filter(|i| i.issue_type == IssueType::HighLatencyEdge)
            .take(2)
        {
            changes.push(caching_change(issue, graph, true));
            addressed.push(issue.id.clone());
        }
    }

    if strategies.needs_async {
        changes.push(ProposedChange {
            change_type: "async_pattern".to_string(),
            target: "architecture".to_string(),
            description: "Convert synchronous call chains to async messaging".to_string(),
            impact: "Decouples services and improves throughput".to_string(),
        });
        addressed.extend(
            issues
                .iter()
                .filter(|i| i.issue_type == IssueType::DeepSyncChain)
                .map(|i| i.id.clone()),
        );
    }

    if changes.is_empty() {
        changes.push(ProposedChange {
            change_type: "optimization".to_string(),
            target: "architecture".to_string(),
            description: "Add CDN and edge caching for read-heavy paths".to_string(),
            impact: "Global latency reduction".to_string(),
        });
    }

    Workflow {
        id: "workflow-performance".to_string(),
        name: "Performance Optimized".to_string(),
        description: "Maximize throughput and reduce latency".to_string(),
        proposed_changes: changes,
        pros: vec![
            "Significant latency reduction".to_string(),
            "Better scalability".to_string(),
            "Improved user experience".to_string(),
        ],
        cons: vec![
            "Higher cost".to_string(),
            "More moving parts".to_string(),
            "Longer implementation".to_string(),
        ],
        complexity_score: 6,
        risk_score: 4,
        expected_impact: impact_map("50-70%", "10-20%", "+30-50%"),
        addressed_issues: addressed,
    }
}

/// Cost workflow: consolidation, batching, and right-sizing
pub fn generate_cost(issues: &[Issue], strategies: &StrategySelection) -> Workflow {
    let mut changes = Vec::new();
    let mut addressed = Vec::new();

    if strategies.needs_consolidation {
        if let Some(issue) = issues
            .iter()
            .find(|i| i.issue_type == IssueType::FanOutOverload)
        {
            let target = issue.affected_nodes.first().cloned().unwrap_or_default();
            changes.push(ProposedChange {
                change_type: "consolidation".to_string(),
                description: format!("Consolidate and batch downstream calls from {}", target),
                impact: "Reduces downstream API calls by ~40%".to_string(),
                target,
            });
            addressed.push(issue.id.clone());
        }
    }

    if let Some(issue) = issues
        .iter()
        .find(|i| i.issue_type == IssueType::HighErrorRate)
    {
        let target = issue.affected_nodes.first().cloned().unwrap_or_default();
        changes.push(ProposedChange {
            change_type: "retry_optimization".to_string(),
            description: format!("Tighten retry budgets and backoff in {}", target),
            impact: "Cuts wasted compute from failing retries".to_string(),
            target,
        });
        addressed.push(issue.id.clone());
    }

    if changes.is_empty() {
        changes.push(ProposedChange {
            change_type: "right_sizing".to_string(),
            target: "infrastructure".to_string(),
            description: "Right-size service instances to observed load".to_string(),
            impact: "20-30% cost reduction".to_string(),
        });
    }

    Workflow {
        id: "workflow-cost".to_string(),
        name: "Cost Optimized".to_string(),
        description: "Reduce operational cost while maintaining reliability".to_string(),
        proposed_changes: changes,
        pros: vec![
            "Lower operational cost".to_string(),
            "Better resource utilization".to_string(),
            "Reduced waste".to_string(),
        ],
        cons: vec![
            "May impact peak performance".to_string(),
            "Requires ongoing monitoring".to_string(),
        ],
        complexity_score: 4,
        risk_score: 3,
        expected_impact: impact_map("5-10%", "15-25%", "-20% to -30%"),
        addressed_issues: addressed,
    }
}
