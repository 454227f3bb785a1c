//! Deterministic reasoning pipeline: detect, classify, analyze, select
//! strategies, then generate the three remediation workflows.
//!
//! The pipeline is a finite state traversal. Each step is a pure function
//! taking and returning the state value; routing is an ordinary conditional.
//! No external calls, no stochastic choices: the output is a function of
//! (graph, thresholds) alone.

pub mod workflows;

pub use workflows::{ProposedChange, Workflow};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::graph::{DependencyGraph, NodeType, analysis};
use crate::domain::issues::{Issue, IssueType, RuleEngine, Severity, Thresholds};

/// Issues bucketed by remediation category
#[derive(Debug, Clone, Default)]
pub struct IssueCategories {
    /// Rule 1 and Rule 2 findings
    pub performance: Vec<Issue>,
    /// Rule 3 and Rule 5 findings
    pub reliability: Vec<Issue>,
    /// Rule 4 findings
    pub coupling: Vec<Issue>,
}

/// Strategies chosen for workflow generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrategySelection {
    /// A high-latency edge targets a database node
    pub needs_caching: bool,
    /// A deep synchronous chain exists
    pub needs_async: bool,
    /// A high-error-rate node exists
    pub needs_circuit_breaker: bool,
    /// A single point of failure exists
    pub needs_bulkhead: bool,
    /// A fan-out overload exists
    pub needs_consolidation: bool,
}

/// Supporting graph measures for strategy selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReasoningAnalysis {
    /// Betweenness centrality of the nodes appearing in issues
    pub centrality: BTreeMap<String, f64>,
    pub has_cycles: bool,
    /// The longest critical path, when one qualifies
    pub critical_path: Option<Vec<String>>,
}

/// State carried through the pipeline
pub struct ReasoningState<'g> {
    pub graph: &'g DependencyGraph,
    pub issues: Vec<Issue>,
    pub issue_categories: IssueCategories,
    pub strategy_selection: StrategySelection,
    pub analysis: ReasoningAnalysis,
    pub workflows: Vec<Workflow>,
    pub analysis_complete: bool,
}

impl<'g> ReasoningState<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            issues: Vec::new(),
            issue_categories: IssueCategories::default(),
            strategy_selection: StrategySelection::default(),
            analysis: ReasoningAnalysis::default(),
            workflows: Vec::new(),
            analysis_complete: false,
        }
    }
}

/// Run the full pipeline over a graph
pub fn run<'g>(graph: &'g DependencyGraph, thresholds: &Thresholds) -> ReasoningState<'g> {
    let state = ReasoningState::new(graph);
    let state = detect(state, thresholds);
    let state = classify(state);
    let state = analyze(state);
    let state = select_strategies(state);

    // Conditional branch: no issues means no workflows
    let state = if state.issues.is_empty() {
        state
    } else {
        generate(state)
    };

    finalize(state)
}

/// State: run the rule engine over the graph
fn detect<'g>(mut state: ReasoningState<'g>, thresholds: &Thresholds) -> ReasoningState<'g> {
    state.issues = RuleEngine::run_all(state.graph, thresholds);
    state
}

/// State: bucket issues by remediation category
fn classify(mut state: ReasoningState<'_>) -> ReasoningState<'_> {
    let mut categories = IssueCategories::default();
    for issue in &state.issues {
        match issue.issue_type {
            IssueType::HighLatencyEdge | IssueType::DeepSyncChain => {
                categories.performance.push(issue.clone())
            }
            IssueType::HighErrorRate | IssueType::SinglePointOfFailure => {
                categories.reliability.push(issue.clone())
            }
            IssueType::FanOutOverload => categories.coupling.push(issue.clone()),
        }
    }
    state.issue_categories = categories;
    state
}

/// State: compute supporting graph measures for the issue-affected nodes
fn analyze(mut state: ReasoningState<'_>) -> ReasoningState<'_> {
    let full_centrality = analysis::betweenness_centrality(state.graph);
    let affected: std::collections::HashSet<&str> = state
        .issues
        .iter()
        .flat_map(|i| i.affected_nodes.iter().map(String::as_str))
        .collect();

    state.analysis = ReasoningAnalysis {
        centrality: full_centrality
            .into_iter()
            .filter(|(id, _)| affected.contains(id.as_str()))
            .collect(),
        has_cycles: analysis::has_cycles(state.graph),
        critical_path: analysis::critical_paths(state.graph).into_iter().next(),
    };
    state
}

/// State: choose strategies from the categorized issues
fn select_strategies(mut state: ReasoningState<'_>) -> ReasoningState<'_> {
    let graph = state.graph;
    let latency_edge_hits_database = state.issues.iter().any(|i| {
        i.issue_type == IssueType::HighLatencyEdge
            && i.affected_nodes
                .get(1)
                .and_then(|target| graph.node(target))
                .map(|n| n.node_type == NodeType::Database)
                .unwrap_or(false)
    });

    let has = |issue_type: IssueType| state.issues.iter().any(|i| i.issue_type == issue_type);

    state.strategy_selection = StrategySelection {
        needs_caching: latency_edge_hits_database,
        needs_async: has(IssueType::DeepSyncChain),
        needs_circuit_breaker: has(IssueType::HighErrorRate),
        needs_bulkhead: has(IssueType::SinglePointOfFailure),
        needs_consolidation: has(IssueType::FanOutOverload),
    };
    state
}

/// State: run the three generators. Their outputs land in a fixed order
/// (minimal, performance, cost) regardless of how they are scheduled.
fn generate(mut state: ReasoningState<'_>) -> ReasoningState<'_> {
    let minimal =
        workflows::generate_minimal(&state.issues, &state.strategy_selection, state.graph);
    let performance =
        workflows::generate_performance(&state.issues, &state.strategy_selection, state.graph);
    let cost = workflows::generate_cost(&state.issues, &state.strategy_selection);

    state.workflows = vec![minimal, performance, cost];
    state
}

/// State: mark the analysis complete
fn finalize(mut state: ReasoningState<'_>) -> ReasoningState<'_> {
    state.analysis_complete = true;
    state
}

/// Comparison matrix across the generated workflows with a recommendation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkflowComparison {
    pub comparison_matrix: BTreeMap<String, BTreeMap<String, u64>>,
    pub recommendation: String,
}

/// Compare workflows: minimum (complexity + risk) among those addressing
/// the highest-severity outstanding issue; ties prefer the minimal plan.
pub fn compare(workflows: &[Workflow], issues: &[Issue]) -> WorkflowComparison {
    let mut complexity = BTreeMap::new();
    let mut risk = BTreeMap::new();
    let mut change_count = BTreeMap::new();
    for w in workflows {
        complexity.insert(w.name.clone(), w.complexity_score as u64);
        risk.insert(w.name.clone(), w.risk_score as u64);
        change_count.insert(w.name.clone(), w.proposed_changes.len() as u64);
    }

    let comparison_matrix = BTreeMap::from([
        ("complexity".to_string(), complexity),
        ("risk".to_string(), risk),
        ("change_count".to_string(), change_count),
    ]);

    let recommendation = match recommend(workflows, issues) {
        Some(name) => format!("{} is recommended for balanced risk and complexity", name),
        None => "No workflows available".to_string(),
    };

    WorkflowComparison {
        comparison_matrix,
        recommendation,
    }
}

fn recommend(workflows: &[Workflow], issues: &[Issue]) -> Option<String> {
    if workflows.is_empty() {
        return None;
    }

    let top_severity: Option<Severity> = issues.iter().map(|i| i.severity).max();
    let top_issue_ids: std::collections::HashSet<&str> = issues
        .iter()
        .filter(|i| Some(i.severity) == top_severity)
        .map(|i| i.id.as_str())
        .collect();

    let addressing: Vec<&Workflow> = workflows
        .iter()
        .filter(|w| {
            w.addressed_issues
                .iter()
                .any(|id| top_issue_ids.contains(id.as_str()))
        })
        .collect();

    // Fall back to every workflow when none addresses the top issue directly
    let candidates = if addressing.is_empty() {
        workflows.iter().collect::<Vec<_>>()
    } else {
        addressing
    };

    // Workflows arrive in (minimal, performance, cost) order, so a stable
    // minimum prefers minimal on ties
    candidates
        .into_iter()
        .min_by_key(|w| w.complexity_score as u16 + w.risk_score as u16)
        .map(|w| w.name.clone())
}
