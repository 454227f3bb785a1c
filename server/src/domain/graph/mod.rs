//! Dependency graph reconstruction from span snapshots

pub mod analysis;
pub mod metrics;

pub use metrics::{MetricAccumulator, Metrics, MetricsSummary};

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::data::types::{DeclaredType, StoredSpan};

/// Inferred node type in the reconstructed architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Service,
    Database,
    External,
}

/// Substrings identifying a database target
const DATABASE_MARKERS: &[&str] = &["postgres", "mysql", "mongo", "redis", "dynamodb", "cosmosdb"];

/// Substrings identifying an external target
const EXTERNAL_MARKERS: &[&str] = &["http://", "https://", "api.", "external"];

/// Classify a node id, preferring a declared self-description over the
/// substring heuristics.
pub fn classify_node(id: &str, declared: Option<DeclaredType>) -> NodeType {
    if let Some(declared) = declared {
        return match declared {
            DeclaredType::Service => NodeType::Service,
            DeclaredType::Database => NodeType::Database,
            DeclaredType::External => NodeType::External,
        };
    }

    let lower = id.to_lowercase();
    if DATABASE_MARKERS.iter().any(|m| lower.contains(m)) {
        return NodeType::Database;
    }
    if EXTERNAL_MARKERS.iter().any(|m| lower.contains(m)) {
        return NodeType::External;
    }
    NodeType::Service
}

/// A vertex in the reconstructed architecture
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub metrics: Metrics,
}

/// A directed call relationship with aggregated metrics
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub call_count: u64,
    pub avg_latency_ms: f64,
    pub error_rate: f64,
}

/// The reconstructed dependency graph for one tenant snapshot
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, Metrics>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from a span snapshot.
    ///
    /// Node metrics aggregate over the spans originating at each service;
    /// a node only ever seen as a downstream target reports zero metrics.
    /// Spans without a downstream contribute no edge. Self-loops are kept.
    pub fn build(spans: &[StoredSpan], declared: &HashMap<String, DeclaredType>) -> Self {
        let mut node_groups: HashMap<&str, MetricAccumulator> = HashMap::new();
        let mut edge_groups: HashMap<(&str, &str), MetricAccumulator> = HashMap::new();

        for span in spans {
            node_groups
                .entry(span.service_name.as_str())
                .or_default()
                .record(span);
            if let Some(downstream) = span.downstream.as_deref() {
                edge_groups
                    .entry((span.service_name.as_str(), downstream))
                    .or_default()
                    .record(span);
            }
        }

        // Every service plus every distinct downstream becomes a node
        let mut node_ids: Vec<&str> = node_groups.keys().copied().collect();
        for (_, downstream) in edge_groups.keys() {
            if !node_groups.contains_key(downstream) {
                node_ids.push(*downstream);
            }
        }
        node_ids.sort_unstable();
        node_ids.dedup();

        let mut graph = DiGraph::with_capacity(node_ids.len(), edge_groups.len());
        let mut index = HashMap::with_capacity(node_ids.len());

        for id in node_ids {
            let metrics = node_groups
                .get(id)
                .map(|acc| acc.finish())
                .unwrap_or_default();
            let node = GraphNode {
                id: id.to_string(),
                node_type: classify_node(id, declared.get(id).copied()),
                metrics,
            };
            let idx = graph.add_node(node);
            index.insert(id.to_string(), idx);
        }

        let mut edges: Vec<(&str, &str, Metrics)> = edge_groups
            .iter()
            .map(|((source, target), acc)| (*source, *target, acc.finish()))
            .collect();
        edges.sort_unstable_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        for (source, target, metrics) in edges {
            let s = index[source];
            let t = index[target];
            graph.add_edge(s, t, metrics);
        }

        Self { graph, index }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Nodes sorted by id
    pub fn nodes(&self) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> = self.graph.node_weights().collect();
        nodes.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Edges sorted by (source, target)
    pub fn edges(&self) -> Vec<GraphEdge> {
        let mut edges: Vec<GraphEdge> = self
            .graph
            .edge_indices()
            .map(|e| {
                let (s, t) = self.graph.edge_endpoints(e).expect("edge endpoints");
                let metrics = self.graph[e];
                GraphEdge {
                    source: self.graph[s].id.clone(),
                    target: self.graph[t].id.clone(),
                    call_count: metrics.call_count,
                    avg_latency_ms: metrics.avg_latency_ms,
                    error_rate: metrics.error_rate,
                }
            })
            .collect();
        edges.sort_unstable_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        edges
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.index
            .get(id)
            .map(|&idx| self.graph.edges_directed(idx, Direction::Outgoing).count())
            .unwrap_or(0)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.index
            .get(id)
            .map(|&idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .unwrap_or(0)
    }

    /// Successor node ids, sorted
    pub fn successors(&self, id: &str) -> Vec<String> {
        let mut out = self
            .index
            .get(id)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .map(|n| self.graph[n].id.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Predecessor node ids, sorted
    pub fn predecessors(&self, id: &str) -> Vec<String> {
        let mut out = self
            .index
            .get(id)
            .map(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .map(|n| self.graph[n].id.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// The underlying petgraph structure, for the analysis algorithms
    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, Metrics> {
        &self.graph
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::data::types::SpanKind;
    use chrono::{TimeZone, Utc};

    /// A span from `service` to `downstream` with the given latency/status
    pub fn span(
        span_id: &str,
        service: &str,
        downstream: Option<&str>,
        latency_ms: f64,
        status_code: Option<i32>,
    ) -> StoredSpan {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        StoredSpan {
            trace_id: "trace".into(),
            span_id: span_id.into(),
            parent_span_id: None,
            service_name: service.into(),
            operation: "op".into(),
            kind: SpanKind::Client,
            start_time: t,
            end_time: t + chrono::Duration::milliseconds(latency_ms as i64),
            latency_ms,
            status_code,
            error: None,
            downstream: downstream.map(String::from),
        }
    }

    /// Build a graph from (service, downstream) call pairs, one span each
    pub fn graph_from_pairs(pairs: &[(&str, &str)]) -> DependencyGraph {
        let spans: Vec<StoredSpan> = pairs
            .iter()
            .enumerate()
            .map(|(i, (s, d))| span(&format!("s{}", i), s, Some(d), 100.0, Some(200)))
            .collect();
        DependencyGraph::build(&spans, &HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{graph_from_pairs, span};
    use super::*;

    #[test]
    fn test_classify_database_markers() {
        assert_eq!(classify_node("postgres://users", None), NodeType::Database);
        assert_eq!(classify_node("orders-MySQL", None), NodeType::Database);
        assert_eq!(classify_node("redis-cache", None), NodeType::Database);
    }

    #[test]
    fn test_classify_external_markers() {
        assert_eq!(classify_node("https://geo.example.com", None), NodeType::External);
        assert_eq!(classify_node("api.stripe.com", None), NodeType::External);
    }

    #[test]
    fn test_classify_defaults_to_service() {
        assert_eq!(classify_node("checkout", None), NodeType::Service);
    }

    #[test]
    fn test_classify_prefers_declared_type() {
        // Self-description overrides the substring heuristics
        assert_eq!(
            classify_node("postgres-admin-ui", Some(DeclaredType::Service)),
            NodeType::Service
        );
        assert_eq!(
            classify_node("ledger", Some(DeclaredType::Database)),
            NodeType::Database
        );
    }

    #[test]
    fn test_empty_snapshot_yields_empty_graph() {
        let g = DependencyGraph::build(&[], &HashMap::new());
        assert!(g.is_empty());
        assert_eq!(g.edge_count(), 0);
        assert!(g.nodes().is_empty());
        assert!(g.edges().is_empty());
    }

    #[test]
    fn test_single_span_without_downstream() {
        let spans = vec![span("s1", "checkout", None, 50.0, Some(200))];
        let g = DependencyGraph::build(&spans, &HashMap::new());

        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
        let node = g.node("checkout").unwrap();
        assert_eq!(node.metrics.call_count, 1);
        assert_eq!(node.metrics.avg_latency_ms, 50.0);
    }

    #[test]
    fn test_edge_aggregation() {
        // Scenario S1: three A -> B spans, one with status 500
        let spans = vec![
            span("s1", "A", Some("B"), 1200.0, Some(200)),
            span("s2", "A", Some("B"), 1300.0, Some(200)),
            span("s3", "A", Some("B"), 1100.0, Some(500)),
        ];
        let g = DependencyGraph::build(&spans, &HashMap::new());

        assert_eq!(g.node_count(), 2);
        let edges = g.edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "A");
        assert_eq!(edges[0].target, "B");
        assert_eq!(edges[0].call_count, 3);
        assert_eq!(edges[0].avg_latency_ms, 1200.0);
        assert!((edges[0].error_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_downstream_only_node_has_zero_metrics() {
        let spans = vec![span("s1", "svc", Some("postgres://users"), 10.0, Some(200))];
        let g = DependencyGraph::build(&spans, &HashMap::new());

        let db = g.node("postgres://users").unwrap();
        assert_eq!(db.node_type, NodeType::Database);
        assert_eq!(db.metrics.call_count, 0);
    }

    #[test]
    fn test_self_loop_is_kept() {
        let g = graph_from_pairs(&[("svc", "svc")]);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.successors("svc"), vec!["svc"]);
    }

    #[test]
    fn test_permutation_invariance() {
        let mut spans = vec![
            span("s1", "A", Some("B"), 100.0, Some(200)),
            span("s2", "B", Some("C"), 200.0, Some(500)),
            span("s3", "A", Some("C"), 300.0, Some(200)),
        ];
        let forward = DependencyGraph::build(&spans, &HashMap::new());
        spans.reverse();
        let backward = DependencyGraph::build(&spans, &HashMap::new());

        let fwd_nodes: Vec<_> = forward.nodes().iter().map(|n| n.id.clone()).collect();
        let bwd_nodes: Vec<_> = backward.nodes().iter().map(|n| n.id.clone()).collect();
        assert_eq!(fwd_nodes, bwd_nodes);

        let fwd_edges = forward.edges();
        let bwd_edges = backward.edges();
        assert_eq!(fwd_edges.len(), bwd_edges.len());
        for (a, b) in fwd_edges.iter().zip(&bwd_edges) {
            assert_eq!((&a.source, &a.target), (&b.source, &b.target));
            assert_eq!(a.call_count, b.call_count);
            assert_eq!(a.avg_latency_ms, b.avg_latency_ms);
            assert_eq!(a.error_rate, b.error_rate);
        }
    }

    #[test]
    fn test_degrees_and_neighbors() {
        let g = graph_from_pairs(&[("A", "B"), ("A", "C"), ("B", "C")]);

        assert_eq!(g.out_degree("A"), 2);
        assert_eq!(g.in_degree("C"), 2);
        assert_eq!(g.successors("A"), vec!["B", "C"]);
        assert_eq!(g.predecessors("C"), vec!["A", "B"]);
        assert_eq!(g.out_degree("missing"), 0);
    }
}
