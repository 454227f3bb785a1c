//! Graph measures over the reconstructed architecture
//!
//! Cyclic graphs are handled by condensing strongly connected components
//! first; depth and critical paths are computed over the condensed DAG.

use std::collections::{BTreeMap, HashMap, VecDeque};

use petgraph::Direction;
use petgraph::algo::{condensation, is_cyclic_directed, tarjan_scc};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::DependencyGraph;

/// Centrality score above which a node counts as a bottleneck
const BOTTLENECK_CENTRALITY: f64 = 0.3;

/// Minimum node count for a path to be reported as critical
const CRITICAL_PATH_MIN_LEN: usize = 4;

/// Maximum number of critical paths reported
const CRITICAL_PATH_LIMIT: usize = 5;

/// Advanced graph measures exposed by the read surface
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GraphInsights {
    pub node_count: usize,
    pub edge_count: usize,
    pub avg_degree: f64,
    pub is_dag: bool,
    /// Strongly connected components of size > 1 and self-loops, sorted
    pub cycles: Vec<Vec<String>>,
    /// Longest source-to-sink paths over the condensed DAG
    pub critical_paths: Vec<Vec<String>>,
    /// Nodes whose betweenness centrality exceeds the bottleneck threshold
    pub bottlenecks: Vec<String>,
    pub centrality: BTreeMap<String, f64>,
}

/// Compute the full set of measures for one graph
pub fn analyze(graph: &DependencyGraph) -> GraphInsights {
    let centrality = betweenness_centrality(graph);
    let mut bottlenecks: Vec<String> = centrality
        .iter()
        .filter(|(_, score)| **score > BOTTLENECK_CENTRALITY)
        .map(|(id, _)| id.clone())
        .collect();
    bottlenecks.sort_unstable();

    let node_count = graph.node_count();
    let degree_sum: usize = graph
        .nodes()
        .iter()
        .map(|n| graph.out_degree(&n.id) + graph.in_degree(&n.id))
        .sum();

    GraphInsights {
        node_count,
        edge_count: graph.edge_count(),
        avg_degree: if node_count == 0 {
            0.0
        } else {
            degree_sum as f64 / node_count as f64
        },
        is_dag: !is_cyclic_directed(graph.inner()),
        cycles: find_cycles(graph),
        critical_paths: critical_paths(graph),
        bottlenecks,
        centrality,
    }
}

/// Longest-path depth for every node: the number of edges on the longest
/// simple path originating at it, taken over the SCC condensation.
pub fn depth_map(graph: &DependencyGraph) -> HashMap<String, u32> {
    let inner = graph.inner();
    if inner.node_count() == 0 {
        return HashMap::new();
    }

    // Map each node to its SCC, then take longest distances over the DAG
    let condensed = condensation(inner.clone(), true);
    let mut scc_of = HashMap::new();
    for scc_idx in condensed.node_indices() {
        for node in &condensed[scc_idx] {
            scc_of.insert(node.id.clone(), scc_idx);
        }
    }

    let order = petgraph::algo::toposort(&condensed, None)
        .expect("condensed graph is acyclic");

    let mut dist: HashMap<NodeIndex, u32> = HashMap::with_capacity(order.len());
    for &idx in order.iter().rev() {
        let best = condensed
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|succ| dist.get(&succ).copied().unwrap_or(0) + 1)
            .max()
            .unwrap_or(0);
        dist.insert(idx, best);
    }

    scc_of
        .into_iter()
        .map(|(id, scc)| (id, dist.get(&scc).copied().unwrap_or(0)))
        .collect()
}

/// Strongly connected components of size > 1, plus self-loops, as sorted
/// member lists.
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let inner = graph.inner();
    let mut cycles: Vec<Vec<String>> = Vec::new();

    for scc in tarjan_scc(inner) {
        if scc.len() > 1 {
            let mut members: Vec<String> = scc.iter().map(|&idx| inner[idx].id.clone()).collect();
            members.sort_unstable();
            cycles.push(members);
        }
    }

    // Self-loops are single-node cycles that tarjan_scc reports as size-1 SCCs
    for idx in inner.node_indices() {
        if inner.find_edge(idx, idx).is_some() {
            cycles.push(vec![inner[idx].id.clone()]);
        }
    }

    cycles.sort();
    cycles
}

/// Whether the graph contains any cycle (self-loops included)
pub fn has_cycles(graph: &DependencyGraph) -> bool {
    !find_cycles(graph).is_empty()
}

/// Longest source-to-sink paths over the condensed DAG, rendered through
/// each component's smallest member id. Only paths of at least
/// `CRITICAL_PATH_MIN_LEN` nodes are reported, longest first.
pub fn critical_paths(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let inner = graph.inner();
    if inner.node_count() == 0 {
        return Vec::new();
    }

    let condensed = condensation(inner.clone(), true);
    let representative: HashMap<NodeIndex, String> = condensed
        .node_indices()
        .map(|idx| {
            let mut members: Vec<&str> =
                condensed[idx].iter().map(|n| n.id.as_str()).collect();
            members.sort_unstable();
            (idx, members[0].to_string())
        })
        .collect();

    let order = petgraph::algo::toposort(&condensed, None)
        .expect("condensed graph is acyclic");

    // Longest distance to any sink, with the successor achieving it
    let mut dist: HashMap<NodeIndex, u32> = HashMap::new();
    let mut next: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    for &idx in order.iter().rev() {
        let mut succs: Vec<NodeIndex> = condensed
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        // Deterministic tie-break on the representative id
        succs.sort_unstable_by(|a, b| representative[a].cmp(&representative[b]));

        let mut best: Option<(u32, NodeIndex)> = None;
        for succ in succs {
            let candidate = dist.get(&succ).copied().unwrap_or(0) + 1;
            if best.map(|(d, _)| candidate > d).unwrap_or(true) {
                best = Some((candidate, succ));
            }
        }
        if let Some((d, succ)) = best {
            dist.insert(idx, d);
            next.insert(idx, succ);
        } else {
            dist.insert(idx, 0);
        }
    }

    let mut paths: Vec<Vec<String>> = condensed
        .node_indices()
        .filter(|&idx| {
            condensed
                .neighbors_directed(idx, Direction::Incoming)
                .next()
                .is_none()
        })
        .map(|source| {
            let mut path = vec![representative[&source].clone()];
            let mut cursor = source;
            while let Some(&succ) = next.get(&cursor) {
                path.push(representative[&succ].clone());
                cursor = succ;
            }
            path
        })
        .filter(|p| p.len() >= CRITICAL_PATH_MIN_LEN)
        .collect();

    paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    paths.truncate(CRITICAL_PATH_LIMIT);
    paths
}

/// Betweenness centrality (Brandes, unweighted, directed), normalized by
/// (n-1)(n-2) for n > 2.
pub fn betweenness_centrality(graph: &DependencyGraph) -> BTreeMap<String, f64> {
    let inner = graph.inner();
    let n = inner.node_count();
    let mut scores: HashMap<NodeIndex, f64> = inner.node_indices().map(|i| (i, 0.0)).collect();

    for source in inner.node_indices() {
        // BFS from source counting shortest paths
        let mut stack: Vec<NodeIndex> = Vec::new();
        let mut preds: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut sigma: HashMap<NodeIndex, f64> = HashMap::new();
        let mut dist: HashMap<NodeIndex, i64> = HashMap::new();
        sigma.insert(source, 1.0);
        dist.insert(source, 0);

        let mut queue = VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let dv = dist[&v];
            for w in inner.neighbors_directed(v, Direction::Outgoing) {
                if !dist.contains_key(&w) {
                    dist.insert(w, dv + 1);
                    queue.push_back(w);
                }
                if dist[&w] == dv + 1 {
                    *sigma.entry(w).or_insert(0.0) += sigma[&v];
                    preds.entry(w).or_default().push(v);
                }
            }
        }

        // Back-propagation of dependencies
        let mut delta: HashMap<NodeIndex, f64> = HashMap::new();
        while let Some(w) = stack.pop() {
            let dw = delta.get(&w).copied().unwrap_or(0.0);
            if let Some(parents) = preds.get(&w) {
                for &v in parents {
                    let share = sigma[&v] / sigma[&w] * (1.0 + dw);
                    *delta.entry(v).or_insert(0.0) += share;
                }
            }
            if w != source {
                *scores.get_mut(&w).expect("node score") += dw;
            }
        }
    }

    let scale = if n > 2 {
        1.0 / ((n - 1) as f64 * (n - 2) as f64)
    } else {
        1.0
    };

    scores
        .into_iter()
        .map(|(idx, score)| (inner[idx].id.clone(), score * scale))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::test_support::graph_from_pairs;

    #[test]
    fn test_depth_of_linear_chain() {
        // Scenario S2: A -> B -> ... -> G, depth(A) = 6
        let g = graph_from_pairs(&[
            ("A", "B"),
            ("B", "C"),
            ("C", "D"),
            ("D", "E"),
            ("E", "F"),
            ("F", "G"),
        ]);
        let depths = depth_map(&g);

        assert_eq!(depths["A"], 6);
        assert_eq!(depths["B"], 5);
        assert_eq!(depths["G"], 0);
    }

    #[test]
    fn test_depth_empty_graph() {
        let g = graph_from_pairs(&[]);
        assert!(depth_map(&g).is_empty());
    }

    #[test]
    fn test_depth_with_cycle_uses_condensation() {
        // A -> B -> C -> B cycle, C -> D. The B/C component condenses, so
        // depth(A) counts A -> {B,C} -> D = 2 edges.
        let g = graph_from_pairs(&[("A", "B"), ("B", "C"), ("C", "B"), ("C", "D")]);
        let depths = depth_map(&g);

        assert_eq!(depths["A"], 2);
        assert_eq!(depths["D"], 0);
    }

    #[test]
    fn test_find_cycles_detects_scc_and_self_loop() {
        let g = graph_from_pairs(&[("A", "B"), ("B", "A"), ("C", "C"), ("C", "A")]);
        let cycles = find_cycles(&g);

        assert_eq!(cycles, vec![vec!["A".to_string(), "B".to_string()], vec!["C".to_string()]]);
        assert!(has_cycles(&g));
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let g = graph_from_pairs(&[("A", "B"), ("B", "C")]);
        assert!(find_cycles(&g).is_empty());
        assert!(!has_cycles(&g));
        assert!(analyze(&g).is_dag);
    }

    #[test]
    fn test_critical_paths_reports_long_chains() {
        let g = graph_from_pairs(&[("A", "B"), ("B", "C"), ("C", "D"), ("X", "Y")]);
        let paths = critical_paths(&g);

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0], vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_critical_paths_ignores_short_chains() {
        let g = graph_from_pairs(&[("A", "B"), ("B", "C")]);
        assert!(critical_paths(&g).is_empty());
    }

    #[test]
    fn test_centrality_middle_node_scores_highest() {
        // B sits on every A->C path
        let g = graph_from_pairs(&[("A", "B"), ("B", "C")]);
        let centrality = betweenness_centrality(&g);

        assert!(centrality["B"] > centrality["A"]);
        assert!(centrality["B"] > centrality["C"]);
    }

    #[test]
    fn test_centrality_bottleneck_detection() {
        // Hub F relays every path between two fan groups
        let g = graph_from_pairs(&[
            ("A", "F"),
            ("B", "F"),
            ("C", "F"),
            ("F", "X"),
            ("F", "Y"),
            ("F", "Z"),
        ]);
        let insights = analyze(&g);

        assert_eq!(insights.bottlenecks, vec!["F"]);
        assert_eq!(insights.node_count, 7);
        assert_eq!(insights.edge_count, 6);
    }

    #[test]
    fn test_analyze_empty_graph() {
        let g = graph_from_pairs(&[]);
        let insights = analyze(&g);

        assert_eq!(insights.node_count, 0);
        assert_eq!(insights.avg_degree, 0.0);
        assert!(insights.is_dag);
        assert!(insights.cycles.is_empty());
        assert!(insights.critical_paths.is_empty());
    }
}
