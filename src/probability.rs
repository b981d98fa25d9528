//! Path-probability aggregation
//!
//! The cumulative probability of a target is the sum, over every simple
//! path from the root to that target, of the product of the edge weights
//! along the path.
//!
//! A single DFS from the root visits every simple path exactly once as a
//! prefix. Each prefix ending at node `n` is itself a simple path to `n`, so
//! accumulating prefix products per node yields every target in one walk.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{QuerymapError, Result};
use crate::graph::WeightedGraph;

/// Default cap on the number of enumerated paths
pub const DEFAULT_MAX_PATHS: usize = 1_000_000;

/// Aggregation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    pub max_paths: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            max_paths: DEFAULT_MAX_PATHS,
        }
    }
}

/// A simple path from the root together with its edge weights
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedPath {
    pub nodes: Vec<Arc<str>>,
    pub weights: Vec<f64>,
}

impl WeightedPath {
    /// Product of the edge weights (1.0 for the empty path)
    pub fn probability(&self) -> f64 {
        self.weights.iter().product()
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Cumulative probability of one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetProbability {
    pub node: Arc<str>,
    pub probability: f64,
}

/// Target -> probability, in request order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CumulativeProbabilities {
    entries: Vec<TargetProbability>,
    #[serde(skip)]
    index: HashMap<Arc<str>, usize>,
}

impl CumulativeProbabilities {
    fn insert(&mut self, node: Arc<str>, probability: f64) {
        if let Some(&i) = self.index.get(&node) {
            self.entries[i].probability = probability;
            return;
        }
        self.index.insert(Arc::clone(&node), self.entries.len());
        self.entries.push(TargetProbability { node, probability });
    }

    pub fn get(&self, node: &str) -> Option<f64> {
        self.index.get(node).map(|&i| self.entries[i].probability)
    }

    /// Entries for `nodes` only, in the given order (unknown names are skipped)
    pub fn select(&self, nodes: &[&str]) -> CumulativeProbabilities {
        let mut out = CumulativeProbabilities::default();
        for node in nodes {
            if let Some(&i) = self.index.get(*node) {
                let entry = &self.entries[i];
                out.insert(Arc::clone(&entry.node), entry.probability);
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetProbability> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute cumulative probabilities for `targets` with default limits
pub fn compute_cumulative_probabilities<S: AsRef<str>>(
    graph: &WeightedGraph,
    root: &str,
    targets: &[S],
) -> Result<CumulativeProbabilities> {
    compute_with_options(graph, root, targets, AggregateOptions::default())
}

/// Compute cumulative probabilities for `targets`.
///
/// The root maps to 1.0 (empty path). A target present in the graph but
/// unreachable from the root maps to 0.0.
#[instrument(skip(graph, targets), fields(targets = targets.len()))]
pub fn compute_with_options<S: AsRef<str>>(
    graph: &WeightedGraph,
    root: &str,
    targets: &[S],
    options: AggregateOptions,
) -> Result<CumulativeProbabilities> {
    let root = graph.node(root).ok_or_else(|| QuerymapError::UnknownRoot {
        root: root.to_string(),
    })?;

    let mut wanted: Vec<Arc<str>> = Vec::with_capacity(targets.len());
    for t in targets {
        let node = graph
            .node(t.as_ref())
            .ok_or_else(|| QuerymapError::UnknownNode {
                node: t.as_ref().to_string(),
            })?;
        wanted.push(Arc::clone(node));
    }

    let relevant = graph.ancestors_of(wanted.iter());
    let totals = accumulate(graph, root, &relevant, options)?;

    let mut result = CumulativeProbabilities::default();
    for node in wanted {
        let p = totals.get(node.as_ref()).copied().unwrap_or(0.0);
        result.insert(node, p);
    }
    Ok(result)
}

/// Sum of path products for every node of `relevant` reachable from `root`.
///
/// Only edges into `relevant` are followed, so an unweighted edge fails the
/// walk only when it leads towards a requested target.
fn accumulate<'g>(
    graph: &'g WeightedGraph,
    root: &'g Arc<str>,
    relevant: &HashSet<&'g str>,
    options: AggregateOptions,
) -> Result<HashMap<&'g str, f64>> {
    struct Walk<'g, 'r> {
        graph: &'g WeightedGraph,
        relevant: &'r HashSet<&'g str>,
        on_path: HashSet<&'g str>,
        totals: HashMap<&'g str, f64>,
        explored: usize,
        limit: usize,
    }

    impl<'g, 'r> Walk<'g, 'r> {
        fn visit(&mut self, node: &'g str, product: f64) -> Result<()> {
            *self.totals.entry(node).or_insert(0.0) += product;
            self.explored += 1;
            if self.explored > self.limit {
                return Err(QuerymapError::PathLimitExceeded { limit: self.limit });
            }

            let graph = self.graph;
            self.on_path.insert(node);
            for next in graph.successors(node) {
                let name: &'g str = next.target.as_ref();
                if !self.relevant.contains(name) || self.on_path.contains(name) {
                    continue;
                }
                let weight = next.weight.ok_or_else(|| QuerymapError::UnweightedEdge {
                    source_id: node.to_string(),
                    target: next.target.to_string(),
                })?;
                self.visit(name, product * weight)?;
            }
            self.on_path.remove(node);
            Ok(())
        }
    }

    let mut walk = Walk {
        graph,
        relevant,
        on_path: HashSet::new(),
        totals: HashMap::new(),
        explored: 0,
        limit: options.max_paths,
    };
    walk.visit(root.as_ref(), 1.0)?;

    debug!(root = %root, paths = walk.explored, "enumerated simple paths");
    Ok(walk.totals)
}

/// Enumerate every simple path from `root` to `target` with its weights
#[instrument(skip(graph))]
pub fn simple_paths(graph: &WeightedGraph, root: &str, target: &str) -> Result<Vec<WeightedPath>> {
    simple_paths_with_options(graph, root, target, AggregateOptions::default())
}

/// Enumerate simple paths, counting explored prefixes against `options.max_paths`
/// the same way [`compute_with_options`] does
pub fn simple_paths_with_options(
    graph: &WeightedGraph,
    root: &str,
    target: &str,
    options: AggregateOptions,
) -> Result<Vec<WeightedPath>> {
    let root = graph.node(root).ok_or_else(|| QuerymapError::UnknownRoot {
        root: root.to_string(),
    })?;
    let target = graph.node(target).ok_or_else(|| QuerymapError::UnknownNode {
        node: target.to_string(),
    })?;

    let mut search = PathSearch {
        graph,
        target,
        relevant: graph.ancestors_of([target]),
        on_path: HashSet::new(),
        nodes: Vec::new(),
        weights: Vec::new(),
        found: Vec::new(),
        explored: 0,
        limit: options.max_paths,
    };
    search.visit(root)?;

    debug!(target = %target, paths = search.found.len(), "enumerated simple paths");
    Ok(search.found)
}

/// Backtracking enumeration of the paths to one target
struct PathSearch<'g> {
    graph: &'g WeightedGraph,
    target: &'g Arc<str>,
    /// Nodes that can reach `target`
    relevant: HashSet<&'g str>,
    on_path: HashSet<&'g str>,
    nodes: Vec<Arc<str>>,
    weights: Vec<f64>,
    found: Vec<WeightedPath>,
    explored: usize,
    limit: usize,
}

impl<'g> PathSearch<'g> {
    fn visit(&mut self, node: &'g Arc<str>) -> Result<()> {
        self.explored += 1;
        if self.explored > self.limit {
            return Err(QuerymapError::PathLimitExceeded { limit: self.limit });
        }

        self.nodes.push(Arc::clone(node));
        if node == self.target {
            self.found.push(WeightedPath {
                nodes: self.nodes.clone(),
                weights: self.weights.clone(),
            });
            self.nodes.pop();
            return Ok(());
        }

        let graph = self.graph;
        self.on_path.insert(node.as_ref());
        for next in graph.successors(node) {
            let name: &'g str = next.target.as_ref();
            if !self.relevant.contains(name) || self.on_path.contains(name) {
                continue;
            }
            let weight = next.weight.ok_or_else(|| QuerymapError::UnweightedEdge {
                source_id: node.to_string(),
                target: next.target.to_string(),
            })?;

            self.weights.push(weight);
            self.visit(&next.target)?;
            self.weights.pop();
        }
        self.on_path.remove(node.as_ref());
        self.nodes.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn queries() -> WeightedGraph {
        let mut b = GraphBuilder::new();
        b.add_edge("Queries", "Read Queries", Some(0.7))
            .add_edge("Queries", "Write Queries", Some(0.3))
            .add_edge("Read Queries", "Simple Reads", Some(0.3))
            .add_edge("Read Queries", "Complex Reads", Some(0.4))
            .add_edge("Complex Reads", "Inner Joins", Some(0.6))
            .add_edge("Write Queries", "Create", Some(0.4))
            .add_node("Orphan");
        b.build().unwrap()
    }

    #[test]
    fn single_path_is_product() {
        let g = queries();
        let probs = compute_cumulative_probabilities(&g, "Queries", &["Simple Reads"]).unwrap();
        assert!(close(probs.get("Simple Reads").unwrap(), 0.21));

        let probs = compute_cumulative_probabilities(&g, "Queries", &["Inner Joins"]).unwrap();
        assert!(close(probs.get("Inner Joins").unwrap(), 0.7 * 0.4 * 0.6));
    }

    #[test]
    fn unreachable_target_is_zero() {
        let g = queries();
        let probs = compute_cumulative_probabilities(&g, "Queries", &["Orphan"]).unwrap();
        assert_eq!(probs.get("Orphan"), Some(0.0));

        // Reachable from a different subtree only
        let probs = compute_cumulative_probabilities(&g, "Write Queries", &["Simple Reads"]).unwrap();
        assert_eq!(probs.get("Simple Reads"), Some(0.0));
    }

    #[test]
    fn root_as_target_is_one() {
        let g = queries();
        let probs = compute_cumulative_probabilities(&g, "Queries", &["Queries"]).unwrap();
        assert_eq!(probs.get("Queries"), Some(1.0));
    }

    #[test]
    fn independent_paths_are_summed_not_maxed() {
        // Queries → Read → Complex → Joins (0.7 * 0.4 * 0.6 = 0.168)
        // Queries → Write → Joins        (0.3 * 0.5 = 0.15)
        let mut b = GraphBuilder::new();
        b.add_edge("Queries", "Read", Some(0.7))
            .add_edge("Read", "Complex", Some(0.4))
            .add_edge("Complex", "Joins", Some(0.6))
            .add_edge("Queries", "Write", Some(0.3))
            .add_edge("Write", "Joins", Some(0.5));
        let g = b.build().unwrap();

        let probs = compute_cumulative_probabilities(&g, "Queries", &["Joins"]).unwrap();
        assert!(close(probs.get("Joins").unwrap(), 0.168 + 0.15));
    }

    #[test]
    fn diamond_counts_every_route() {
        // a → b → d, a → c → d, a → d
        let mut b = GraphBuilder::new();
        b.add_edge("a", "b", Some(0.5))
            .add_edge("a", "c", Some(0.25))
            .add_edge("a", "d", Some(0.25))
            .add_edge("b", "d", Some(1.0))
            .add_edge("c", "d", Some(1.0));
        let g = b.build().unwrap();

        let probs = compute_cumulative_probabilities(&g, "a", &["d", "b"]).unwrap();
        assert!(close(probs.get("d").unwrap(), 1.0));
        assert!(close(probs.get("b").unwrap(), 0.5));

        let paths = simple_paths(&g, "a", "d").unwrap();
        assert_eq!(paths.len(), 3);
        let total: f64 = paths.iter().map(|p| p.probability()).sum();
        assert!(close(total, probs.get("d").unwrap()));
    }

    #[test]
    fn bounded_by_one_when_distributions_are_valid() {
        let g = queries();
        let all: Vec<&str> = g.node_ids().iter().map(|s| s.as_ref()).collect();
        let probs = compute_cumulative_probabilities(&g, "Queries", &all).unwrap();
        for entry in probs.iter() {
            assert!(entry.probability >= 0.0);
            assert!(entry.probability <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn results_keep_request_order_and_are_idempotent() {
        let g = queries();
        let targets = ["Create", "Simple Reads", "Inner Joins"];
        let first = compute_cumulative_probabilities(&g, "Queries", &targets).unwrap();
        let second = compute_cumulative_probabilities(&g, "Queries", &targets).unwrap();
        assert_eq!(first, second);
        let order: Vec<&str> = first.iter().map(|e| e.node.as_ref()).collect();
        assert_eq!(order, targets);
    }

    #[test]
    fn unknown_root_and_target_fail() {
        let g = queries();
        let err = compute_cumulative_probabilities(&g, "Nope", &["Create"]).unwrap_err();
        assert!(matches!(err, QuerymapError::UnknownRoot { .. }));

        let err = compute_cumulative_probabilities(&g, "Queries", &["Nope"]).unwrap_err();
        assert!(matches!(err, QuerymapError::UnknownNode { .. }));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn unweighted_edge_on_path_fails() {
        let mut b = GraphBuilder::new();
        b.add_edge("a", "b", Some(0.5)).add_edge("b", "c", None);
        let g = b.build().unwrap();
        let err = compute_cumulative_probabilities(&g, "a", &["c"]).unwrap_err();
        assert!(matches!(err, QuerymapError::UnweightedEdge { .. }));
    }

    #[test]
    fn unweighted_edge_off_the_target_routes_is_ignored() {
        // a -0.5-> b, a -> c (drawn only)
        let mut b = GraphBuilder::new();
        b.add_edge("a", "b", Some(0.5)).add_edge("a", "c", None);
        let g = b.build().unwrap();

        let probs = compute_cumulative_probabilities(&g, "a", &["b"]).unwrap();
        assert!(close(probs.get("b").unwrap(), 0.5));

        let paths = simple_paths(&g, "a", "b").unwrap();
        assert_eq!(paths.len(), 1);
        assert!(close(paths[0].probability(), 0.5));

        // Asking for c still walks the unweighted edge
        assert!(matches!(
            compute_cumulative_probabilities(&g, "a", &["c"]).unwrap_err(),
            QuerymapError::UnweightedEdge { .. }
        ));
    }

    #[test]
    fn path_limit_counts_only_routes_towards_targets() {
        // a → b, plus a long side chain a → x1 → x2 → x3
        let mut b = GraphBuilder::new();
        b.add_edge("a", "b", Some(0.5))
            .add_edge("a", "x1", Some(0.5))
            .add_edge("x1", "x2", Some(1.0))
            .add_edge("x2", "x3", Some(1.0));
        let g = b.build().unwrap();
        let tight = AggregateOptions { max_paths: 2 };

        let probs = compute_with_options(&g, "a", &["b"], tight).unwrap();
        assert!(close(probs.get("b").unwrap(), 0.5));
        assert_eq!(simple_paths_with_options(&g, "a", "b", tight).unwrap().len(), 1);

        assert!(compute_with_options(&g, "a", &["x3"], tight).is_err());
        assert!(simple_paths_with_options(&g, "a", "x3", tight).is_err());
    }

    #[test]
    fn path_limit_trips() {
        let mut b = GraphBuilder::new();
        b.add_edge("a", "b", Some(0.5))
            .add_edge("a", "c", Some(0.5))
            .add_edge("b", "d", Some(1.0))
            .add_edge("c", "d", Some(1.0));
        let g = b.build().unwrap();
        let err = compute_with_options(&g, "a", &["d"], AggregateOptions { max_paths: 2 })
            .unwrap_err();
        assert!(matches!(err, QuerymapError::PathLimitExceeded { limit: 2 }));
    }

    #[test]
    fn simple_paths_lists_weights() {
        let g = queries();
        let paths = simple_paths(&g, "Queries", "Simple Reads").unwrap();
        assert_eq!(paths.len(), 1);
        let names: Vec<&str> = paths[0].nodes.iter().map(|s| s.as_ref()).collect();
        assert_eq!(names, vec!["Queries", "Read Queries", "Simple Reads"]);
        assert_eq!(paths[0].weights, vec![0.7, 0.3]);
        assert_eq!(paths[0].len(), 2);

        let to_root = simple_paths(&g, "Queries", "Queries").unwrap();
        assert_eq!(to_root.len(), 1);
        assert!(to_root[0].is_empty());
        assert_eq!(to_root[0].probability(), 1.0);
    }
}
