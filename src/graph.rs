//! Weighted query graph (Arc<str> optimized)
//!
//! Uses Arc<str> for zero-cost cloning of node IDs. Built through
//! [`GraphBuilder`], which rejects empty IDs, out-of-range weights,
//! duplicate edges and cycles.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::error::{QuerymapError, Result};

/// Tolerance used when comparing weight sums against 1
pub const WEIGHT_SUM_EPSILON: f64 = 1e-9;

/// Outgoing edge: target node and optional routing weight
#[derive(Debug, Clone, PartialEq)]
pub struct Successor {
    pub target: Arc<str>,
    pub weight: Option<f64>,
}

/// Immutable DAG of query nodes with probability-weighted edges
#[derive(Debug, Clone)]
pub struct WeightedGraph {
    /// node_id -> outgoing edges (declaration order)
    adjacency: HashMap<Arc<str>, Vec<Successor>>,
    /// node_id -> predecessor node_ids
    predecessors: HashMap<Arc<str>, Vec<Arc<str>>>,
    /// All node IDs in insertion order
    node_ids: Vec<Arc<str>>,
    edge_count: usize,
}

impl WeightedGraph {
    /// Start an empty builder
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Check if node exists
    #[inline]
    pub fn contains(&self, node_id: &str) -> bool {
        self.adjacency.contains_key(node_id)
    }

    /// Get the shared Arc for a node ID
    pub fn node(&self, node_id: &str) -> Option<&Arc<str>> {
        self.adjacency.get_key_value(node_id).map(|(k, _)| k)
    }

    /// Outgoing edges of a node
    #[inline]
    pub fn successors(&self, node_id: &str) -> &[Successor] {
        static EMPTY: &[Successor] = &[];
        self.adjacency
            .get(node_id)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }

    /// Nodes with an edge into `node_id`
    #[inline]
    pub fn predecessors(&self, node_id: &str) -> &[Arc<str>] {
        static EMPTY: &[Arc<str>] = &[];
        self.predecessors
            .get(node_id)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }

    /// Weight of the edge `source -> target`.
    ///
    /// Outer `None` means no such edge; inner `None` means the edge is unweighted.
    pub fn weight(&self, source: &str, target: &str) -> Option<Option<f64>> {
        self.successors(source)
            .iter()
            .find(|s| s.target.as_ref() == target)
            .map(|s| s.weight)
    }

    /// All node IDs in insertion order
    pub fn node_ids(&self) -> &[Arc<str>] {
        &self.node_ids
    }

    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Iterate over every edge as `(source, successor)`
    pub fn edges(&self) -> impl Iterator<Item = (&Arc<str>, &Successor)> + '_ {
        self.node_ids
            .iter()
            .flat_map(move |id| self.successors(id).iter().map(move |s| (id, s)))
    }

    /// Nodes with no successors
    pub fn leaves(&self) -> Vec<Arc<str>> {
        self.node_ids
            .iter()
            .filter(|id| self.successors(id).is_empty())
            .cloned()
            .collect()
    }

    /// Nodes with no predecessors
    pub fn sources(&self) -> Vec<Arc<str>> {
        self.node_ids
            .iter()
            .filter(|id| self.predecessors(id).is_empty())
            .cloned()
            .collect()
    }

    /// True when every edge carries a weight
    pub fn is_fully_weighted(&self) -> bool {
        self.edges().all(|(_, s)| s.weight.is_some())
    }

    /// Sum of the weights leaving `node_id` (unweighted edges count as 0)
    pub fn outgoing_weight_sum(&self, node_id: &str) -> f64 {
        self.successors(node_id)
            .iter()
            .filter_map(|s| s.weight)
            .sum()
    }

    /// Nodes whose outgoing weights sum above 1, with their sums
    pub fn overweight_nodes(&self) -> Vec<(Arc<str>, f64)> {
        self.node_ids
            .iter()
            .map(|id| (Arc::clone(id), self.outgoing_weight_sum(id)))
            .filter(|(_, sum)| *sum > 1.0 + WEIGHT_SUM_EPSILON)
            .collect()
    }

    /// Check if there's a path from `from` to `to` (BFS)
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return self.contains(from);
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        queue.push_back(from);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            for next in self.successors(current) {
                if next.target.as_ref() == to {
                    return true;
                }
                if visited.insert(next.target.as_ref()) {
                    queue.push_back(next.target.as_ref());
                }
            }
        }

        false
    }

    /// The given nodes plus every node with a path to one of them (reverse BFS).
    /// Names that are not in the graph are ignored.
    pub fn ancestors_of<I, S>(&self, nodes: I) -> HashSet<&str>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        for node in nodes {
            if let Some(id) = self.node(node.as_ref()) {
                if seen.insert(id.as_ref()) {
                    queue.push_back(id.as_ref());
                }
            }
        }

        while let Some(current) = queue.pop_front() {
            for prev in self.predecessors(current) {
                if seen.insert(prev.as_ref()) {
                    queue.push_back(prev.as_ref());
                }
            }
        }

        seen
    }

    /// Detect cycles using DFS with three-color marking.
    ///
    /// A cycle is found when traversal reaches a Gray node (one still on the DFS stack).
    pub fn detect_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn dfs<'a>(
            node: &'a Arc<str>,
            adjacency: &'a HashMap<Arc<str>, Vec<Successor>>,
            colors: &mut HashMap<&'a str, Color>,
            stack: &mut Vec<&'a str>,
        ) -> std::result::Result<(), String> {
            colors.insert(node.as_ref(), Color::Gray);
            stack.push(node.as_ref());

            if let Some(successors) = adjacency.get(node) {
                for next in successors {
                    match colors.get(next.target.as_ref()) {
                        Some(Color::Gray) => {
                            let start = stack
                                .iter()
                                .position(|x| *x == next.target.as_ref())
                                .unwrap_or(0);
                            let cycle = stack[start..].join(" → ");
                            return Err(format!("{} → {}", cycle, next.target));
                        }
                        Some(Color::White) | None => {
                            dfs(&next.target, adjacency, colors, stack)?;
                        }
                        Some(Color::Black) => {}
                    }
                }
            }

            stack.pop();
            colors.insert(node.as_ref(), Color::Black);
            Ok(())
        }

        let mut colors: HashMap<&str, Color> = self
            .node_ids
            .iter()
            .map(|id| (id.as_ref(), Color::White))
            .collect();
        let mut stack: Vec<&str> = Vec::new();

        for id in &self.node_ids {
            if colors.get(id.as_ref()) == Some(&Color::White) {
                dfs(id, &self.adjacency, &mut colors, &mut stack)
                    .map_err(|cycle| QuerymapError::CycleDetected { cycle })?;
            }
        }

        Ok(())
    }
}

/// Explicit graph-construction API
#[derive(Debug, Default)]
pub struct GraphBuilder {
    node_ids: Vec<Arc<str>>,
    known: HashSet<Arc<str>>,
    edges: Vec<(Arc<str>, Arc<str>, Option<f64>)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create Arc<str> once per node, reuse everywhere
    fn intern(&mut self, id: &str) -> Arc<str> {
        if let Some(existing) = self.known.get(id) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(id);
        self.known.insert(Arc::clone(&arc));
        self.node_ids.push(Arc::clone(&arc));
        arc
    }

    /// Declare a node (idempotent)
    pub fn add_node(&mut self, id: &str) -> &mut Self {
        self.intern(id);
        self
    }

    /// Declare a weighted edge; both endpoints are added as nodes
    pub fn add_edge(&mut self, source: &str, target: &str, weight: Option<f64>) -> &mut Self {
        let src = self.intern(source);
        let tgt = self.intern(target);
        self.edges.push((src, tgt, weight));
        self
    }

    /// Validate and freeze the graph
    pub fn build(self) -> Result<WeightedGraph> {
        if self.node_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(QuerymapError::EmptyNodeId);
        }

        let capacity = self.node_ids.len();
        let mut adjacency: HashMap<Arc<str>, Vec<Successor>> = HashMap::with_capacity(capacity);
        let mut predecessors: HashMap<Arc<str>, Vec<Arc<str>>> = HashMap::with_capacity(capacity);
        for id in &self.node_ids {
            adjacency.insert(Arc::clone(id), Vec::new());
            predecessors.insert(Arc::clone(id), Vec::new());
        }

        let mut seen: HashSet<(Arc<str>, Arc<str>)> = HashSet::with_capacity(self.edges.len());
        for (source, target, weight) in &self.edges {
            if let Some(w) = *weight {
                if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                    return Err(QuerymapError::InvalidWeight {
                        source_id: source.to_string(),
                        target: target.to_string(),
                        weight: w,
                    });
                }
            }
            if !seen.insert((Arc::clone(source), Arc::clone(target))) {
                return Err(QuerymapError::DuplicateEdge {
                    source_id: source.to_string(),
                    target: target.to_string(),
                });
            }

            adjacency
                .entry(Arc::clone(source))
                .or_default()
                .push(Successor {
                    target: Arc::clone(target),
                    weight: *weight,
                });
            predecessors
                .entry(Arc::clone(target))
                .or_default()
                .push(Arc::clone(source));
        }

        let graph = WeightedGraph {
            adjacency,
            predecessors,
            node_ids: self.node_ids,
            edge_count: self.edges.len(),
        };
        graph.detect_cycles()?;

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built weighted graph"
        );
        Ok(graph)
    }
}
