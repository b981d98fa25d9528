//! Document-level probability analysis
//!
//! Runs the aggregator over a document's query graph and derives service
//! probabilities: a service is reached through any of the query nodes it is
//! attached to, so its probability is the sum of its parents' probabilities.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::document::{GraphDocument, Service};
use crate::error::{QuerymapError, Result};
use crate::graph::WeightedGraph;
use crate::probability::{compute_with_options, AggregateOptions, CumulativeProbabilities};

/// Cumulative probability of a service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceProbability {
    pub name: Arc<str>,
    pub probability: f64,
    pub parents: Vec<Arc<str>>,
}

/// Probabilities for the requested query nodes and services
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analysis {
    pub queries: CumulativeProbabilities,
    pub services: Vec<ServiceProbability>,
    /// Probability of every query node, used by presentation
    #[serde(skip)]
    all: CumulativeProbabilities,
}

impl Analysis {
    /// Probability of any query node or service
    pub fn probability_of(&self, name: &str) -> Option<f64> {
        self.all.get(name).or_else(|| {
            self.services
                .iter()
                .find(|s| s.name.as_ref() == name)
                .map(|s| s.probability)
        })
    }

    pub fn service(&self, name: &str) -> Option<&ServiceProbability> {
        self.services.iter().find(|s| s.name.as_ref() == name)
    }
}

/// Analyse a document.
///
/// Without explicit targets, every query leaf and every service is reported.
/// Explicit targets may name query nodes or services.
#[instrument(skip_all, fields(root = %document.root))]
pub fn analyze(
    document: &GraphDocument,
    graph: &WeightedGraph,
    targets: &[String],
    options: AggregateOptions,
) -> Result<Analysis> {
    let services = document.services();

    let (query_targets, service_targets): (Vec<&str>, Vec<&Service>) = if targets.is_empty() {
        let leaves: Vec<&str> = graph
            .node_ids()
            .iter()
            .filter(|id| graph.successors(id).is_empty())
            .map(|id| id.as_ref())
            .collect();
        (leaves, services.iter().collect())
    } else {
        let mut queries = Vec::new();
        let mut wanted = Vec::new();
        for target in targets {
            if graph.contains(target) {
                queries.push(target.as_str());
            } else if let Some(service) = services
                .iter()
                .find(|s| s.name.as_ref() == target.as_str())
            {
                wanted.push(service);
            } else {
                return Err(QuerymapError::UnknownNode {
                    node: target.clone(),
                });
            }
        }
        (queries, wanted)
    };

    // A full report covers every node; explicit targets only need their own
    // routes (plus the parents of requested services)
    let needed: Vec<&str> = if targets.is_empty() {
        graph.node_ids().iter().map(|s| s.as_ref()).collect()
    } else {
        let mut needed = query_targets.clone();
        for service in &service_targets {
            needed.extend(service.parents.iter().map(|p| p.as_ref()));
        }
        needed
    };
    let all = compute_with_options(graph, &document.root, &needed, options)?;

    let queries = all.select(&query_targets);
    let services: Vec<ServiceProbability> = service_targets
        .into_iter()
        .map(|service| ServiceProbability {
            name: Arc::clone(&service.name),
            probability: service
                .parents
                .iter()
                .map(|p| all.get(p).unwrap_or(0.0))
                .sum(),
            parents: service.parents.clone(),
        })
        .collect();

    debug!(
        queries = queries.len(),
        services = services.len(),
        "analysis complete"
    );
    Ok(Analysis {
        queries,
        services,
        all,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples;

    fn weighted() -> (GraphDocument, WeightedGraph) {
        let doc = samples::load("builtin:queries-weighted").unwrap();
        let graph = doc.to_graph().unwrap();
        (doc, graph)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn default_targets_are_leaves_and_services() {
        let (doc, graph) = weighted();
        let analysis = analyze(&doc, &graph, &[], AggregateOptions::default()).unwrap();
        assert_eq!(analysis.queries.len(), graph.leaves().len());
        assert!(analysis.queries.get("Queries").is_none());
        assert_eq!(analysis.services.len(), doc.services().len());
    }

    #[test]
    fn services_sum_their_parents() {
        let (doc, graph) = weighted();
        let analysis = analyze(&doc, &graph, &[], AggregateOptions::default()).unwrap();

        // Range Queries (0.07) + Multi-attribute Filters (0.07)
        assert!(close(analysis.service("Search Service").unwrap().probability, 0.14));
        // Count (0.028) + Sum (0.021) + Soft Delete (0.03)
        assert!(close(analysis.service("Cart Service").unwrap().probability, 0.079));
        // Right Joins only
        assert!(close(analysis.service("Vendor Service").unwrap().probability, 0.028));
        assert_eq!(analysis.service("Cart Service").unwrap().parents.len(), 3);
    }

    #[test]
    fn explicit_targets_mix_queries_and_services() {
        let (doc, graph) = weighted();
        let targets = vec!["Simple Reads".to_string(), "Order Service".to_string()];
        let analysis = analyze(&doc, &graph, &targets, AggregateOptions::default()).unwrap();
        assert_eq!(analysis.queries.len(), 1);
        assert!(close(analysis.queries.get("Simple Reads").unwrap(), 0.21));
        assert_eq!(analysis.services.len(), 1);
        // Bulk Create (0.048) + Partial Update (0.036)
        assert!(close(analysis.services[0].probability, 0.084));
    }

    #[test]
    fn unknown_target_fails() {
        let (doc, graph) = weighted();
        let err = analyze(
            &doc,
            &graph,
            &["Teleport Service".to_string()],
            AggregateOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, QuerymapError::UnknownNode { .. }));
    }

    #[test]
    fn probability_of_covers_internal_nodes() {
        let (doc, graph) = weighted();
        let analysis = analyze(&doc, &graph, &[], AggregateOptions::default()).unwrap();
        assert_eq!(analysis.probability_of("Queries"), Some(1.0));
        assert!(close(analysis.probability_of("Read Queries").unwrap(), 0.7));
        assert!(analysis.probability_of("Authentication Service").is_some());
    }

    #[test]
    fn explicit_targets_ignore_unrelated_unweighted_edges() {
        let yaml = r#"
schema: querymap/graph@0.1
root: a
edges:
  - { source: a, target: b, weight: 0.5 }
  - { source: a, target: c }
attachments:
  - { parent: b, services: [Billing] }
"#;
        let doc = GraphDocument::from_yaml(yaml).unwrap();
        let graph = doc.to_graph().unwrap();
        let targets = vec!["b".to_string(), "Billing".to_string()];
        let analysis = analyze(&doc, &graph, &targets, AggregateOptions::default()).unwrap();
        assert!(close(analysis.queries.get("b").unwrap(), 0.5));
        assert!(close(analysis.service("Billing").unwrap().probability, 0.5));

        // The full report still needs every edge weighted
        assert!(analyze(&doc, &graph, &[], AggregateOptions::default()).is_err());
    }

    #[test]
    fn unweighted_document_fails() {
        let doc = samples::load("builtin:queries-tree").unwrap();
        let graph = doc.to_graph().unwrap();
        let err = analyze(&doc, &graph, &[], AggregateOptions::default()).unwrap_err();
        assert!(matches!(err, QuerymapError::UnweightedEdge { .. }));
    }
}
