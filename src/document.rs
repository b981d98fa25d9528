//! Graph document parsing structures
//!
//! A document describes the query taxonomy (root, nodes, weighted edges),
//! the services attached to query nodes, and an optional `style:` section.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::StyleConfig;
use crate::error::{QuerymapError, Result};
use crate::graph::{GraphBuilder, WeightedGraph};
use crate::schema;

/// Supported document schema identifier
pub const SCHEMA_VERSION: &str = "querymap/graph@0.1";

/// Graph document parsed from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDocument {
    pub schema: String,
    #[serde(default)]
    pub title: Option<String>,
    pub root: String,
    #[serde(default)]
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub edges: Vec<EdgeDef>,
    #[serde(default)]
    pub attachments: Vec<AttachmentDef>,
    #[serde(default)]
    pub style: StyleConfig,
}

/// Node declaration (needed only for grouping or isolated nodes)
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDef {
    pub id: String,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeDef {
    pub source: Endpoint,
    pub target: Endpoint,
    /// Routing probability; drawn-only documents may omit it
    #[serde(default)]
    pub weight: Option<f64>,
}

/// Handles string OR array for source/target
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Single(String),
    Multiple(Vec<String>),
}

impl Endpoint {
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            Endpoint::Single(s) => vec![s.as_str()],
            Endpoint::Multiple(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// Services drawn as leaves of a query node
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentDef {
    pub parent: String,
    pub services: Vec<String>,
}

/// A service and every query node it is attached to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub name: Arc<str>,
    pub parents: Vec<Arc<str>>,
}

impl GraphDocument {
    /// Parse and validate a document from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value = schema::validate_yaml(yaml)?;
        let doc: GraphDocument = serde_json::from_value(value).map_err(|e| {
            QuerymapError::SchemaValidation {
                details: e.to_string(),
            }
        })?;

        if doc.schema != SCHEMA_VERSION {
            return Err(QuerymapError::InvalidSchemaVersion {
                version: doc.schema,
                expected: SCHEMA_VERSION.to_string(),
            });
        }
        doc.style.validate()?;

        debug!(
            root = %doc.root,
            edges = doc.edges.len(),
            attachments = doc.attachments.len(),
            "parsed graph document"
        );
        Ok(doc)
    }

    /// Read a document from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Title used in headings and the DOT label
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.root)
    }

    /// Build the weighted query graph (attachments are not part of it).
    ///
    /// Fails when an attachment parent is not a graph node, or when a service
    /// reuses a query node's name.
    pub fn to_graph(&self) -> Result<WeightedGraph> {
        let mut builder = GraphBuilder::new();
        builder.add_node(&self.root);
        for node in &self.nodes {
            builder.add_node(&node.id);
        }
        for edge in &self.edges {
            for source in edge.source.as_vec() {
                for target in edge.target.as_vec() {
                    builder.add_edge(source, target, edge.weight);
                }
            }
        }
        let graph = builder.build()?;

        if graph.successors(&self.root).is_empty() && graph.node_count() > 1 {
            warn!(root = %self.root, "root has no outgoing edges");
        }

        for attachment in &self.attachments {
            if !graph.contains(&attachment.parent) {
                return Err(QuerymapError::UnknownAttachmentParent {
                    service: attachment.services.first().cloned().unwrap_or_default(),
                    parent: attachment.parent.clone(),
                });
            }
            if let Some(name) = attachment.services.iter().find(|s| graph.contains(s)) {
                return Err(QuerymapError::ServiceNameCollision { name: name.clone() });
            }
        }

        Ok(graph)
    }

    /// Group of a query node, if declared
    pub fn group_of(&self, node_id: &str) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.id == node_id)
            .and_then(|n| n.group.as_deref())
    }

    /// Attached services in first-seen order, each with all of its parents
    pub fn services(&self) -> Vec<Service> {
        let mut order: Vec<Service> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for attachment in &self.attachments {
            let parent: Arc<str> = Arc::from(attachment.parent.as_str());
            for name in &attachment.services {
                match index.get(name.as_str()) {
                    Some(&i) => {
                        if !order[i].parents.contains(&parent) {
                            order[i].parents.push(Arc::clone(&parent));
                        }
                    }
                    None => {
                        index.insert(name.as_str(), order.len());
                        order.push(Service {
                            name: Arc::from(name.as_str()),
                            parents: vec![Arc::clone(&parent)],
                        });
                    }
                }
            }
        }

        order
    }

    /// Number of attachment edges (service -> parent pairs)
    pub fn attachment_edge_count(&self) -> usize {
        self.services().iter().map(|s| s.parents.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
schema: querymap/graph@0.1
title: Queries
root: Queries
nodes:
  - id: Queries
    group: root
  - id: Read Queries
    group: branch
edges:
  - source: Queries
    target: Read Queries
    weight: 0.7
  - source: Queries
    target: Write Queries
    weight: 0.3
  - source: Read Queries
    target: [Simple Reads, Complex Reads]
    weight: 0.5
attachments:
  - parent: Simple Reads
    services: [Catalog Service, Payment Service]
  - parent: Write Queries
    services: [Catalog Service]
"#;

    #[test]
    fn parses_and_builds_graph() {
        let doc = GraphDocument::from_yaml(DOC).unwrap();
        assert_eq!(doc.display_title(), "Queries");
        let graph = doc.to_graph().unwrap();
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.weight("Read Queries", "Complex Reads"), Some(Some(0.5)));
        assert!(graph.is_fully_weighted());
    }

    #[test]
    fn services_merge_parents_in_first_seen_order() {
        let doc = GraphDocument::from_yaml(DOC).unwrap();
        let services = doc.services();
        let names: Vec<&str> = services.iter().map(|s| s.name.as_ref()).collect();
        assert_eq!(names, vec!["Catalog Service", "Payment Service"]);
        let parents: Vec<&str> = services[0].parents.iter().map(|p| p.as_ref()).collect();
        assert_eq!(parents, vec!["Simple Reads", "Write Queries"]);
        assert_eq!(doc.attachment_edge_count(), 3);
    }

    #[test]
    fn group_lookup() {
        let doc = GraphDocument::from_yaml(DOC).unwrap();
        assert_eq!(doc.group_of("Queries"), Some("root"));
        assert_eq!(doc.group_of("Simple Reads"), None);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let yaml = DOC.replace("querymap/graph@0.1", "querymap/graph@9.9");
        let err = GraphDocument::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, QuerymapError::InvalidSchemaVersion { .. }));
    }

    #[test]
    fn rejects_attachment_to_unknown_parent() {
        let yaml = DOC.replace("parent: Write Queries", "parent: Nowhere");
        let doc = GraphDocument::from_yaml(&yaml).unwrap();
        let err = doc.to_graph().unwrap_err();
        assert!(matches!(err, QuerymapError::UnknownAttachmentParent { .. }));
    }

    #[test]
    fn rejects_out_of_range_weight() {
        let yaml = DOC.replace("weight: 0.7", "weight: 7");
        let doc = GraphDocument::from_yaml(&yaml).unwrap();
        assert!(matches!(
            doc.to_graph().unwrap_err(),
            QuerymapError::InvalidWeight { .. }
        ));
    }

    #[test]
    fn rejects_bad_style_colour() {
        let yaml = format!(
            "{}style:\n  groups:\n    - name: root\n      color: \"light blue\"\n",
            DOC
        );
        let err = GraphDocument::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, QuerymapError::InvalidColor { .. }));
    }

    #[test]
    fn unweighted_edges_are_allowed() {
        let yaml = r#"
schema: querymap/graph@0.1
root: a
edges:
  - source: a
    target: [b, c]
"#;
        let graph = GraphDocument::from_yaml(yaml).unwrap().to_graph().unwrap();
        assert_eq!(graph.weight("a", "b"), Some(None));
        assert!(!graph.is_fully_weighted());
    }

    #[test]
    fn rejects_service_named_like_a_query_node() {
        let yaml = r#"
schema: querymap/graph@0.1
root: a
edges:
  - { source: a, target: b, weight: 0.5 }
  - { source: a, target: c, weight: 0.5 }
attachments:
  - { parent: b, services: [c] }
"#;
        let err = GraphDocument::from_yaml(yaml).unwrap().to_graph().unwrap_err();
        assert!(matches!(err, QuerymapError::ServiceNameCollision { ref name } if name == "c"));
        assert_eq!(err.code(), "QMAP-016");
    }
}
