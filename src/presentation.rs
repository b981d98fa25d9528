//! Presentation mapping
//!
//! Turns a document, its graph and (optionally) computed probabilities into
//! a rendering-ready [`AnnotatedGraph`]. Nothing here mutates the graph or
//! the analysis.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::analysis::Analysis;
use crate::config::{BandThresholds, LegendEntry, Settings};
use crate::document::GraphDocument;
use crate::graph::WeightedGraph;

/// Probability band of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    High,
    Medium,
    Low,
}

impl Band {
    /// Classify against inclusive lower bounds
    pub fn classify(probability: f64, thresholds: &BandThresholds) -> Self {
        if probability >= thresholds.high {
            Band::High
        } else if probability >= thresholds.medium {
            Band::Medium
        } else {
            Band::Low
        }
    }

    pub fn color<'a>(&self, settings: &'a Settings) -> &'a str {
        match self {
            Band::High => &settings.colors.high,
            Band::Medium => &settings.colors.medium,
            Band::Low => &settings.colors.low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Query,
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    Ellipse,
    Box,
}

impl NodeShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeShape::Ellipse => "ellipse",
            NodeShape::Box => "box",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderNode {
    pub id: Arc<str>,
    pub label: String,
    pub kind: NodeKind,
    pub shape: NodeShape,
    pub fill_color: String,
    pub probability: Option<f64>,
    pub band: Option<Band>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderEdge {
    pub source: Arc<str>,
    pub target: Arc<str>,
    pub label: Option<String>,
    /// Service attachment (drawn, never weighted)
    pub attachment: bool,
}

/// Rendering-ready graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedGraph {
    pub title: String,
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
    pub legend: Vec<LegendEntry>,
}

impl AnnotatedGraph {
    pub fn node(&self, id: &str) -> Option<&RenderNode> {
        self.nodes.iter().find(|n| n.id.as_ref() == id)
    }
}

/// Build the annotated graph
pub fn annotate(
    document: &GraphDocument,
    graph: &WeightedGraph,
    analysis: Option<&Analysis>,
    settings: &Settings,
) -> AnnotatedGraph {
    let mut nodes = Vec::with_capacity(graph.node_count());
    let mut edges = Vec::with_capacity(graph.edge_count());
    let mut unknown_groups: HashSet<&str> = HashSet::new();
    let mut uses_default = false;

    for id in graph.node_ids() {
        let fill_color = match document.group_of(id) {
            Some(group) => match settings.group_color(group) {
                Some(color) => color.to_string(),
                None => {
                    if unknown_groups.insert(group) {
                        warn!(group, "group has no colour in style.groups");
                    }
                    uses_default = true;
                    settings.colors.default.clone()
                }
            },
            None => {
                uses_default = true;
                settings.colors.default.clone()
            }
        };

        nodes.push(RenderNode {
            id: Arc::clone(id),
            label: id.to_string(),
            kind: NodeKind::Query,
            shape: NodeShape::Ellipse,
            fill_color,
            probability: analysis.and_then(|a| a.probability_of(id)),
            band: None,
        });
    }

    for (source, successor) in graph.edges() {
        edges.push(RenderEdge {
            source: Arc::clone(source),
            target: Arc::clone(&successor.target),
            label: successor
                .weight
                .map(|w| format!("{:.*}", settings.edge_precision, w)),
            attachment: false,
        });
    }

    let services = document.services();
    for service in &services {
        let probability = analysis.and_then(|a| a.probability_of(&service.name));
        let band = probability.map(|p| Band::classify(p, &settings.bands));
        let label = match probability {
            Some(p) => format!("{}\n{:.*}", service.name, settings.label_precision, p),
            None => service.name.to_string(),
        };
        let fill_color = match band {
            Some(b) => b.color(settings).to_string(),
            None => settings.colors.service.clone(),
        };

        nodes.push(RenderNode {
            id: Arc::clone(&service.name),
            label,
            kind: NodeKind::Service,
            shape: NodeShape::Box,
            fill_color,
            probability,
            band,
        });
        for parent in &service.parents {
            edges.push(RenderEdge {
                source: Arc::clone(parent),
                target: Arc::clone(&service.name),
                label: None,
                attachment: true,
            });
        }
    }

    let legend = if !settings.show_legend {
        Vec::new()
    } else if let Some(ref explicit) = settings.legend {
        explicit.clone()
    } else {
        derived_legend(settings, uses_default, !services.is_empty(), analysis.is_some())
    };

    AnnotatedGraph {
        title: document.display_title().to_string(),
        nodes,
        edges,
        legend,
    }
}

fn derived_legend(
    settings: &Settings,
    uses_default: bool,
    has_services: bool,
    has_probabilities: bool,
) -> Vec<LegendEntry> {
    let mut legend: Vec<LegendEntry> = settings
        .groups
        .iter()
        .map(|g| LegendEntry {
            color: g.color.clone(),
            label: g.label.clone().unwrap_or_else(|| g.name.clone()),
        })
        .collect();

    if uses_default {
        legend.push(LegendEntry {
            color: settings.colors.default.clone(),
            label: "Leaf Nodes".to_string(),
        });
    }

    if has_services && has_probabilities {
        let b = &settings.bands;
        legend.push(LegendEntry {
            color: settings.colors.high.clone(),
            label: format!("Services (p ≥ {})", b.high),
        });
        legend.push(LegendEntry {
            color: settings.colors.medium.clone(),
            label: format!("Services ({} ≤ p < {})", b.medium, b.high),
        });
        legend.push(LegendEntry {
            color: settings.colors.low.clone(),
            label: format!("Services (p < {})", b.medium),
        });
    } else if has_services {
        legend.push(LegendEntry {
            color: settings.colors.service.clone(),
            label: "Services".to_string(),
        });
    }

    legend
}
