//! Graphviz DOT output

use std::fmt::Write;

use crate::config::Settings;
use crate::presentation::AnnotatedGraph;

/// Render the annotated graph as a DOT digraph.
///
/// Nodes are filled boxes/ellipses with font size 20, edges carry their
/// weight labels at font size 16, and the legend (if any) is a separate
/// `cluster_legend` subgraph.
pub fn to_dot(graph: &AnnotatedGraph, settings: &Settings) -> String {
    let mut out = String::new();
    out.push_str("digraph querymap {\n");
    let _ = writeln!(out, "  label=\"{}\";", escape_dot(&graph.title));
    out.push_str("  labelloc=t;\n");
    let _ = writeln!(out, "  rankdir={};", settings.rankdir.as_str());
    out.push_str("  node [style=filled, fontsize=20];\n");
    out.push_str("  edge [fontsize=16];\n");
    out.push('\n');

    for node in &graph.nodes {
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\" shape={} fillcolor=\"{}\"];",
            escape_dot(&node.id),
            escape_dot(&node.label),
            node.shape.as_str(),
            escape_dot(&node.fill_color),
        );
    }

    out.push('\n');

    for edge in &graph.edges {
        let label_attr = edge
            .label
            .as_ref()
            .map(|l| format!(" [label=\"{}\"]", escape_dot(l)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\"{};",
            escape_dot(&edge.source),
            escape_dot(&edge.target),
            label_attr,
        );
    }

    if !graph.legend.is_empty() {
        out.push('\n');
        out.push_str("  subgraph cluster_legend {\n");
        out.push_str("    label=\"Legend\";\n");
        out.push_str("    style=rounded;\n");
        for (i, entry) in graph.legend.iter().enumerate() {
            let _ = writeln!(
                out,
                "    \"__legend_{}\" [label=\"{}\" shape=box fillcolor=\"{}\"];",
                i,
                escape_dot(&entry.label),
                escape_dot(&entry.color),
            );
        }
        // Keep entries stacked in declaration order
        for i in 1..graph.legend.len() {
            let _ = writeln!(
                out,
                "    \"__legend_{}\" -> \"__legend_{}\" [style=invis];",
                i - 1,
                i
            );
        }
        out.push_str("  }\n");
    }

    out.push_str("}\n");
    out
}

/// Escape a string for Graphviz DOT labels.
fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
