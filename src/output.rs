//! Report formatting for the CLI (text or JSON)

use std::fmt::Write;

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;
use crate::config::Settings;
use crate::error::Result;
use crate::presentation::Band;
use crate::probability::WeightedPath;

/// Output format enum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text (default)
    #[default]
    Text,

    /// JSON document
    Json,
}

#[derive(Serialize)]
struct PathsReport<'a> {
    root: &'a str,
    target: &'a str,
    probability: f64,
    paths: Vec<PathEntry<'a>>,
}

#[derive(Serialize)]
struct PathEntry<'a> {
    nodes: Vec<&'a str>,
    weights: &'a [f64],
    probability: f64,
}

fn paint(text: String, band: Band) -> String {
    match band {
        Band::High => text.red().bold().to_string(),
        Band::Medium => text.yellow().to_string(),
        Band::Low => text.dimmed().to_string(),
    }
}

/// Decimal places in `probs`/`paths` text reports
pub const DEFAULT_REPORT_PRECISION: usize = 2;

/// Format an analysis (`settings` supplies the band thresholds)
pub fn format_analysis(
    analysis: &Analysis,
    settings: &Settings,
    precision: usize,
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(analysis)?);
    }

    let width = analysis
        .queries
        .iter()
        .map(|q| q.node.chars().count())
        .chain(analysis.services.iter().map(|s| s.name.chars().count()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    if !analysis.queries.is_empty() {
        let _ = writeln!(out, "{}", "Queries".cyan().bold());
        for entry in analysis.queries.iter() {
            let _ = writeln!(
                out,
                "  {:<width$}  {:.*}",
                entry.node,
                precision,
                entry.probability,
                width = width
            );
        }
    }

    if !analysis.services.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", "Services".cyan().bold());
        for service in &analysis.services {
            let band = Band::classify(service.probability, &settings.bands);
            let value = paint(format!("{:.*}", precision, service.probability), band);
            let parents: Vec<&str> = service.parents.iter().map(|p| p.as_ref()).collect();
            let _ = writeln!(
                out,
                "  {:<width$}  {}  {}",
                service.name,
                value,
                format!("via {}", parents.join(", ")).dimmed(),
                width = width
            );
        }
    }

    Ok(out)
}

/// Format the simple paths from `root` to `target`
pub fn format_paths(
    root: &str,
    target: &str,
    paths: &[WeightedPath],
    precision: usize,
    format: OutputFormat,
) -> Result<String> {
    let total: f64 = paths.iter().map(|p| p.probability()).sum();

    if format == OutputFormat::Json {
        let report = PathsReport {
            root,
            target,
            probability: total,
            paths: paths
                .iter()
                .map(|p| PathEntry {
                    nodes: p.nodes.iter().map(|n| n.as_ref()).collect(),
                    weights: &p.weights,
                    probability: p.probability(),
                })
                .collect(),
        };
        return Ok(serde_json::to_string_pretty(&report)?);
    }

    let mut out = String::new();
    if paths.is_empty() {
        let _ = writeln!(out, "No path from '{}' to '{}'", root, target);
    }
    for path in paths {
        let mut line = String::new();
        for (i, node) in path.nodes.iter().enumerate() {
            if i > 0 {
                let _ = write!(line, " -({:.*})-> ", precision, path.weights[i - 1]);
            }
            line.push_str(node);
        }
        let _ = writeln!(out, "  {}  = {:.*}", line, precision, path.probability());
    }
    let _ = writeln!(
        out,
        "{} {} path(s), cumulative probability {:.*}",
        "→".cyan(),
        paths.len(),
        precision,
        total
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::probability::{simple_paths, AggregateOptions};
    use crate::samples;

    fn no_color() {
        colored::control::set_override(false);
    }

    #[test]
    fn parse_format_from_yaml() {
        let format: OutputFormat = serde_yaml::from_str("json").unwrap();
        assert_eq!(format, OutputFormat::Json);
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn text_report_lists_queries_and_services() {
        no_color();
        let doc = samples::load("builtin:queries-weighted").unwrap();
        let graph = doc.to_graph().unwrap();
        let analysis = analyze(&doc, &graph, &[], AggregateOptions::default()).unwrap();
        let text = format_analysis(&analysis, &Settings::default(), 2, OutputFormat::Text).unwrap();
        assert!(text.contains("Queries"));
        assert!(text.contains("Services"));
        assert!(text.contains("Search Service"));
        assert!(text.contains("0.14"));
        assert!(text.contains("via Range Queries, Multi-attribute Filters"));
    }

    #[test]
    fn json_report_is_structured() {
        let doc = samples::load("builtin:queries-weighted").unwrap();
        let graph = doc.to_graph().unwrap();
        let targets = vec!["Simple Reads".to_string(), "Payment Service".to_string()];
        let analysis = analyze(&doc, &graph, &targets, AggregateOptions::default()).unwrap();
        let json = format_analysis(&analysis, &Settings::default(), 2, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["queries"][0]["node"], "Simple Reads");
        assert_eq!(value["services"][0]["name"], "Payment Service");
        assert!(value.get("all").is_none());
    }

    #[test]
    fn path_report_shows_weights() {
        no_color();
        let doc = samples::load("builtin:queries-weighted").unwrap();
        let graph = doc.to_graph().unwrap();
        let paths = simple_paths(&graph, "Queries", "Simple Reads").unwrap();
        let text = format_paths("Queries", "Simple Reads", &paths, 2, OutputFormat::Text).unwrap();
        assert!(text.contains("Queries -(0.70)-> Read Queries -(0.30)-> Simple Reads  = 0.21"));
        assert!(text.contains("1 path(s)"));

        let json = format_paths("Queries", "Simple Reads", &paths, 2, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["paths"][0]["nodes"][1], "Read Queries");
    }
}
