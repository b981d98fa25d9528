//! Querymap - cumulative path probabilities over weighted query graphs

pub mod analysis;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod output;
pub mod presentation;
pub mod probability;
pub mod render;
pub mod samples;
pub mod schema;

pub use analysis::{analyze, Analysis, ServiceProbability};
pub use config::{CliOverrides, EnvOverrides, ImageFormat, RankDir, Settings, StyleConfig};
pub use document::GraphDocument;
pub use error::{FixSuggestion, QuerymapError, Result};
pub use graph::{GraphBuilder, Successor, WeightedGraph};
pub use output::OutputFormat;
pub use presentation::{annotate, AnnotatedGraph, Band};
pub use probability::{
    compute_cumulative_probabilities, compute_with_options, simple_paths, AggregateOptions,
    CumulativeProbabilities, WeightedPath,
};
pub use render::{to_dot, LayoutEngine};
