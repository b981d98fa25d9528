//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - QMAP-000-009: Document loading errors
//! - QMAP-010-019: Structure/validation errors
//! - QMAP-020-029: DAG errors
//! - QMAP-030-039: Aggregation errors
//! - QMAP-040-049: Layout engine errors
//! - QMAP-050-059: Output errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuerymapError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum QuerymapError {
    // ═══════════════════════════════════════════
    // DOCUMENT ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[QMAP-001] IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[QMAP-002] Invalid schema version: '{version}' (expected '{expected}')")]
    InvalidSchemaVersion { version: String, expected: String },

    #[error("[QMAP-003] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("[QMAP-004] Unknown sample '{name}' (available: {available})")]
    UnknownSample { name: String, available: String },

    // ═══════════════════════════════════════════
    // STRUCTURE ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[QMAP-010] Graph document failed validation: {details}")]
    SchemaValidation { details: String },

    #[error("[QMAP-011] Node identifier must not be empty")]
    EmptyNodeId,

    #[error("[QMAP-012] Invalid input: weight {weight} on edge '{source_id}' -> '{target}' is outside [0, 1]")]
    InvalidWeight {
        source_id: String,
        target: String,
        weight: f64,
    },

    #[error("[QMAP-013] Duplicate edge '{source_id}' -> '{target}'")]
    DuplicateEdge { source_id: String, target: String },

    #[error("[QMAP-014] Attachment '{service}' references unknown node '{parent}'")]
    UnknownAttachmentParent { service: String, parent: String },

    #[error("[QMAP-015] Invalid colour '{color}' for {context}")]
    InvalidColor { color: String, context: String },

    #[error("[QMAP-016] Service '{name}' has the same name as a query node")]
    ServiceNameCollision { name: String },

    // ═══════════════════════════════════════════
    // DAG ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[QMAP-020] Cycle detected: {cycle}")]
    CycleDetected { cycle: String },

    #[error("[QMAP-021] Outgoing weights of '{node}' sum to {sum:.3} (above 1)")]
    WeightSumExceeded { node: String, sum: f64 },

    // ═══════════════════════════════════════════
    // AGGREGATION ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[QMAP-030] Invalid input: root '{root}' is not a node of the graph")]
    UnknownRoot { root: String },

    #[error("[QMAP-031] Invalid input: node '{node}' is not a node of the graph")]
    UnknownNode { node: String },

    #[error("[QMAP-032] Edge '{source_id}' -> '{target}' has no weight")]
    UnweightedEdge { source_id: String, target: String },

    #[error("[QMAP-033] Path enumeration stopped after {limit} paths")]
    PathLimitExceeded { limit: usize },

    // ═══════════════════════════════════════════
    // LAYOUT ENGINE ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[QMAP-040] Layout engine '{engine}' could not be started: {reason}")]
    LayoutEngineMissing { engine: String, reason: String },

    #[error("[QMAP-041] Layout engine '{engine}' failed: {stderr}")]
    LayoutFailed { engine: String, stderr: String },

    #[error("[QMAP-042] Layout engine '{engine}' timed out after {seconds}s")]
    LayoutTimeout { engine: String, seconds: u64 },

    // ═══════════════════════════════════════════
    // OUTPUT ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[QMAP-050] JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QuerymapError {
    /// Get the error code (e.g., "QMAP-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "QMAP-001",
            Self::InvalidSchemaVersion { .. } => "QMAP-002",
            Self::YamlParse(_) => "QMAP-003",
            Self::UnknownSample { .. } => "QMAP-004",
            Self::SchemaValidation { .. } => "QMAP-010",
            Self::EmptyNodeId => "QMAP-011",
            Self::InvalidWeight { .. } => "QMAP-012",
            Self::DuplicateEdge { .. } => "QMAP-013",
            Self::UnknownAttachmentParent { .. } => "QMAP-014",
            Self::InvalidColor { .. } => "QMAP-015",
            Self::ServiceNameCollision { .. } => "QMAP-016",
            Self::CycleDetected { .. } => "QMAP-020",
            Self::WeightSumExceeded { .. } => "QMAP-021",
            Self::UnknownRoot { .. } => "QMAP-030",
            Self::UnknownNode { .. } => "QMAP-031",
            Self::UnweightedEdge { .. } => "QMAP-032",
            Self::PathLimitExceeded { .. } => "QMAP-033",
            Self::LayoutEngineMissing { .. } => "QMAP-040",
            Self::LayoutFailed { .. } => "QMAP-041",
            Self::LayoutTimeout { .. } => "QMAP-042",
            Self::Json(_) => "QMAP-050",
        }
    }

    /// Whether the caller passed bad input (as opposed to an environment failure)
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidWeight { .. } | Self::UnknownRoot { .. } | Self::UnknownNode { .. }
        )
    }
}

impl FixSuggestion for QuerymapError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            QuerymapError::Io(_) => Some("Check file path and permissions"),
            QuerymapError::InvalidSchemaVersion { .. } => {
                Some("Use 'querymap/graph@0.1' as the schema version")
            }
            QuerymapError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            QuerymapError::UnknownSample { .. } => {
                Some("Run 'querymap sample' to list the built-in samples")
            }
            QuerymapError::SchemaValidation { .. } => {
                Some("Every edge needs 'source' and 'target'; 'root' and 'schema' are required")
            }
            QuerymapError::EmptyNodeId => Some("Give every node a non-empty name"),
            QuerymapError::InvalidWeight { .. } => {
                Some("Edge weights are probabilities: use a value between 0 and 1")
            }
            QuerymapError::DuplicateEdge { .. } => {
                Some("Declare each source -> target pair once")
            }
            QuerymapError::UnknownAttachmentParent { .. } => {
                Some("Attach services to nodes that appear in 'edges' or 'nodes'")
            }
            QuerymapError::InvalidColor { .. } => {
                Some("Use a Graphviz colour name (e.g. lightgreen) or #rrggbb")
            }
            QuerymapError::ServiceNameCollision { .. } => {
                Some("Rename the service; services and query nodes share one namespace")
            }
            QuerymapError::CycleDetected { .. } => {
                Some("Remove the edge that points back to an ancestor")
            }
            QuerymapError::WeightSumExceeded { .. } => {
                Some("Rescale the outgoing weights so they sum to at most 1")
            }
            QuerymapError::UnknownRoot { .. } => Some("Set 'root' to a node that has edges"),
            QuerymapError::UnknownNode { .. } => {
                Some("Check the node name (names are case-sensitive)")
            }
            QuerymapError::UnweightedEdge { .. } => {
                Some("Add 'weight:' to every edge between the root and the target")
            }
            QuerymapError::PathLimitExceeded { .. } => {
                Some("Raise QUERYMAP_MAX_PATHS or split the graph")
            }
            QuerymapError::LayoutEngineMissing { .. } => {
                Some("Install Graphviz or point QUERYMAP_ENGINE at the dot binary")
            }
            QuerymapError::LayoutFailed { .. } => Some("Inspect the generated .dot file"),
            QuerymapError::LayoutTimeout { .. } => {
                Some("Raise QUERYMAP_LAYOUT_TIMEOUT_SECS for large graphs")
            }
            QuerymapError::Json(_) => None,
        }
    }
}
