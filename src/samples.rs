//! Built-in sample documents
//!
//! `builtin:<name>` can be passed anywhere a document path is accepted.

use crate::document::GraphDocument;
use crate::error::{QuerymapError, Result};

/// Prefix selecting a built-in sample instead of a file
pub const BUILTIN_PREFIX: &str = "builtin:";

/// An embedded sample document
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub name: &'static str,
    pub description: &'static str,
    pub yaml: &'static str,
}

pub const SAMPLES: &[Sample] = &[
    Sample {
        name: "queries-tree",
        description: "Unweighted query taxonomy with five branches (drawing only)",
        yaml: include_str!("../samples/queries-tree.yaml"),
    },
    Sample {
        name: "queries-weighted",
        description: "Weighted query taxonomy with attached services",
        yaml: include_str!("../samples/queries-weighted.yaml"),
    },
];

/// Look up a sample by name
pub fn find(name: &str) -> Result<&'static Sample> {
    SAMPLES
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| QuerymapError::UnknownSample {
            name: name.to_string(),
            available: SAMPLES
                .iter()
                .map(|s| s.name)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Load a document from a path or a `builtin:` reference
pub fn load(reference: &str) -> Result<GraphDocument> {
    match reference.strip_prefix(BUILTIN_PREFIX) {
        Some(name) => GraphDocument::from_yaml(find(name)?.yaml),
        None => GraphDocument::from_file(std::path::Path::new(reference)),
    }
}
