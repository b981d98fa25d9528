//! Graph document schema validator
//!
//! Checks document structure against the embedded JSON Schema before
//! serde parsing, so every structural problem is reported at once.

use jsonschema::Validator;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{QuerymapError, Result};

/// Embedded schema JSON
const SCHEMA_JSON: &str = include_str!("../schemas/querymap-graph.schema.json");

/// Global validator instance (lazy initialization)
static VALIDATOR: OnceLock<std::result::Result<Validator, String>> = OnceLock::new();

/// One structural violation
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// JSON pointer to the offending value (e.g. "/edges/0/weight")
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "[{}] {}", self.path, self.message)
        }
    }
}

fn validator() -> Result<&'static Validator> {
    let compiled = VALIDATOR.get_or_init(|| {
        let schema: Value = serde_json::from_str(SCHEMA_JSON)
            .map_err(|e| format!("Failed to parse schema JSON: {}", e))?;
        Validator::new(&schema).map_err(|e| format!("Failed to compile schema: {}", e))
    });

    compiled
        .as_ref()
        .map_err(|reason| QuerymapError::SchemaValidation {
            details: reason.clone(),
        })
}

/// Collect every violation of the document schema
pub fn schema_errors(value: &Value) -> Result<Vec<SchemaError>> {
    Ok(validator()?
        .iter_errors(value)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect())
}

/// Validate a JSON value against the document schema
pub fn validate_value(value: &Value) -> Result<()> {
    let errors = schema_errors(value)?;
    if errors.is_empty() {
        return Ok(());
    }

    let details = if errors.len() == 1 {
        errors[0].to_string()
    } else {
        format!(
            "{} errors: {}",
            errors.len(),
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        )
    };
    Err(QuerymapError::SchemaValidation { details })
}

/// Parse YAML and validate its structure
pub fn validate_yaml(yaml: &str) -> Result<Value> {
    let value: Value = serde_yaml::from_str(yaml)?;
    validate_value(&value)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embedded_schema_compiles() {
        assert!(validator().is_ok());
    }

    #[test]
    fn minimal_document_is_valid() {
        let doc = json!({
            "schema": "querymap/graph@0.1",
            "root": "Queries",
            "edges": [{"source": "Queries", "target": "Read Queries", "weight": 0.7}]
        });
        assert!(validate_value(&doc).is_ok());
    }

    #[test]
    fn endpoint_accepts_list() {
        let doc = json!({
            "schema": "querymap/graph@0.1",
            "root": "a",
            "edges": [{"source": "a", "target": ["b", "c"]}]
        });
        assert!(validate_value(&doc).is_ok());
    }

    #[test]
    fn missing_root_is_reported() {
        let doc = json!({"schema": "querymap/graph@0.1"});
        let err = validate_value(&doc).unwrap_err();
        assert!(err.to_string().contains("QMAP-010"));
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn all_errors_reported_together() {
        let doc = json!({
            "schema": "querymap/graph@0.1",
            "root": "a",
            "edges": [
                {"source": "a"},
                {"source": "a", "target": "b", "weight": "high"}
            ],
            "extra": true
        });
        let errors = schema_errors(&doc).unwrap();
        assert!(errors.len() >= 3);
        assert!(errors.iter().any(|e| e.path == "/edges/1/weight"));
    }

    #[test]
    fn yaml_is_converted_before_validation() {
        let yaml = r#"
schema: querymap/graph@0.1
root: a
style:
  rankdir: sideways
"#;
        let err = validate_yaml(yaml).unwrap_err();
        assert!(matches!(err, QuerymapError::SchemaValidation { .. }));
    }
}
