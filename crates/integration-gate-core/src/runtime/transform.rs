// crates/integration-gate-core/src/runtime/transform.rs
// ============================================================================
// Module: Output Transform
// Description: Shapes upstream response bodies with JSONPath rules.
// Purpose: Return only the fields a tool declares to the calling agent.
// Dependencies: jsonpath_lib, serde_json, crate::core
// ============================================================================

//! ## Overview
//! Rules apply in order: `extract` selects the result root, `mapping` builds
//! an object per result item, and `max_array_items` truncates arrays. A
//! missing transform passes the body through unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::OutputTransform;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Output transform failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// JSONPath expression is invalid.
    #[error("invalid jsonpath: {path}")]
    InvalidPath {
        /// Offending expression.
        path: String,
    },
}

// ============================================================================
// SECTION: Transform
// ============================================================================

/// Applies an output transform to a response body.
///
/// # Errors
///
/// Returns [`TransformError::InvalidPath`] when a JSONPath cannot be parsed.
pub fn transform_output(
    body: &Value,
    transform: Option<&OutputTransform>,
) -> Result<Value, TransformError> {
    let Some(transform) = transform else {
        return Ok(body.clone());
    };
    let mut result = match transform.extract.as_deref() {
        Some(path) => select_root(body, path)?,
        None => body.clone(),
    };
    if let Some(mapping) = &transform.mapping {
        result = match result {
            Value::Array(items) => Value::Array(
                items.iter().map(|item| map_item(item, mapping)).collect::<Result<_, _>>()?,
            ),
            other => map_item(&other, mapping)?,
        };
    }
    if let (Some(max), Value::Array(items)) = (transform.max_array_items, &mut result) {
        items.truncate(max);
    }
    Ok(result)
}

/// Selects the result root; a single match unwraps, several form an array.
fn select_root(body: &Value, path: &str) -> Result<Value, TransformError> {
    let mut matches = select(body, path)?;
    Ok(match matches.len() {
        0 => Value::Null,
        1 => matches.remove(0),
        _ => Value::Array(matches),
    })
}

/// Builds an output object from a mapping of field to JSONPath.
fn map_item(item: &Value, mapping: &BTreeMap<String, String>) -> Result<Value, TransformError> {
    let mut out = Map::new();
    for (field, path) in mapping {
        let value = select_root(item, path)?;
        out.insert(field.clone(), value);
    }
    Ok(Value::Object(out))
}

/// Evaluates a JSONPath expression.
fn select(body: &Value, path: &str) -> Result<Vec<Value>, TransformError> {
    jsonpath_lib::select(body, path)
        .map(|matches| matches.into_iter().cloned().collect())
        .map_err(|_| TransformError::InvalidPath { path: path.to_string() })
}
