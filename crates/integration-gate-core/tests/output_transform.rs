// crates/integration-gate-core/tests/output_transform.rs
// ============================================================================
// Module: Output Transform Tests
// Description: JSONPath extraction, mapping, and truncation.
// Purpose: Ensure agents only see declared response fields.
// Dependencies: integration-gate-core, proptest
// ============================================================================

//! ## Overview
//! Applies [`OutputTransform`] rules to representative API payloads.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use integration_gate_core::OutputTransform;
use integration_gate_core::runtime::TransformError;
use integration_gate_core::runtime::transform_output;
use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Sample paginated issue listing.
fn listing() -> Value {
    json!({
        "data": {
            "items": [
                {"id": 1, "title": "Crash", "author": {"login": "ana"}, "body": "long text"},
                {"id": 2, "title": "Typo", "author": {"login": "bo"}, "body": "more text"},
                {"id": 3, "title": "Slow", "author": {"login": "cy"}, "body": "even more"}
            ]
        },
        "next": "cursor-2"
    })
}

/// Builds a mapping from pairs.
fn mapping(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(field, path)| ((*field).to_string(), (*path).to_string())).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn missing_transform_passes_body_through() {
    assert_eq!(transform_output(&listing(), None).unwrap(), listing());
}

#[test]
fn extract_selects_result_root() {
    let transform = OutputTransform { extract: Some("$.data.items".to_string()), ..OutputTransform::default() };
    let result = transform_output(&listing(), Some(&transform)).unwrap();
    assert_eq!(result.as_array().map(Vec::len), Some(3));
}

#[test]
fn mapping_projects_each_item() {
    let transform = OutputTransform {
        extract: Some("$.data.items".to_string()),
        mapping: Some(mapping(&[("id", "$.id"), ("author", "$.author.login")])),
        max_array_items: Some(2),
    };
    let result = transform_output(&listing(), Some(&transform)).unwrap();
    assert_eq!(result, json!([{"id": 1, "author": "ana"}, {"id": 2, "author": "bo"}]));
}

#[test]
fn mapping_on_object_builds_single_object() {
    let transform = OutputTransform {
        mapping: Some(mapping(&[("cursor", "$.next"), ("missing", "$.nope")])),
        ..OutputTransform::default()
    };
    let result = transform_output(&listing(), Some(&transform)).unwrap();
    assert_eq!(result, json!({"cursor": "cursor-2", "missing": null}));
}

#[test]
fn wildcard_extract_collects_multiple_matches() {
    let transform = OutputTransform { extract: Some("$.data.items[*].title".to_string()), ..OutputTransform::default() };
    let result = transform_output(&listing(), Some(&transform)).unwrap();
    assert_eq!(result, json!(["Crash", "Typo", "Slow"]));
}

#[test]
fn invalid_path_is_an_error() {
    let transform = OutputTransform { extract: Some("$[".to_string()), ..OutputTransform::default() };
    let err = transform_output(&listing(), Some(&transform)).unwrap_err();
    assert!(matches!(err, TransformError::InvalidPath { .. }));
}

proptest! {
    #[test]
    fn transform_is_repeatable(limit in 0_usize .. 5, extract_items in any::<bool>()) {
        let transform = OutputTransform {
            extract: extract_items.then(|| "$.data.items".to_string()),
            mapping: Some(mapping(&[("title", "$.title")])),
            max_array_items: Some(limit),
        };
        let first = transform_output(&listing(), Some(&transform)).unwrap();
        let second = transform_output(&listing(), Some(&transform)).unwrap();
        prop_assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
    }
}
