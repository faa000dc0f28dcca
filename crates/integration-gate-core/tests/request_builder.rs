// crates/integration-gate-core/tests/request_builder.rs
// ============================================================================
// Module: Request Builder Tests
// Description: Template expansion, parameter transforms, and body encodings.
// Purpose: Ensure requests are fully formed before authentication is added.
// Dependencies: integration-gate-core
// ============================================================================

//! ## Overview
//! Builds requests from [`HttpExecutionConfig`] templates and checks the
//! resulting URL, headers, and encoded bodies.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;

use integration_gate_core::BodyEncoding;
use integration_gate_core::HttpExecutionConfig;
use integration_gate_core::HttpMethod;
use integration_gate_core::HttpRequest;
use integration_gate_core::runtime::RequestBuildError;
use integration_gate_core::runtime::auth::AuthMaterial;
use integration_gate_core::runtime::build_request;
use integration_gate_core::runtime::request::apply_auth_material;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses an execution config from JSON.
fn config(value: Value) -> HttpExecutionConfig {
    serde_json::from_value(value).unwrap()
}

/// Builds without body auth fields.
fn build(config: &HttpExecutionConfig, input: Value) -> Result<HttpRequest, RequestBuildError> {
    build_request(config, &input, "https://api.example.test/v2/", &BTreeMap::new())
}

// ============================================================================
// SECTION: URL Expansion
// ============================================================================

#[test]
fn path_placeholders_are_expanded_and_encoded() {
    let config = config(json!({"method": "GET", "path_template": "/repos/{owner}/{name}/issues"}));
    let request = build(&config, json!({"owner": "acme corp", "name": "a/b"})).unwrap();
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.url.as_str(), "https://api.example.test/v2/repos/acme%20corp/a%2Fb/issues");
    assert!(request.body.is_none());
}

#[test]
fn numeric_path_parameters_render_as_text() {
    let config = config(json!({"method": "GET", "path_template": "/items/{id}.json"}));
    let request = build(&config, json!({"id": 42})).unwrap();
    assert_eq!(request.url.path(), "/v2/items/42.json");
}

#[test]
fn missing_path_parameter_is_a_validation_error() {
    let config = config(json!({"method": "GET", "path_template": "/repos/{owner}"}));
    assert_eq!(build(&config, json!({})), Err(RequestBuildError::MissingPathParam("owner".to_string())));
}

#[test]
fn dot_and_empty_path_parameters_cannot_retarget_the_path() {
    let sessions = config(json!({"method": "GET", "path_template": "/users/{id}/sessions"}));
    for id in ["..", ".", ""] {
        assert_eq!(
            build(&sessions, json!({"id": id})),
            Err(RequestBuildError::InvalidPathParam("id".to_string())),
            "id {id:?} must be rejected"
        );
    }
    let request = build(&sessions, json!({"id": "..x"})).unwrap();
    assert_eq!(request.url.path(), "/v2/users/..x/sessions");
    let literal = config(json!({"method": "GET", "path_template": "/users/{id}.json"}));
    let request = build(&literal, json!({"id": "."})).unwrap();
    assert_eq!(request.url.path(), "/v2/users/..json");
}

#[test]
fn query_parameters_resolve_literals_refs_defaults_and_transforms() {
    let config = config(json!({
        "method": "GET",
        "path_template": "/search",
        "query_params": {
            "q": {"$param": "query", "transform": "trim"},
            "labels": {"$param": "labels", "transform": "join_comma"},
            "per_page": 50,
            "state": {"$param": "state", "default": "open"},
            "cursor": {"$param": "cursor"}
        }
    }));
    let request = build(&config, json!({"query": "  bug  ", "labels": ["p1", "ui"]})).unwrap();
    let pairs: BTreeMap<String, String> = request.url.query_pairs().into_owned().collect();
    assert_eq!(pairs.get("q").map(String::as_str), Some("bug"));
    assert_eq!(pairs.get("labels").map(String::as_str), Some("p1,ui"));
    assert_eq!(pairs.get("per_page").map(String::as_str), Some("50"));
    assert_eq!(pairs.get("state").map(String::as_str), Some("open"));
    assert!(!pairs.contains_key("cursor"));
}

#[test]
fn required_parameter_without_value_fails() {
    let config = config(json!({
        "method": "GET",
        "path_template": "/search",
        "query_params": {"q": {"$param": "query", "required": true}}
    }));
    assert_eq!(build(&config, json!({"query": null})), Err(RequestBuildError::MissingParam("query".to_string())));
}

#[test]
fn transform_failures_are_reported() {
    let config = config(json!({
        "method": "GET",
        "path_template": "/items",
        "query_params": {"limit": {"$param": "limit", "transform": "number"}}
    }));
    let err = build(&config, json!({"limit": "ten"})).unwrap_err();
    assert!(matches!(err, RequestBuildError::InvalidTransform { ref param, .. } if param == "limit"));
}

#[test]
fn headers_resolve_and_reject_line_breaks() {
    let config = config(json!({
        "method": "GET",
        "path_template": "/me",
        "headers": {"X-Trace": {"$param": "trace", "transform": "uppercase"}, "Accept": "application/json"}
    }));
    let request = build(&config, json!({"trace": "abc"})).unwrap();
    assert_eq!(request.headers.get("X-Trace").map(String::as_str), Some("ABC"));
    assert_eq!(request.headers.get("Accept").map(String::as_str), Some("application/json"));

    let err = build(&config, json!({"trace": "a\r\nInjected: 1"})).unwrap_err();
    assert_eq!(err, RequestBuildError::InvalidHeader("X-Trace".to_string()));
}

// ============================================================================
// SECTION: Bodies
// ============================================================================

#[test]
fn json_body_template_is_rendered() {
    let config = config(json!({
        "method": "POST",
        "path_template": "/issues",
        "body_template": {
            "title": {"$param": "title"},
            "meta": {"count": {"$param": "count", "transform": "number"}, "tags": [{"$param": "tag"}, "fixed"]},
            "optional": {"$param": "missing"}
        }
    }));
    let request = build(&config, json!({"title": "Crash", "count": "3", "tag": "bug"})).unwrap();
    let body = request.body.unwrap();
    assert_eq!(body.content_type, "application/json");
    let value: Value = serde_json::from_slice(&body.bytes).unwrap();
    assert_eq!(value, json!({"title": "Crash", "meta": {"count": 3, "tags": ["bug", "fixed"]}}));
}

#[test]
fn form_body_is_url_encoded() {
    let config = config(json!({
        "method": "POST",
        "path_template": "/token",
        "body_encoding": "form",
        "body_template": {"grant_type": "client_credentials", "scope": {"$param": "scope"}}
    }));
    let request = build(&config, json!({"scope": "read write"})).unwrap();
    let body = request.body.unwrap();
    assert_eq!(body.content_type, "application/x-www-form-urlencoded");
    assert_eq!(String::from_utf8(body.bytes).unwrap(), "grant_type=client_credentials&scope=read+write");
}

#[test]
fn multipart_boundary_is_derived_from_content() {
    let config = config(json!({
        "method": "POST",
        "path_template": "/upload",
        "body_encoding": "multipart",
        "body_template": {"name": {"$param": "name"}}
    }));
    let first = build(&config, json!({"name": "report.txt"})).unwrap().body.unwrap();
    let again = build(&config, json!({"name": "report.txt"})).unwrap().body.unwrap();
    let other = build(&config, json!({"name": "other.txt"})).unwrap().body.unwrap();
    assert_eq!(first, again);
    assert_ne!(first.content_type, other.content_type);
    assert!(first.content_type.starts_with("multipart/form-data; boundary=integration-gate-"));
    let text = String::from_utf8(first.bytes).unwrap();
    assert!(text.contains("Content-Disposition: form-data; name=\"name\"\r\n\r\nreport.txt\r\n"));
    assert!(text.ends_with("--\r\n"));
}

#[test]
fn body_auth_fields_are_injected_into_object_bodies() {
    let send = config(json!({"method": "POST", "path_template": "/send"}));
    let mut fields = BTreeMap::new();
    fields.insert("api_key".to_string(), "k-1".to_string());
    let request = build_request(&send, &json!({}), "https://api.example.test", &fields).unwrap();
    let value: Value = serde_json::from_slice(&request.body.unwrap().bytes).unwrap();
    assert_eq!(value, json!({"api_key": "k-1"}));

    let array_body = config(json!({"method": "POST", "path_template": "/send", "body_template": [1, 2]}));
    assert!(matches!(
        build_request(&array_body, &json!({}), "https://api.example.test", &fields),
        Err(RequestBuildError::InvalidBody(_))
    ));
}

// ============================================================================
// SECTION: Auth Merge
// ============================================================================

#[test]
fn auth_query_params_append_to_built_url() {
    let config = config(json!({
        "method": "GET",
        "path_template": "/items",
        "query_params": {"page": 2}
    }));
    let mut request = build(&config, json!({})).unwrap();
    let mut material = AuthMaterial::default();
    material.query_params.insert("key".to_string(), "secret".to_string());
    material.headers.insert("Authorization".to_string(), "Bearer t".to_string());
    apply_auth_material(&mut request, material);
    assert_eq!(request.url.query(), Some("page=2&key=secret"));
    assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer t"));
}

#[test]
fn invalid_base_url_is_rejected() {
    let config = config(json!({"method": "GET", "path_template": "/x"}));
    let err = build_request(&config, &json!({}), "not a url", &BTreeMap::new()).unwrap_err();
    assert!(matches!(err, RequestBuildError::InvalidUrl(_)));
    assert_eq!(BodyEncoding::default(), BodyEncoding::Json);
}
