// crates/integration-gate-core/src/runtime/request.rs
// ============================================================================
// Module: Request Builder
// Description: Expands declarative HTTP templates against tool input.
// Purpose: Produce a concrete request before authentication is layered on.
// Dependencies: base64, serde_json, url, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The builder resolves path placeholders, query and header templates, and
//! the body template against the tool input, then encodes the body. It is
//! pure: identical inputs produce identical requests, including multipart
//! boundaries, which are derived from body content.
//!
//! Authentication is merged afterwards with [`apply_auth_material`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

use crate::core::BodyEncoding;
use crate::core::HttpExecutionConfig;
use crate::core::ParamTransform;
use crate::core::ParamValue;
use crate::core::ParameterRef;
use crate::core::hashing::sha256_canonical_hex;
use crate::interfaces::HttpRequest;
use crate::interfaces::RequestBody;
use crate::runtime::auth::AuthMaterial;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request build failures, all surfaced as validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestBuildError {
    /// Path placeholder has no input value.
    #[error("missing path parameter: {0}")]
    MissingPathParam(String),
    /// Path parameter renders to an empty or dot segment.
    #[error("path parameter {0} renders to a disallowed segment")]
    InvalidPathParam(String),
    /// Required parameter has no input value or default.
    #[error("missing required parameter: {0}")]
    MissingParam(String),
    /// Transform could not be applied.
    #[error("parameter {param} cannot be transformed: {reason}")]
    InvalidTransform {
        /// Parameter name.
        param: String,
        /// Failure detail.
        reason: String,
    },
    /// Template is malformed.
    #[error("invalid request template: {0}")]
    InvalidTemplate(String),
    /// Resolved URL is invalid.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    /// Body cannot be encoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    /// Header value contains line breaks.
    #[error("invalid header value for {0}")]
    InvalidHeader(String),
}

// ============================================================================
// SECTION: Build
// ============================================================================

/// Builds a request from a template, tool input, and base URL.
///
/// `body_fields` are injected into the top level of the body; they carry
/// body-placed API keys.
///
/// # Errors
///
/// Returns [`RequestBuildError`] when the template cannot be resolved.
pub fn build_request(
    config: &HttpExecutionConfig,
    input: &Value,
    base_url: &str,
    body_fields: &BTreeMap<String, String>,
) -> Result<HttpRequest, RequestBuildError> {
    let empty = Map::new();
    let input = input.as_object().unwrap_or(&empty);

    let mut url = expand_path(base_url, &config.path_template, input)?;
    let mut query = Vec::new();
    for (name, template) in &config.query_params {
        if let Some(value) = resolve_param(template, input)? {
            query.push((name.clone(), scalar_to_string(&value)));
        }
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    let mut headers = BTreeMap::new();
    for (name, template) in &config.headers {
        if let Some(value) = resolve_param(template, input)? {
            let rendered = scalar_to_string(&value);
            if rendered.contains(['\r', '\n']) {
                return Err(RequestBuildError::InvalidHeader(name.clone()));
            }
            headers.insert(name.clone(), rendered);
        }
    }

    let mut body = match &config.body_template {
        Some(template) => render_template(template, input)?,
        None => None,
    };
    if !body_fields.is_empty() {
        let object = body.get_or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(map) = object else {
            return Err(RequestBuildError::InvalidBody(
                "body auth requires an object body".to_string(),
            ));
        };
        for (name, value) in body_fields {
            map.insert(name.clone(), Value::String(value.clone()));
        }
    }
    let body = body.map(|value| encode_body(&value, config.body_encoding)).transpose()?;

    Ok(HttpRequest { method: config.method, url, headers, body })
}

/// Merges authentication material into a built request.
pub fn apply_auth_material(request: &mut HttpRequest, material: AuthMaterial) {
    request.headers.extend(material.headers);
    if !material.query_params.is_empty() {
        request.url.query_pairs_mut().extend_pairs(material.query_params);
    }
}

// ============================================================================
// SECTION: Path Expansion
// ============================================================================

/// Joins the expanded path template onto the base URL.
fn expand_path(
    base_url: &str,
    template: &str,
    input: &Map<String, Value>,
) -> Result<Url, RequestBuildError> {
    let mut url = Url::parse(base_url).map_err(|err| RequestBuildError::InvalidUrl(err.to_string()))?;
    let mut segments = Vec::new();
    for raw in template.split('/').filter(|segment| !segment.is_empty()) {
        segments.push(expand_segment(raw, input)?);
    }
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| RequestBuildError::InvalidUrl("base url cannot carry a path".to_string()))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

/// Replaces `{name}` placeholders inside one path segment.
fn expand_segment(raw: &str, input: &Map<String, Value>) -> Result<String, RequestBuildError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    let mut last_param = None;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[.. open]);
        let after = &rest[open + 1 ..];
        let close = after.find('}').ok_or_else(|| {
            RequestBuildError::InvalidTemplate(format!("unclosed placeholder in {raw}"))
        })?;
        let name = &after[.. close];
        let value = input
            .get(name)
            .filter(|value| !value.is_null())
            .ok_or_else(|| RequestBuildError::MissingPathParam(name.to_string()))?;
        out.push_str(&scalar_to_string(value));
        last_param = Some(name);
        rest = &after[close + 1 ..];
    }
    out.push_str(rest);
    // Dot segments are normalized away by the URL builder and would retarget the path.
    if let Some(name) = last_param.filter(|_| matches!(out.as_str(), "" | "." | "..")) {
        return Err(RequestBuildError::InvalidPathParam(name.to_string()));
    }
    Ok(out)
}

// ============================================================================
// SECTION: Parameter Resolution
// ============================================================================

/// Resolves a query or header template; `None` drops the entry.
fn resolve_param(
    template: &ParamValue,
    input: &Map<String, Value>,
) -> Result<Option<Value>, RequestBuildError> {
    match template {
        ParamValue::Literal(value) => Ok(Some(value.clone())),
        ParamValue::Ref(reference) => resolve_ref(reference, input),
    }
}

/// Resolves a parameter reference against input.
fn resolve_ref(
    reference: &ParameterRef,
    input: &Map<String, Value>,
) -> Result<Option<Value>, RequestBuildError> {
    let found = input
        .get(&reference.param)
        .filter(|value| !value.is_null())
        .cloned()
        .or_else(|| reference.default.clone());
    match found {
        None if reference.required => Err(RequestBuildError::MissingParam(reference.param.clone())),
        None => Ok(None),
        Some(value) => match reference.transform {
            Some(transform) => apply_transform(&reference.param, value, transform).map(Some),
            None => Ok(Some(value)),
        },
    }
}

/// Renders a body template; objects holding `$param` are references.
fn render_template(
    template: &Value,
    input: &Map<String, Value>,
) -> Result<Option<Value>, RequestBuildError> {
    match template {
        Value::Object(map) if map.contains_key("$param") => {
            let reference: ParameterRef = serde_json::from_value(template.clone())
                .map_err(|err| RequestBuildError::InvalidTemplate(err.to_string()))?;
            resolve_ref(&reference, input)
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if let Some(rendered) = render_template(value, input)? {
                    out.insert(key.clone(), rendered);
                }
            }
            Ok(Some(Value::Object(out)))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(render_template(item, input)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(out)))
        }
        other => Ok(Some(other.clone())),
    }
}

/// Applies a parameter transform.
fn apply_transform(
    param: &str,
    value: Value,
    transform: ParamTransform,
) -> Result<Value, RequestBuildError> {
    let invalid = |reason: &str| RequestBuildError::InvalidTransform {
        param: param.to_string(),
        reason: reason.to_string(),
    };
    let transformed = match transform {
        ParamTransform::String => Value::String(scalar_to_string(&value)),
        ParamTransform::Number => match &value {
            Value::Number(_) => value,
            Value::String(text) => parse_number(text.trim()).ok_or_else(|| invalid("not a number"))?,
            _ => return Err(invalid("not a number")),
        },
        ParamTransform::Boolean => match &value {
            Value::Bool(_) => value,
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(invalid("not a boolean")),
            },
            _ => return Err(invalid("not a boolean")),
        },
        ParamTransform::Json => Value::String(value.to_string()),
        ParamTransform::Lowercase => Value::String(scalar_to_string(&value).to_lowercase()),
        ParamTransform::Uppercase => Value::String(scalar_to_string(&value).to_uppercase()),
        ParamTransform::Trim => Value::String(scalar_to_string(&value).trim().to_string()),
        ParamTransform::Base64 => Value::String(STANDARD.encode(scalar_to_string(&value))),
        ParamTransform::JoinComma => match &value {
            Value::Array(items) => {
                Value::String(items.iter().map(scalar_to_string).collect::<Vec<_>>().join(","))
            }
            other => Value::String(scalar_to_string(other)),
        },
    };
    Ok(transformed)
}

/// Parses a JSON number from text.
fn parse_number(text: &str) -> Option<Value> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
}

/// Renders a JSON value as a plain string for URLs, headers, and forms.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// SECTION: Body Encoding
// ============================================================================

/// Encodes a rendered body.
fn encode_body(value: &Value, encoding: BodyEncoding) -> Result<RequestBody, RequestBuildError> {
    match encoding {
        BodyEncoding::Json => {
            let bytes = serde_json::to_vec(value)
                .map_err(|err| RequestBuildError::InvalidBody(err.to_string()))?;
            Ok(RequestBody { content_type: "application/json".to_string(), bytes })
        }
        BodyEncoding::Form => {
            let fields = object_fields(value, "form")?;
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (name, field) in fields {
                serializer.append_pair(name, &scalar_to_string(field));
            }
            Ok(RequestBody {
                content_type: "application/x-www-form-urlencoded".to_string(),
                bytes: serializer.finish().into_bytes(),
            })
        }
        BodyEncoding::Multipart => {
            let fields = object_fields(value, "multipart")?;
            let digest = sha256_canonical_hex(value)
                .map_err(|err| RequestBuildError::InvalidBody(err.to_string()))?;
            let boundary = format!("integration-gate-{}", &digest[.. 32]);
            let mut bytes = Vec::new();
            for (name, field) in fields {
                let name = name.replace('"', "%22");
                bytes.extend_from_slice(
                    format!(
                        "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                    )
                    .as_bytes(),
                );
                bytes.extend_from_slice(scalar_to_string(field).as_bytes());
                bytes.extend_from_slice(b"\r\n");
            }
            bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
            Ok(RequestBody {
                content_type: format!("multipart/form-data; boundary={boundary}"),
                bytes,
            })
        }
    }
}

/// Returns object fields for flat encodings.
fn object_fields<'a>(
    value: &'a Value,
    encoding: &str,
) -> Result<&'a Map<String, Value>, RequestBuildError> {
    value
        .as_object()
        .ok_or_else(|| RequestBuildError::InvalidBody(format!("{encoding} body must be an object")))
}
