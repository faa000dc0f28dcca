// crates/integration-gate-http/src/executor.rs
// ============================================================================
// Module: Reqwest HTTP Executor
// Description: Executes built tool requests over a blocking reqwest client.
// Purpose: Bound outbound calls by scheme, host, timeout, and response size.
// Dependencies: integration-gate-core, reqwest, url
// ============================================================================

//! ## Overview
//! Requests arrive fully built from the tool executor. This module only
//! enforces egress policy and maps transport failures onto
//! [`HttpExecutionError`]:
//!
//! - policy rejections are `Blocked` and never touch the network
//! - elapsed timeouts are `Timeout`
//! - connect and transfer failures are `Network`
//! - oversized or unreadable bodies are `InvalidResponse` with the status
//!
//! Redirects are never followed; a 3xx is returned to the caller as-is.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io::Read;
use std::time::Duration;

use integration_gate_core::HttpExecutionError;
use integration_gate_core::HttpExecutor;
use integration_gate_core::HttpMethod;
use integration_gate_core::HttpRequest;
use integration_gate_core::HttpResponse;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use url::Url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP executor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpExecutorConfig {
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Optional host allowlist.
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            max_response_bytes: 1024 * 1024,
            allowed_hosts: None,
            user_agent: "integration-gate/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Blocking HTTP executor for tool calls.
pub struct ReqwestHttpExecutor {
    /// Egress policy and limits.
    config: HttpExecutorConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl ReqwestHttpExecutor {
    /// Creates a new executor with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpExecutionError`] when the HTTP client cannot be created.
    pub fn new(config: HttpExecutorConfig) -> Result<Self, HttpExecutionError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| HttpExecutionError::Network("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Returns the executor configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpExecutorConfig {
        &self.config
    }
}

impl HttpExecutor for ReqwestHttpExecutor {
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, HttpExecutionError> {
        validate_url(&request.url, &self.config)?;

        let mut builder = self
            .client
            .request(reqwest_method(request.method), request.url.as_str())
            .timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.header(CONTENT_TYPE, body.content_type.as_str()).body(body.bytes.clone());
        }

        let mut response = builder.send().map_err(|err| classify_send_error(&err))?;
        let status = response.status().as_u16();
        let headers = collect_headers(&response);
        let body = read_response_limited(&mut response, status, self.config.max_response_bytes)?;
        tracing::debug!(
            target: "integration_gate::http",
            method = request.method.as_str(),
            host = request.url.host_str().unwrap_or_default(),
            status,
            bytes = body.len(),
            "upstream request completed"
        );
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a tool method onto the reqwest method.
const fn reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Head => Method::HEAD,
    }
}

/// Validates URL scheme and allowlist policy.
fn validate_url(url: &Url, config: &HttpExecutorConfig) -> Result<(), HttpExecutionError> {
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        other => {
            return Err(HttpExecutionError::Blocked(format!("unsupported url scheme: {other}")));
        }
    }
    if let Some(allowlist) = &config.allowed_hosts {
        let host = url
            .host_str()
            .ok_or_else(|| HttpExecutionError::Blocked("url host required".to_string()))?;
        if !allowlist.contains(host) {
            return Err(HttpExecutionError::Blocked(format!("url host not allowed: {host}")));
        }
    }
    Ok(())
}

/// Classifies a send failure.
fn classify_send_error(err: &reqwest::Error) -> HttpExecutionError {
    if err.is_timeout() {
        HttpExecutionError::Timeout("upstream did not respond in time".to_string())
    } else if err.is_builder() {
        HttpExecutionError::Blocked("request could not be constructed".to_string())
    } else if err.is_connect() {
        HttpExecutionError::Network("connection failed".to_string())
    } else {
        HttpExecutionError::Network("http request failed".to_string())
    }
}

/// Collects response headers with lowercase names.
///
/// Repeated headers are joined with `, `; non-UTF-8 values are dropped.
fn collect_headers(response: &reqwest::blocking::Response) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers() {
        let Ok(value) = value.to_str() else {
            continue;
        };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}

/// Reads the response body while enforcing a byte limit.
///
/// Body failures carry the already received `status`.
fn read_response_limited(
    response: &mut reqwest::blocking::Response,
    status: u16,
    max_bytes: usize,
) -> Result<Vec<u8>, HttpExecutionError> {
    let invalid = |message: &str| HttpExecutionError::InvalidResponse {
        status: Some(status),
        message: message.to_string(),
    };
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes).map_err(|_| invalid("response size limit exceeds u64"))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(invalid("http response exceeds size limit"));
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle.read_to_end(&mut buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::TimedOut {
            HttpExecutionError::Timeout("response body read timed out".to_string())
        } else {
            invalid("failed to read response")
        }
    })?;
    if buf.len() > max_bytes {
        return Err(invalid("http response exceeds size limit"));
    }
    if let Some(expected) = expected_len {
        let expected = usize::try_from(expected).map_err(|_| invalid("invalid response length"))?;
        if buf.len() < expected {
            return Err(invalid("http response truncated"));
        }
    }
    Ok(buf)
}
