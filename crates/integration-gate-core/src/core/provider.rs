// crates/integration-gate-core/src/core/provider.rs
// ============================================================================
// Module: Integration Provider Definitions
// Description: Provider configuration, auth methods, and tool definitions.
// Purpose: Describe how a third-party API is reached and which tools it exposes.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A provider configuration is static registry data: the base URL, the
//! authentication scheme, and the tools an agent may call. Tool execution is a
//! tagged variant; only HTTP execution is performed by the gateway.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ProviderId;
use crate::core::identifiers::ToolId;

// ============================================================================
// SECTION: Provider Configuration
// ============================================================================

/// Static configuration for an integration provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationProviderConfig {
    /// Provider identifier.
    pub id: ProviderId,
    /// Human-readable provider name.
    pub name: String,
    /// Base URL prepended to every tool path.
    pub base_url: String,
    /// Authentication scheme applied to outbound requests.
    #[serde(default)]
    pub auth_method: AuthMethod,
    /// Tools exposed by this provider.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Provider-wide request limit.
    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,
}

impl IntegrationProviderConfig {
    /// Returns the tool definition for the given tool name.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.id.as_str() == name)
    }
}

/// Requests-per-minute limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSpec {
    /// Maximum requests allowed in a one-minute window.
    pub requests_per_minute: u32,
}

// ============================================================================
// SECTION: Authentication Methods
// ============================================================================

/// Authentication scheme for a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    /// Bearer token read from the `token` credential.
    BearerToken {
        /// Header receiving the token.
        #[serde(default = "default_authorization_header")]
        header_name: String,
        /// Prefix placed before the token.
        #[serde(default = "default_bearer_prefix")]
        prefix: String,
    },
    /// API key read from the `apiKey` credential.
    ApiKey {
        /// Where the key is placed on the request.
        placement: ApiKeyPlacement,
        /// Header, query, or body field name.
        param_name: String,
        /// Optional prefix placed before the key.
        #[serde(default)]
        prefix: String,
    },
    /// HTTP basic authentication.
    BasicAuth {
        /// Credential field holding the username.
        #[serde(default = "default_username_field")]
        username_field: String,
        /// Credential field holding the password.
        #[serde(default = "default_password_field")]
        password_field: String,
    },
    /// OAuth2 access token read from the `accessToken` credential.
    #[serde(rename = "oauth2")]
    OAuth2 {
        /// Where the token is placed on the request.
        #[serde(default)]
        token_placement: TokenPlacement,
        /// Prefix used for header placement.
        #[serde(default = "default_bearer_prefix")]
        token_prefix: String,
    },
    /// Arbitrary headers sourced from credentials or static values.
    CustomHeader {
        /// Header specifications in application order.
        headers: Vec<CustomHeaderSpec>,
    },
    /// No authentication.
    #[default]
    None,
}

impl AuthMethod {
    /// Returns the wire name of the auth method.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BearerToken { .. } => "bearer_token",
            Self::ApiKey { .. } => "api_key",
            Self::BasicAuth { .. } => "basic_auth",
            Self::OAuth2 { .. } => "oauth2",
            Self::CustomHeader { .. } => "custom_header",
            Self::None => "none",
        }
    }

    /// Returns true when the method reads connection credentials.
    #[must_use]
    pub const fn requires_credentials(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// API key placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyPlacement {
    /// Request header.
    Header,
    /// URL query parameter.
    Query,
    /// JSON or form body field.
    Body,
}

/// OAuth2 token placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenPlacement {
    /// `Authorization` header.
    #[default]
    Header,
    /// `access_token` query parameter.
    Query,
}

/// Custom header specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeaderSpec {
    /// Header name.
    pub name: String,
    /// Value source.
    #[serde(flatten)]
    pub source: HeaderValueSource,
}

/// Source for a custom header value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "value_from", rename_all = "snake_case")]
pub enum HeaderValueSource {
    /// Read from a credential field, falling back to a static value.
    Credential {
        /// Credential field name.
        credential_key: String,
        /// Fallback when the credential is absent.
        #[serde(default)]
        static_value: Option<String>,
    },
    /// Fixed value.
    Static {
        /// Header value.
        static_value: String,
    },
}

/// Default header name for bearer tokens.
fn default_authorization_header() -> String {
    "Authorization".to_string()
}

/// Default token prefix.
fn default_bearer_prefix() -> String {
    "Bearer ".to_string()
}

/// Default username credential field.
fn default_username_field() -> String {
    "username".to_string()
}

/// Default password credential field.
fn default_password_field() -> String {
    "password".to_string()
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool exposed by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool identifier; matches the requested tool name.
    pub id: ToolId,
    /// Tool description surfaced to agents.
    #[serde(default)]
    pub description: Option<String>,
    /// Access category used by read-only grants.
    #[serde(default)]
    pub category: ToolCategory,
    /// JSON Schema (2020-12) for tool input.
    #[serde(default)]
    pub input_schema: Option<Value>,
    /// Execution strategy.
    pub execution: ToolExecution,
    /// Output shaping applied to successful responses.
    #[serde(default)]
    pub output_transform: Option<OutputTransform>,
    /// Tool-specific request limit.
    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,
    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

/// Access category of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// Reads data without side effects.
    #[default]
    Read,
    /// Mutates remote state.
    Write,
    /// Administrative operations.
    Admin,
    /// Destructive or irreversible operations.
    Dangerous,
}

impl ToolCategory {
    /// Returns true for categories denied under read-only grants.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::Read)
    }

    /// Returns the wire name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Admin => "admin",
            Self::Dangerous => "dangerous",
        }
    }
}

/// Tool execution strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum ToolExecution {
    /// Templated HTTP request.
    Http(HttpExecutionConfig),
    /// GraphQL operation; not executed by the gateway.
    Graphql(Value),
    /// In-process function; not executed by the gateway.
    Function(Value),
    /// Multi-tool chain; not executed by the gateway.
    Chain(Value),
}

impl ToolExecution {
    /// Returns the wire name of the execution type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Graphql(_) => "graphql",
            Self::Function(_) => "function",
            Self::Chain(_) => "chain",
        }
    }
}

// ============================================================================
// SECTION: HTTP Execution
// ============================================================================

/// HTTP request template for a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpExecutionConfig {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template with `{name}` placeholders.
    pub path_template: String,
    /// Query parameter templates.
    #[serde(default)]
    pub query_params: BTreeMap<String, ParamValue>,
    /// Header templates.
    #[serde(default)]
    pub headers: BTreeMap<String, ParamValue>,
    /// Body template resolved against tool input.
    #[serde(default)]
    pub body_template: Option<Value>,
    /// Body encoding.
    #[serde(default)]
    pub body_encoding: BodyEncoding,
    /// Per-tool timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Supported HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// PATCH.
    Patch,
    /// DELETE.
    Delete,
    /// HEAD.
    Head,
}

impl HttpMethod {
    /// Returns the method token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }

    /// Returns true when the method carries a request body.
    #[must_use]
    pub const fn allows_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch | Self::Delete)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body encoding for templated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    /// `application/json`.
    #[default]
    Json,
    /// `application/x-www-form-urlencoded`.
    Form,
    /// `multipart/form-data`.
    Multipart,
}

/// Template value: an input reference or a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Reference to a tool input field.
    Ref(ParameterRef),
    /// Literal JSON value.
    Literal(Value),
}

/// Reference to a tool input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterRef {
    /// Input field name.
    #[serde(rename = "$param")]
    pub param: String,
    /// Transform applied to the resolved value.
    #[serde(default)]
    pub transform: Option<ParamTransform>,
    /// Fails the build when the field is missing and no default exists.
    #[serde(default)]
    pub required: bool,
    /// Value used when the field is missing.
    #[serde(default)]
    pub default: Option<Value>,
}

/// Transform applied to a referenced input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamTransform {
    /// Render as a string.
    String,
    /// Parse into a JSON number.
    Number,
    /// Parse into a JSON boolean.
    Boolean,
    /// Serialize to a JSON string.
    Json,
    /// Lowercase a string.
    Lowercase,
    /// Uppercase a string.
    Uppercase,
    /// Standard base64 of the string form.
    Base64,
    /// Join an array with commas.
    JoinComma,
    /// Trim surrounding whitespace.
    Trim,
}

// ============================================================================
// SECTION: Retry and Output
// ============================================================================

/// Retry policy for transient failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Base backoff in milliseconds, doubled per attempt.
    #[serde(default)]
    pub backoff_ms: u64,
    /// Status codes treated as transient.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
}

/// Default transient status codes.
fn default_retryable_statuses() -> Vec<u16> {
    vec![408, 429, 500, 502, 503, 504]
}

/// Output shaping for successful responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutputTransform {
    /// JSONPath selecting the result root.
    #[serde(default)]
    pub extract: Option<String>,
    /// Output field to JSONPath mapping applied to each result object.
    #[serde(default)]
    pub mapping: Option<BTreeMap<String, String>>,
    /// Maximum array length returned to the agent.
    #[serde(default)]
    pub max_array_items: Option<usize>,
}
