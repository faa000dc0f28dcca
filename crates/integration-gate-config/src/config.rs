// crates/integration-gate-config/src/config.rs
// ============================================================================
// Module: Integration Gate Configuration
// Description: Configuration loading and validation for the gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: integration-gate-core, integration-gate-http, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file is a valid configuration.
//! Invalid values fail closed; nothing is silently clamped at load time.
//!
//! Credential keys are never stored in the file. The `[credentials]` section
//! names the environment variable that carries the base64 key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use integration_gate_core::ChainId;
use integration_gate_core::ExecutorConfig;
use integration_gate_core::MissingGrantPolicy;
use integration_gate_core::runtime::EncryptionKey;
use integration_gate_core::runtime::RateLimitPolicy;
use integration_gate_core::runtime::rate_limit::DEFAULT_REQUESTS_PER_MINUTE;
use integration_gate_core::runtime::rate_limit::DEFAULT_WINDOW_MS;
use integration_gate_core::runtime::rate_limit::MAX_REQUESTS_PER_MINUTE;
use integration_gate_core::runtime::rate_limit::MIN_REQUESTS_PER_MINUTE;
use integration_gate_core::runtime::saga::DEFAULT_INPUT_SUMMARY_MAX_KEYS;
use integration_gate_core::runtime::saga::DEFAULT_MAX_BACKOFF_MS;
use integration_gate_core::runtime::saga::DEFAULT_MAX_TIMEOUT_MS;
use integration_gate_core::runtime::saga::DEFAULT_TIMEOUT_MS;
use integration_gate_core::runtime::store::DEFAULT_MAX_COUNTER_KEYS;
use integration_gate_http::HttpExecutorConfig;
use integration_gate_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "integration-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "INTEGRATION_GATE_CONFIG";
/// Default environment variable carrying the credential key.
pub const DEFAULT_CREDENTIAL_KEY_ENV: &str = "INTEGRATION_GATE_CREDENTIAL_KEY";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Minimum rate limit window in milliseconds.
const MIN_RATE_LIMIT_WINDOW_MS: u64 = 1_000;
/// Maximum rate limit window in milliseconds.
const MAX_RATE_LIMIT_WINDOW_MS: u64 = 3_600_000;
/// Maximum distinct counter keys.
const MAX_RATE_LIMIT_ENTRIES: usize = 1_048_576;
/// Maximum response body limit in bytes.
const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Maximum upstream timeout in milliseconds.
const MAX_TIMEOUT_LIMIT_MS: u64 = 600_000;
/// Maximum allowlisted hosts.
const MAX_ALLOWED_HOSTS: usize = 256;
/// Maximum host name length.
const MAX_HOST_LENGTH: usize = 253;
/// Maximum user agent length.
const MAX_USER_AGENT_LENGTH: usize = 256;
/// Maximum audit chain identifier length.
const MAX_CHAIN_ID_LENGTH: usize = 128;
/// Maximum quick check sample size.
const MAX_QUICK_CHECK_SAMPLE: usize = 10_000;
/// Maximum input keys recorded per audit summary.
const MAX_INPUT_SUMMARY_KEYS: usize = 1_024;
/// Maximum environment variable name length.
const MAX_ENV_NAME_LENGTH: usize = 128;
/// Default quick check sample size.
const DEFAULT_QUICK_CHECK_SAMPLE: usize = 10;
/// Default response body limit in bytes.
const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Default outbound user agent.
const DEFAULT_USER_AGENT: &str = "integration-gate/0.1";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Rate limit bounds and counter table size.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Authorization policy.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Outbound HTTP policy and timeouts.
    #[serde(default)]
    pub http: HttpConfig,
    /// Audit chain settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Credential key source.
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Optional durable store.
    #[serde(default)]
    pub store: Option<SqliteStoreConfig>,
}

impl GatewayConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from `path`, then `INTEGRATION_GATE_CONFIG`, then
    /// `integration-gate.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit.validate()?;
        self.http.validate()?;
        self.audit.validate()?;
        self.credentials.validate()?;
        if let Some(store) = &self.store {
            validate_store(store)?;
        }
        Ok(())
    }

    /// Builds executor settings from this configuration.
    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            missing_grant: self.policy.missing_grant,
            rate_limit: self.rate_limit.policy(),
            default_timeout_ms: self.http.default_timeout_ms,
            max_timeout_ms: self.http.max_timeout_ms,
            max_backoff_ms: self.http.max_backoff_ms,
            chain_id: self.audit.chain_id(),
            input_summary_max_keys: self.audit.input_summary_max_keys,
        }
    }

    /// Builds HTTP executor settings from this configuration.
    #[must_use]
    pub fn http_executor_config(&self) -> HttpExecutorConfig {
        HttpExecutorConfig {
            allow_http: self.http.allow_http,
            max_response_bytes: self.http.max_response_bytes,
            allowed_hosts: self.http.allowed_hosts.clone(),
            user_agent: self.http.user_agent.clone(),
        }
    }

    /// Returns the durable store settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when no `[store]` section is present.
    pub fn store_config(&self) -> Result<&SqliteStoreConfig, ConfigError> {
        self.store
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("store section is not configured".to_string()))
    }

    /// Loads the credential key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the variable is unset or does not
    /// hold a base64 encoded 32-byte key.
    pub fn load_credential_key(&self) -> Result<EncryptionKey, ConfigError> {
        self.credentials.load_key_with(|name| env::var(name).ok())
    }
}

/// Rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Limit applied when no level configures one.
    #[serde(default = "default_requests_per_minute")]
    pub default_requests_per_minute: u32,
    /// Lower clamp for effective limits.
    #[serde(default = "default_min_requests_per_minute")]
    pub min_requests_per_minute: u32,
    /// Upper clamp for effective limits.
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,
    /// Window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Maximum distinct keys held by the in-memory counter store.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            min_requests_per_minute: MIN_REQUESTS_PER_MINUTE,
            max_requests_per_minute: MAX_REQUESTS_PER_MINUTE,
            window_ms: DEFAULT_WINDOW_MS,
            max_entries: DEFAULT_MAX_COUNTER_KEYS,
        }
    }
}

impl RateLimitConfig {
    /// Returns the limiter policy for these settings.
    #[must_use]
    pub const fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            default_requests_per_minute: self.default_requests_per_minute,
            min_requests_per_minute: self.min_requests_per_minute,
            max_requests_per_minute: self.max_requests_per_minute,
            window_ms: self.window_ms,
        }
    }

    /// Validates rate limit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_requests_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit min_requests_per_minute must be greater than zero".to_string(),
            ));
        }
        if self.max_requests_per_minute > MAX_REQUESTS_PER_MINUTE {
            return Err(ConfigError::Invalid(format!(
                "rate_limit max_requests_per_minute must be at most {MAX_REQUESTS_PER_MINUTE}"
            )));
        }
        if self.min_requests_per_minute > self.max_requests_per_minute {
            return Err(ConfigError::Invalid(
                "rate_limit min_requests_per_minute exceeds max_requests_per_minute".to_string(),
            ));
        }
        if self.default_requests_per_minute < self.min_requests_per_minute
            || self.default_requests_per_minute > self.max_requests_per_minute
        {
            return Err(ConfigError::Invalid(
                "rate_limit default_requests_per_minute must lie within min and max".to_string(),
            ));
        }
        if self.window_ms < MIN_RATE_LIMIT_WINDOW_MS || self.window_ms > MAX_RATE_LIMIT_WINDOW_MS
        {
            return Err(ConfigError::Invalid(format!(
                "rate_limit window_ms must be between {MIN_RATE_LIMIT_WINDOW_MS} and \
                 {MAX_RATE_LIMIT_WINDOW_MS}",
            )));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit max_entries must be greater than zero".to_string(),
            ));
        }
        if self.max_entries > MAX_RATE_LIMIT_ENTRIES {
            return Err(ConfigError::Invalid("rate_limit max_entries too large".to_string()));
        }
        Ok(())
    }
}

/// Authorization policy configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Behavior when an agent has no grant on a connection.
    #[serde(default)]
    pub missing_grant: MissingGrantPolicy,
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Allow cleartext HTTP upstreams.
    #[serde(default)]
    pub allow_http: bool,
    /// Optional host allowlist.
    #[serde(default)]
    pub allowed_hosts: Option<BTreeSet<String>>,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Timeout when neither tool nor connection sets one.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Upper bound on any timeout.
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
    /// Upper bound on a single retry backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Outbound user agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            allowed_hosts: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpConfig {
    /// Validates HTTP settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "http max_response_bytes must be between 1 and {MAX_RESPONSE_BYTES_LIMIT}"
            )));
        }
        if self.max_timeout_ms == 0 || self.max_timeout_ms > MAX_TIMEOUT_LIMIT_MS {
            return Err(ConfigError::Invalid(format!(
                "http max_timeout_ms must be between 1 and {MAX_TIMEOUT_LIMIT_MS}"
            )));
        }
        if self.default_timeout_ms == 0 || self.default_timeout_ms > self.max_timeout_ms {
            return Err(ConfigError::Invalid(
                "http default_timeout_ms must be between 1 and max_timeout_ms".to_string(),
            ));
        }
        if self.max_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "http max_backoff_ms must be greater than zero".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() || self.user_agent.len() > MAX_USER_AGENT_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "http user_agent must be non-empty and at most {MAX_USER_AGENT_LENGTH} bytes"
            )));
        }
        if let Some(hosts) = &self.allowed_hosts {
            if hosts.len() > MAX_ALLOWED_HOSTS {
                return Err(ConfigError::Invalid("http allowed_hosts has too many entries".to_string()));
            }
            for host in hosts {
                validate_host(host)?;
            }
        }
        Ok(())
    }
}

/// Audit chain configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Chain written by the executor and read by verification.
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    /// Entries sampled by the quick integrity check.
    #[serde(default = "default_quick_check_sample")]
    pub quick_check_sample: usize,
    /// Input keys recorded per audit summary.
    #[serde(default = "default_input_summary_max_keys")]
    pub input_summary_max_keys: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            quick_check_sample: DEFAULT_QUICK_CHECK_SAMPLE,
            input_summary_max_keys: DEFAULT_INPUT_SUMMARY_MAX_KEYS,
        }
    }
}

impl AuditConfig {
    /// Returns the configured chain identifier.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        ChainId::new(self.chain_id.clone())
    }

    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let chain_id = self.chain_id.trim();
        if chain_id.is_empty() || chain_id.len() > MAX_CHAIN_ID_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "audit chain_id must be non-empty and at most {MAX_CHAIN_ID_LENGTH} bytes"
            )));
        }
        if chain_id != self.chain_id {
            return Err(ConfigError::Invalid(
                "audit chain_id must not have surrounding whitespace".to_string(),
            ));
        }
        if self.quick_check_sample == 0 || self.quick_check_sample > MAX_QUICK_CHECK_SAMPLE {
            return Err(ConfigError::Invalid(format!(
                "audit quick_check_sample must be between 1 and {MAX_QUICK_CHECK_SAMPLE}"
            )));
        }
        if self.input_summary_max_keys == 0 || self.input_summary_max_keys > MAX_INPUT_SUMMARY_KEYS
        {
            return Err(ConfigError::Invalid(format!(
                "audit input_summary_max_keys must be between 1 and {MAX_INPUT_SUMMARY_KEYS}"
            )));
        }
        Ok(())
    }
}

/// Credential key source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Environment variable holding the base64 encoded key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            key_env: default_key_env(),
        }
    }
}

impl CredentialsConfig {
    /// Resolves the key through a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the variable is unset or invalid.
    pub fn load_key_with(
        &self,
        lookup: impl FnOnce(&str) -> Option<String>,
    ) -> Result<EncryptionKey, ConfigError> {
        let encoded = lookup(&self.key_env).ok_or_else(|| {
            ConfigError::Invalid(format!("credential key variable {} is not set", self.key_env))
        })?;
        EncryptionKey::from_base64(&encoded).map_err(|err| {
            ConfigError::Invalid(format!("credential key in {}: {err}", self.key_env))
        })
    }

    /// Validates the variable name.
    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.key_env.as_str();
        let valid = !name.is_empty()
            && name.len() <= MAX_ENV_NAME_LENGTH
            && !name.starts_with(|ch: char| ch.is_ascii_digit())
            && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !valid {
            return Err(ConfigError::Invalid(
                "credentials key_env must be a valid environment variable name".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates a path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates the `[store]` section.
fn validate_store(store: &SqliteStoreConfig) -> Result<(), ConfigError> {
    if store.path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("store path must be non-empty".to_string()));
    }
    validate_path(&store.path)
        .map_err(|err| ConfigError::Invalid(format!("store path: {err}")))?;
    if store.busy_timeout_ms > MAX_TIMEOUT_LIMIT_MS {
        return Err(ConfigError::Invalid(format!(
            "store busy_timeout_ms must be at most {MAX_TIMEOUT_LIMIT_MS}"
        )));
    }
    Ok(())
}

/// Validates an allowlisted host name.
fn validate_host(host: &str) -> Result<(), ConfigError> {
    let valid = !host.is_empty()
        && host.len() <= MAX_HOST_LENGTH
        && host == host.to_ascii_lowercase()
        && !host.contains(|ch: char| ch.is_whitespace() || matches!(ch, '/' | '@' | '?' | '#'));
    if !valid {
        return Err(ConfigError::Invalid(format!(
            "http allowed_hosts entry is not a lowercase host name: {host}"
        )));
    }
    Ok(())
}

/// Default limit when no level configures one.
const fn default_requests_per_minute() -> u32 {
    DEFAULT_REQUESTS_PER_MINUTE
}

/// Default lower clamp.
const fn default_min_requests_per_minute() -> u32 {
    MIN_REQUESTS_PER_MINUTE
}

/// Default upper clamp.
const fn default_max_requests_per_minute() -> u32 {
    MAX_REQUESTS_PER_MINUTE
}

/// Default window length.
const fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

/// Default counter key bound.
const fn default_max_entries() -> usize {
    DEFAULT_MAX_COUNTER_KEYS
}

/// Default response limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default upstream timeout.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Default timeout ceiling.
const fn default_max_timeout_ms() -> u64 {
    DEFAULT_MAX_TIMEOUT_MS
}

/// Default backoff ceiling.
const fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

/// Default user agent.
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// Default audit chain.
fn default_chain_id() -> String {
    ChainId::default().as_str().to_string()
}

/// Default quick check sample.
const fn default_quick_check_sample() -> usize {
    DEFAULT_QUICK_CHECK_SAMPLE
}

/// Default summary key count.
const fn default_input_summary_max_keys() -> usize {
    DEFAULT_INPUT_SUMMARY_MAX_KEYS
}

/// Default credential key variable.
fn default_key_env() -> String {
    DEFAULT_CREDENTIAL_KEY_ENV.to_string()
}
