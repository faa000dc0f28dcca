// crates/integration-gate-core/src/runtime/saga.rs
// ============================================================================
// Module: Tool Execution Saga
// Description: Orchestrates a gated tool invocation end to end.
// Purpose: Compose validation, limiting, credentials, transport, and audit.
// Dependencies: jsonschema, serde_json, tokio, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! A tool call moves through fixed stages: load connection, check status,
//! resolve tool, authorize, rate limit, decrypt credentials, build request,
//! apply auth, execute, transform output, complete. Any failing stage
//! short-circuits the rest.
//!
//! Invariants:
//! - Every invocation returns a [`ToolCallResult`]; nothing escapes as an error.
//! - Every invocation that finds its connection writes exactly one audit entry.
//! - Authorization and rate limiting run before credentials are decrypted or
//!   any request is built.
//! - Audit write failures are reported to telemetry and never change the result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use jsonschema::Draft;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::AuditErrorCode;
use crate::core::AuditRecord;
use crate::core::ChainId;
use crate::core::ConnectionStatus;
use crate::core::ErrorType;
use crate::core::HttpExecutionConfig;
use crate::core::LoadedConnection;
use crate::core::RetryPolicy;
use crate::core::ToolCallRequest;
use crate::core::ToolCallResult;
use crate::core::ToolDefinition;
use crate::core::ToolExecution;
use crate::core::ToolGrant;
use crate::interfaces::AuditStore;
use crate::interfaces::Clock;
use crate::interfaces::ConnectionLoader;
use crate::interfaces::CounterStore;
use crate::interfaces::CredentialCodec;
use crate::interfaces::Credentials;
use crate::interfaces::GrantStore;
use crate::interfaces::HttpExecutionError;
use crate::interfaces::HttpExecutor;
use crate::interfaces::HttpRequest;
use crate::interfaces::HttpResponse;
use crate::runtime::audit_log::AuditLogger;
use crate::runtime::audit_log::summarize_input;
use crate::runtime::auth::apply_auth;
use crate::runtime::auth::body_auth_fields;
use crate::runtime::rate_limit::IntegrationRateLimiter;
use crate::runtime::rate_limit::LimitLevels;
use crate::runtime::rate_limit::RateLimitCheck;
use crate::runtime::rate_limit::RateLimitPolicy;
use crate::runtime::rate_limit::RateLimitScope;
use crate::runtime::request::apply_auth_material;
use crate::runtime::request::build_request;
use crate::runtime::telemetry::AuditFailureEvent;
use crate::runtime::telemetry::GatewayTelemetry;
use crate::runtime::telemetry::SagaEvent;
use crate::runtime::telemetry::SagaStage;
use crate::runtime::transform::transform_output;
use crate::runtime::validator::ToolAccessContext;
use crate::runtime::validator::ToolAccessDecision;
use crate::runtime::validator::is_tool_allowed;
use crate::runtime::verifier::HashChainVerifier;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default upstream timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Upper bound on any configured upstream timeout in milliseconds.
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 120_000;
/// Upper bound on a single retry backoff in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
/// Default number of input keys recorded in audit summaries.
pub const DEFAULT_INPUT_SUMMARY_MAX_KEYS: usize = 32;

/// Behavior when no grant exists for an agent on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingGrantPolicy {
    /// Reject the call.
    #[default]
    Deny,
    /// Treat the call as unrestricted.
    AllowAll,
}

/// Executor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Behavior for absent grants.
    pub missing_grant: MissingGrantPolicy,
    /// Rate limit bounds.
    pub rate_limit: RateLimitPolicy,
    /// Timeout when neither tool nor connection sets one.
    pub default_timeout_ms: u64,
    /// Upper bound on any timeout.
    pub max_timeout_ms: u64,
    /// Upper bound on a single retry backoff.
    pub max_backoff_ms: u64,
    /// Audit chain written to.
    pub chain_id: ChainId,
    /// Input keys recorded in audit summaries.
    pub input_summary_max_keys: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            missing_grant: MissingGrantPolicy::Deny,
            rate_limit: RateLimitPolicy::default(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            chain_id: ChainId::default(),
            input_summary_max_keys: DEFAULT_INPUT_SUMMARY_MAX_KEYS,
        }
    }
}

/// Dependencies injected into the executor.
#[derive(Clone)]
pub struct ToolExecutorDeps {
    /// Connection and provider registry.
    pub connections: Arc<dyn ConnectionLoader>,
    /// Grant registry.
    pub grants: Arc<dyn GrantStore>,
    /// Credential decryption.
    pub credentials: Arc<dyn CredentialCodec>,
    /// Outbound transport.
    pub http: Arc<dyn HttpExecutor>,
    /// Rate limit counters.
    pub counters: Arc<dyn CounterStore>,
    /// Audit storage.
    pub audit_store: Arc<dyn AuditStore>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Telemetry sink.
    pub telemetry: Arc<dyn GatewayTelemetry>,
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Gated tool executor.
pub struct ToolExecutor {
    /// Injected dependencies.
    deps: ToolExecutorDeps,
    /// Executor settings.
    config: ExecutorConfig,
    /// Rate limiter over the injected counters.
    limiter: IntegrationRateLimiter,
    /// Audit logger over the injected store.
    logger: AuditLogger,
}

/// Creates a tool executor from its dependencies.
#[must_use]
pub fn create_tool_executor(deps: ToolExecutorDeps, config: ExecutorConfig) -> ToolExecutor {
    let limiter =
        IntegrationRateLimiter::new(Arc::clone(&deps.counters), Arc::clone(&deps.clock), config.rate_limit);
    let logger = AuditLogger::new(Arc::clone(&deps.audit_store), config.chain_id.clone())
        .with_clock(Arc::clone(&deps.clock));
    ToolExecutor { deps, config, limiter, logger }
}

/// Failed stage outcome.
struct StageFailure {
    /// Stage that failed.
    stage: SagaStage,
    /// Caller-facing classification.
    error_type: ErrorType,
    /// Audit code.
    code: AuditErrorCode,
    /// Failure message.
    message: String,
    /// Upstream status, when a response was received.
    status_code: Option<u16>,
    /// Retry hint in seconds.
    retry_after_secs: Option<u64>,
}

impl StageFailure {
    /// Builds a failure without status or retry hint.
    fn new(
        stage: SagaStage,
        error_type: ErrorType,
        code: AuditErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self { stage, error_type, code, message: message.into(), status_code: None, retry_after_secs: None }
    }
}

/// Successful pipeline outcome.
struct StageSuccess {
    /// Transformed payload.
    data: Value,
    /// Upstream status.
    status_code: u16,
}

impl ToolExecutor {
    /// Returns the executor settings.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Returns the rate limiter.
    #[must_use]
    pub const fn rate_limiter(&self) -> &IntegrationRateLimiter {
        &self.limiter
    }

    /// Returns the audit logger.
    #[must_use]
    pub const fn audit_logger(&self) -> &AuditLogger {
        &self.logger
    }

    /// Returns a verifier for the executor's audit chain.
    #[must_use]
    pub fn verifier(&self) -> HashChainVerifier {
        HashChainVerifier::new(
            Arc::clone(&self.deps.audit_store),
            self.config.chain_id.clone(),
            Arc::clone(&self.deps.clock),
        )
    }

    /// Executes a tool call through every gate and records its audit entry.
    #[must_use]
    pub fn execute_tool_saga(&self, request: &ToolCallRequest) -> ToolCallResult {
        let started = Instant::now();

        let loaded = match self.deps.connections.load_connection(&request.connection_id) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => {
                return self.finish_unaudited(
                    request,
                    started,
                    ErrorType::Validation,
                    format!("Connection not found: {}", request.connection_id),
                );
            }
            Err(err) => {
                return self.finish_unaudited(
                    request,
                    started,
                    ErrorType::Internal,
                    format!("Connection lookup failed: {err}"),
                );
            }
        };

        let mut attempts = 0_u32;
        let outcome = self.run_stages(request, &loaded, &mut attempts);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        // Restamped by the logger when the entry is linked.
        let timestamp_ms = self.deps.clock.now_ms();

        let (record, result, stage) = match outcome {
            Ok(success) => (
                AuditRecord {
                    timestamp_ms,
                    drive_id: request.drive_id.clone(),
                    agent_id: request.agent_id.clone(),
                    user_id: request.user_id.clone(),
                    connection_id: request.connection_id.clone(),
                    tool_name: request.tool_name.clone(),
                    input_summary: summarize_input(&request.input, self.config.input_summary_max_keys),
                    success: true,
                    response_code: Some(success.status_code),
                    error_code: None,
                    error_message: None,
                    duration_ms,
                    attempts,
                },
                ToolCallResult::ok(success.data, success.status_code),
                SagaStage::Complete,
            ),
            Err(failure) => {
                let record = AuditRecord {
                    timestamp_ms,
                    drive_id: request.drive_id.clone(),
                    agent_id: request.agent_id.clone(),
                    user_id: request.user_id.clone(),
                    connection_id: request.connection_id.clone(),
                    tool_name: request.tool_name.clone(),
                    input_summary: summarize_input(&request.input, self.config.input_summary_max_keys),
                    success: false,
                    response_code: failure.status_code,
                    error_code: Some(failure.code),
                    error_message: Some(failure.message.clone()),
                    duration_ms,
                    attempts,
                };
                let mut result = ToolCallResult::failure(failure.error_type, failure.message);
                result.retry_after_secs = failure.retry_after_secs;
                result.status_code = failure.status_code;
                (record, result, failure.stage)
            }
        };

        let error_code = record.error_code;
        let audited = match self.logger.append_log(record) {
            Ok(_) => true,
            Err(err) => {
                self.deps.telemetry.record_audit_failure(&AuditFailureEvent {
                    chain_id: self.config.chain_id.clone(),
                    connection_id: request.connection_id.clone(),
                    tool_name: request.tool_name.clone(),
                    error: err.to_string(),
                });
                false
            }
        };
        self.deps.telemetry.record_call(
            &SagaEvent {
                connection_id: request.connection_id.clone(),
                agent_id: request.agent_id.clone(),
                tool_name: request.tool_name.clone(),
                stage,
                error_type: result.error_type,
                error_code,
                status_code: result.status_code,
                attempts,
                audited,
            },
            started.elapsed(),
        );
        result
    }

    /// Executes a tool call on the blocking pool.
    ///
    /// The call runs to completion and writes its audit entry even if the
    /// returned future is dropped.
    pub async fn execute_async(self: &Arc<Self>, request: ToolCallRequest) -> ToolCallResult {
        let executor = Arc::clone(self);
        match tokio::task::spawn_blocking(move || executor.execute_tool_saga(&request)).await {
            Ok(result) => result,
            Err(err) => ToolCallResult::failure(
                ErrorType::Internal,
                format!("tool execution task failed: {err}"),
            ),
        }
    }

    /// Reports an invocation that never found its connection.
    fn finish_unaudited(
        &self,
        request: &ToolCallRequest,
        started: Instant,
        error_type: ErrorType,
        message: String,
    ) -> ToolCallResult {
        self.deps.telemetry.record_call(
            &SagaEvent {
                connection_id: request.connection_id.clone(),
                agent_id: request.agent_id.clone(),
                tool_name: request.tool_name.clone(),
                stage: SagaStage::LoadConnection,
                error_type: Some(error_type),
                error_code: None,
                status_code: None,
                attempts: 0,
                audited: false,
            },
            started.elapsed(),
        );
        ToolCallResult::failure(error_type, message)
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    /// Runs stages two through ten.
    fn run_stages(
        &self,
        request: &ToolCallRequest,
        loaded: &LoadedConnection,
        attempts: &mut u32,
    ) -> Result<StageSuccess, StageFailure> {
        let connection = &loaded.connection;
        let provider = &loaded.provider;

        if connection.status != ConnectionStatus::Active {
            return Err(StageFailure::new(
                SagaStage::CheckStatus,
                ErrorType::Validation,
                AuditErrorCode::IntegrationInactive,
                format!("Integration is {}", connection.status),
            ));
        }

        let tool = provider.tool(&request.tool_name).ok_or_else(|| {
            StageFailure::new(
                SagaStage::ResolveTool,
                ErrorType::Validation,
                AuditErrorCode::ToolNotFound,
                format!("Tool not found: {}", request.tool_name),
            )
        })?;
        let ToolExecution::Http(http_config) = &tool.execution else {
            return Err(StageFailure::new(
                SagaStage::ResolveTool,
                ErrorType::Validation,
                AuditErrorCode::UnsupportedExecution,
                format!("Execution type {} is not supported", tool.execution.kind()),
            ));
        };

        let grant = self.resolve_grant(request)?;
        let decision =
            is_tool_allowed(&request.tool_name, &ToolAccessContext { grant: &grant, provider });
        if let ToolAccessDecision::Denied { reason } = decision {
            return Err(StageFailure::new(
                SagaStage::Authorize,
                ErrorType::Validation,
                AuditErrorCode::ToolNotAllowed,
                reason,
            ));
        }

        let levels = LimitLevels {
            provider: provider.rate_limit,
            connection: connection.config_overrides.rate_limit,
            grant: grant.rate_limit_override,
            tool: tool.rate_limit,
        };
        self.check_rate_limits(request, &levels)?;

        validate_input(tool, &request.input)?;

        let credentials = self.decrypt_credentials(loaded)?;

        let body_fields = body_auth_fields(&credentials, &provider.auth_method);
        let mut http_request =
            build_request(http_config, &request.input, loaded.base_url(), &body_fields).map_err(
                |err| {
                    StageFailure::new(
                        SagaStage::BuildRequest,
                        ErrorType::Validation,
                        AuditErrorCode::ValidationFailed,
                        err.to_string(),
                    )
                },
            )?;

        apply_auth_material(&mut http_request, apply_auth(&credentials, &provider.auth_method));

        let timeout = self.resolve_timeout(http_config, loaded);
        let response = self.execute_with_retry(&http_request, tool.retry.as_ref(), timeout, attempts)?;
        let body = parse_response_body(&response)?;

        let data = transform_output(&body, tool.output_transform.as_ref()).map_err(|err| {
            StageFailure::new(
                SagaStage::TransformOutput,
                ErrorType::Internal,
                AuditErrorCode::InternalError,
                format!("Output transform failed: {err}"),
            )
        })?;
        Ok(StageSuccess { data, status_code: response.status })
    }

    /// Resolves the grant from the request snapshot or the grant store.
    fn resolve_grant(&self, request: &ToolCallRequest) -> Result<ToolGrant, StageFailure> {
        if let Some(grant) = &request.grant {
            return Ok(grant.clone());
        }
        let stored = self
            .deps
            .grants
            .load_grant(request.agent_id.as_ref(), &request.connection_id)
            .map_err(|err| {
                StageFailure::new(
                    SagaStage::Authorize,
                    ErrorType::Internal,
                    AuditErrorCode::InternalError,
                    format!("Grant lookup failed: {err}"),
                )
            })?;
        match (stored, self.config.missing_grant) {
            (Some(grant), _) => Ok(grant),
            (None, MissingGrantPolicy::AllowAll) => Ok(ToolGrant::unrestricted()),
            (None, MissingGrantPolicy::Deny) => Err(StageFailure::new(
                SagaStage::Authorize,
                ErrorType::Validation,
                AuditErrorCode::ToolNotAllowed,
                "No grant authorizes this agent on the connection",
            )),
        }
    }

    /// Checks provider-scope then tool-scope limits.
    fn check_rate_limits(
        &self,
        request: &ToolCallRequest,
        levels: &LimitLevels,
    ) -> Result<(), StageFailure> {
        let policy = self.limiter.policy();
        let mut checks = Vec::with_capacity(2);
        if let Some(limit) = levels.provider_limit(policy) {
            checks.push((RateLimitScope::Provider, limit));
        }
        checks.push((RateLimitScope::Tool(&request.tool_name), levels.tool_limit(policy)));

        for (scope, requests_per_minute) in checks {
            let decision = self
                .limiter
                .check_integration_rate_limit(&RateLimitCheck {
                    connection_id: &request.connection_id,
                    agent_id: request.agent_id.as_ref(),
                    scope,
                    requests_per_minute,
                })
                .map_err(|err| {
                    StageFailure::new(
                        SagaStage::RateLimit,
                        ErrorType::Internal,
                        AuditErrorCode::InternalError,
                        format!("Rate limit check failed: {err}"),
                    )
                })?;
            if !decision.allowed {
                let mut failure = StageFailure::new(
                    SagaStage::RateLimit,
                    ErrorType::RateLimit,
                    AuditErrorCode::RateLimited,
                    format!("Rate limit of {} requests per minute exceeded", decision.limit),
                );
                failure.retry_after_secs = decision.retry_after_secs;
                return Err(failure);
            }
        }
        Ok(())
    }

    /// Decrypts connection credentials when the auth method reads them.
    fn decrypt_credentials(&self, loaded: &LoadedConnection) -> Result<Credentials, StageFailure> {
        if !loaded.provider.auth_method.requires_credentials() {
            return Ok(Credentials::default());
        }
        let Some(sealed) = loaded.connection.credentials.as_deref() else {
            return Ok(Credentials::default());
        };
        self.deps.credentials.decrypt(sealed).map_err(|err| {
            StageFailure::new(
                SagaStage::DecryptCredentials,
                ErrorType::Internal,
                AuditErrorCode::CredentialError,
                format!("Failed to decrypt connection credentials: {err}"),
            )
        })
    }

    /// Resolves the upstream timeout.
    fn resolve_timeout(&self, config: &HttpExecutionConfig, loaded: &LoadedConnection) -> Duration {
        let millis = config
            .timeout_ms
            .or(loaded.connection.config_overrides.timeout_ms)
            .unwrap_or(self.config.default_timeout_ms)
            .clamp(1, self.config.max_timeout_ms.max(1));
        Duration::from_millis(millis)
    }

    /// Executes the request, retrying transient failures per policy.
    fn execute_with_retry(
        &self,
        request: &HttpRequest,
        retry: Option<&RetryPolicy>,
        timeout: Duration,
        attempts: &mut u32,
    ) -> Result<HttpResponse, StageFailure> {
        let max_attempts = retry.map_or(1, |policy| policy.max_attempts.max(1));
        loop {
            *attempts += 1;
            let attempts_left = *attempts < max_attempts;
            let failure = match self.deps.http.execute(request, timeout) {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => {
                    let retryable = retry
                        .is_some_and(|policy| policy.retryable_statuses.contains(&response.status));
                    let mut failure = StageFailure::new(
                        SagaStage::Execute,
                        ErrorType::Http,
                        AuditErrorCode::HttpError,
                        format!("Upstream returned HTTP {}", response.status),
                    );
                    failure.status_code = Some(response.status);
                    if !retryable {
                        return Err(failure);
                    }
                    failure
                }
                Err(HttpExecutionError::Timeout(message)) => StageFailure::new(
                    SagaStage::Execute,
                    ErrorType::Timeout,
                    AuditErrorCode::Timeout,
                    format!("Request timed out: {message}"),
                ),
                Err(HttpExecutionError::Network(message)) => StageFailure::new(
                    SagaStage::Execute,
                    ErrorType::Network,
                    AuditErrorCode::NetworkError,
                    format!("Network error: {message}"),
                ),
                Err(HttpExecutionError::Blocked(message)) => {
                    return Err(StageFailure::new(
                        SagaStage::Execute,
                        ErrorType::Validation,
                        AuditErrorCode::ValidationFailed,
                        format!("Request blocked: {message}"),
                    ));
                }
                Err(HttpExecutionError::InvalidResponse { status, message }) => {
                    let mut failure = StageFailure::new(
                        SagaStage::Execute,
                        ErrorType::Http,
                        AuditErrorCode::HttpError,
                        format!("Invalid upstream response: {message}"),
                    );
                    failure.status_code = status;
                    return Err(failure);
                }
            };
            if !attempts_left {
                return Err(failure);
            }
            self.backoff(retry, *attempts);
        }
    }

    /// Sleeps before the next attempt with exponential backoff.
    fn backoff(&self, retry: Option<&RetryPolicy>, attempt: u32) {
        let base = retry.map_or(0, |policy| policy.backoff_ms);
        if base == 0 {
            return;
        }
        let factor = 1_u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let delay = base.saturating_mul(factor).min(self.config.max_backoff_ms);
        std::thread::sleep(Duration::from_millis(delay));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Validates tool input against the declared JSON Schema.
fn validate_input(tool: &ToolDefinition, input: &Value) -> Result<(), StageFailure> {
    let Some(schema) = &tool.input_schema else {
        return Ok(());
    };
    let validator = jsonschema::options().with_draft(Draft::Draft202012).build(schema).map_err(
        |err| {
            StageFailure::new(
                SagaStage::BuildRequest,
                ErrorType::Internal,
                AuditErrorCode::InternalError,
                format!("Tool input schema is invalid: {err}"),
            )
        },
    )?;
    let errors: Vec<String> = validator.iter_errors(input).map(|err| err.to_string()).collect();
    if errors.is_empty() {
        return Ok(());
    }
    Err(StageFailure::new(
        SagaStage::BuildRequest,
        ErrorType::Validation,
        AuditErrorCode::ValidationFailed,
        format!("Input validation failed: {}", errors.join("; ")),
    ))
}

/// Parses a response body as JSON, falling back to text for non-JSON types.
fn parse_response_body(response: &HttpResponse) -> Result<Value, StageFailure> {
    if response.body.is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(&response.body) {
        Ok(value) => Ok(value),
        Err(err) if response.content_type().is_some_and(|kind| kind.contains("json")) => {
            let mut failure = StageFailure::new(
                SagaStage::Execute,
                ErrorType::Http,
                AuditErrorCode::HttpError,
                format!("Malformed JSON response: {err}"),
            );
            failure.status_code = Some(response.status);
            Err(failure)
        }
        Err(_) => Ok(Value::String(String::from_utf8_lossy(&response.body).into_owned())),
    }
}
