// crates/integration-gate-core/src/runtime/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Observability hooks for tool invocations and audit writes.
// Purpose: Report saga outcomes and audit failures without hard deps.
// Dependencies: tracing, crate::core
// ============================================================================

//! ## Overview
//! The saga reports each invocation's terminal stage and latency through
//! [`GatewayTelemetry`]. Audit-write failures are reported here as well; this
//! is the fallback channel when the audit store is unavailable.
//! Events carry identifiers and classifications only, never tool input,
//! credentials, or response bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use crate::core::AgentId;
use crate::core::AuditErrorCode;
use crate::core::ChainId;
use crate::core::ConnectionId;
use crate::core::ErrorType;

// ============================================================================
// SECTION: Stages
// ============================================================================

/// Saga pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SagaStage {
    /// Connection and provider lookup.
    LoadConnection,
    /// Connection status check.
    CheckStatus,
    /// Tool definition lookup.
    ResolveTool,
    /// Grant evaluation.
    Authorize,
    /// Rate limit check.
    RateLimit,
    /// Credential decryption.
    DecryptCredentials,
    /// Template expansion and input validation.
    BuildRequest,
    /// Authentication layering.
    ApplyAuth,
    /// Upstream call with retries.
    Execute,
    /// Output shaping.
    TransformOutput,
    /// Successful completion.
    Complete,
}

impl SagaStage {
    /// Returns a stable label for the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoadConnection => "load_connection",
            Self::CheckStatus => "check_status",
            Self::ResolveTool => "resolve_tool",
            Self::Authorize => "authorize",
            Self::RateLimit => "rate_limit",
            Self::DecryptCredentials => "decrypt_credentials",
            Self::BuildRequest => "build_request",
            Self::ApplyAuth => "apply_auth",
            Self::Execute => "execute",
            Self::TransformOutput => "transform_output",
            Self::Complete => "complete",
        }
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Terminal outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaEvent {
    /// Connection called through.
    pub connection_id: ConnectionId,
    /// Calling agent.
    pub agent_id: Option<AgentId>,
    /// Tool requested.
    pub tool_name: String,
    /// Stage the invocation ended at.
    pub stage: SagaStage,
    /// Failure classification, when failed.
    pub error_type: Option<ErrorType>,
    /// Audit code, when failed.
    pub error_code: Option<AuditErrorCode>,
    /// Upstream status code.
    pub status_code: Option<u16>,
    /// Upstream attempts made.
    pub attempts: u32,
    /// True when an audit entry was written.
    pub audited: bool,
}

impl SagaEvent {
    /// Returns true when the invocation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error_type.is_none()
    }
}

/// Audit append failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFailureEvent {
    /// Chain that rejected the append.
    pub chain_id: ChainId,
    /// Connection of the invocation.
    pub connection_id: ConnectionId,
    /// Tool of the invocation.
    pub tool_name: String,
    /// Failure detail.
    pub error: String,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Telemetry sink for the execution pipeline.
pub trait GatewayTelemetry: Send + Sync {
    /// Records the terminal outcome of an invocation.
    fn record_call(&self, event: &SagaEvent, latency: Duration);
    /// Records an audit append failure.
    fn record_audit_failure(&self, event: &AuditFailureEvent);
}

/// No-op telemetry sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl GatewayTelemetry for NoopTelemetry {
    fn record_call(&self, _event: &SagaEvent, _latency: Duration) {}

    fn record_audit_failure(&self, _event: &AuditFailureEvent) {}
}

/// Telemetry sink emitting structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl GatewayTelemetry for TracingTelemetry {
    fn record_call(&self, event: &SagaEvent, latency: Duration) {
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        let agent = event.agent_id.as_ref().map_or("global", AgentId::as_str);
        if event.is_success() {
            tracing::info!(
                target: "integration_gate::saga",
                connection_id = %event.connection_id,
                agent_id = agent,
                tool = %event.tool_name,
                stage = event.stage.as_str(),
                status_code = event.status_code,
                attempts = event.attempts,
                latency_ms,
                "tool call completed"
            );
        } else {
            tracing::warn!(
                target: "integration_gate::saga",
                connection_id = %event.connection_id,
                agent_id = agent,
                tool = %event.tool_name,
                stage = event.stage.as_str(),
                error_type = event.error_type.map(ErrorType::as_str),
                error_code = event.error_code.map(AuditErrorCode::as_str),
                status_code = event.status_code,
                attempts = event.attempts,
                audited = event.audited,
                latency_ms,
                "tool call failed"
            );
        }
    }

    fn record_audit_failure(&self, event: &AuditFailureEvent) {
        tracing::error!(
            target: "integration_gate::audit",
            chain_id = %event.chain_id,
            connection_id = %event.connection_id,
            tool = %event.tool_name,
            error = %event.error,
            "audit append failed"
        );
    }
}
