// crates/integration-gate-core/src/core/call.rs
// ============================================================================
// Module: Tool Call Request and Result
// Description: Inputs and outputs of a gated tool invocation.
// Purpose: Define the caller-facing contract of the execution pipeline.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every invocation returns a [`ToolCallResult`]; failures are values, never
//! panics or errors escaping the pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::connection::ToolGrant;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::ConnectionId;
use crate::core::identifiers::DriveId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Request
// ============================================================================

/// Tool invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Calling user.
    pub user_id: UserId,
    /// Calling agent, when the call is agent-scoped.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Drive the agent session runs in.
    #[serde(default)]
    pub drive_id: Option<DriveId>,
    /// Connection to call through.
    pub connection_id: ConnectionId,
    /// Tool to invoke.
    pub tool_name: String,
    /// Tool input object.
    #[serde(default)]
    pub input: Value,
    /// Grant snapshot supplied by the caller.
    #[serde(default)]
    pub grant: Option<ToolGrant>,
}

// ============================================================================
// SECTION: Result
// ============================================================================

/// Failure classification returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Rejected before any network activity.
    Validation,
    /// Request limit exceeded.
    RateLimit,
    /// Upstream returned a non-success response.
    Http,
    /// Gateway-side failure.
    Internal,
    /// Upstream did not answer in time.
    Timeout,
    /// Upstream could not be reached.
    Network,
}

impl ErrorType {
    /// Returns the wire name of the error type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::RateLimit => "rate_limit",
            Self::Http => "http",
            Self::Internal => "internal",
            Self::Timeout => "timeout",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// True when the tool executed and returned a success response.
    pub success: bool,
    /// Transformed response payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    /// Seconds until the limit window frees a slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    /// Upstream status code, when a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ToolCallResult {
    /// Builds a success result.
    #[must_use]
    pub fn ok(data: Value, status_code: u16) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_type: None,
            retry_after_secs: None,
            status_code: Some(status_code),
        }
    }

    /// Builds a failure result.
    #[must_use]
    pub fn failure(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_type: Some(error_type),
            retry_after_secs: None,
            status_code: None,
        }
    }
}
