// crates/integration-gate-core/src/core/audit.rs
// ============================================================================
// Module: Audit Log Entries
// Description: Hash-chained audit records for gated tool invocations.
// Purpose: Define the persisted audit entry and its chain hash computation.
// Dependencies: serde, serde_json, crate::core::hashing
// ============================================================================

//! ## Overview
//! Each entry commits to its own content and to the hash of the previous
//! entry in the same chain:
//!
//! `log_hash = SHA256(canonical(entry without hash fields) ++ previous_log_hash)`
//!
//! The first hashed entry in a chain links to a random chain seed instead of a
//! predecessor. Entries written before hashing was introduced carry no hash
//! fields and are skipped when linking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::hashing::chain_link_hex;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::AuditEntryId;
use crate::core::identifiers::ChainId;
use crate::core::identifiers::ConnectionId;
use crate::core::identifiers::DriveId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Machine-readable failure codes recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditErrorCode {
    /// Connection is not active.
    IntegrationInactive,
    /// Provider does not declare the tool.
    ToolNotFound,
    /// Tool execution type is not HTTP.
    UnsupportedExecution,
    /// Grant rejected the tool.
    ToolNotAllowed,
    /// Request limit exceeded.
    RateLimited,
    /// Input or request template was invalid.
    ValidationFailed,
    /// Credentials could not be decrypted.
    CredentialError,
    /// Upstream returned a non-success response.
    HttpError,
    /// Upstream timed out.
    Timeout,
    /// Upstream unreachable.
    NetworkError,
    /// Gateway-side failure.
    InternalError,
}

impl AuditErrorCode {
    /// Returns the wire name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IntegrationInactive => "INTEGRATION_INACTIVE",
            Self::ToolNotFound => "TOOL_NOT_FOUND",
            Self::UnsupportedExecution => "UNSUPPORTED_EXECUTION",
            Self::ToolNotAllowed => "TOOL_NOT_ALLOWED",
            Self::RateLimited => "RATE_LIMITED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::CredentialError => "CREDENTIAL_ERROR",
            Self::HttpError => "HTTP_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for AuditErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Audit Records
// ============================================================================

/// Invocation facts captured by the execution pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Invocation start time in unix milliseconds.
    pub timestamp_ms: i64,
    /// Drive the agent session runs in.
    pub drive_id: Option<DriveId>,
    /// Calling agent.
    pub agent_id: Option<AgentId>,
    /// Calling user.
    pub user_id: UserId,
    /// Connection called through.
    pub connection_id: ConnectionId,
    /// Tool invoked.
    pub tool_name: String,
    /// Redacted summary of the tool input.
    pub input_summary: Value,
    /// True when the invocation succeeded.
    pub success: bool,
    /// Upstream status code.
    pub response_code: Option<u16>,
    /// Failure code.
    pub error_code: Option<AuditErrorCode>,
    /// Failure message.
    pub error_message: Option<String>,
    /// Wall time spent in the pipeline.
    pub duration_ms: u64,
    /// Upstream attempts made.
    pub attempts: u32,
}

/// Persisted audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Entry identifier.
    pub id: AuditEntryId,
    /// Chain the entry belongs to.
    pub chain_id: ChainId,
    /// Invocation start time in unix milliseconds.
    pub timestamp_ms: i64,
    /// Drive the agent session runs in.
    #[serde(default)]
    pub drive_id: Option<DriveId>,
    /// Calling agent.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Calling user.
    pub user_id: UserId,
    /// Connection called through.
    pub connection_id: ConnectionId,
    /// Tool invoked.
    pub tool_name: String,
    /// Redacted summary of the tool input.
    #[serde(default)]
    pub input_summary: Value,
    /// True when the invocation succeeded.
    pub success: bool,
    /// Upstream status code.
    #[serde(default)]
    pub response_code: Option<u16>,
    /// Failure code.
    #[serde(default)]
    pub error_code: Option<AuditErrorCode>,
    /// Failure message.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Wall time spent in the pipeline.
    #[serde(default)]
    pub duration_ms: u64,
    /// Upstream attempts made.
    #[serde(default)]
    pub attempts: u32,
    /// Hash of the previous entry, or the chain seed for the first entry.
    #[serde(default)]
    pub previous_log_hash: Option<String>,
    /// Hash of this entry.
    #[serde(default)]
    pub log_hash: Option<String>,
    /// Random chain seed, present only on the first hashed entry.
    #[serde(default)]
    pub chain_seed: Option<String>,
}

/// Field names excluded from the hashed body.
const HASH_FIELDS: [&str; 3] = ["previous_log_hash", "log_hash", "chain_seed"];

impl AuditLogEntry {
    /// Builds an unhashed entry from an invocation record.
    #[must_use]
    pub fn from_record(id: AuditEntryId, chain_id: ChainId, record: AuditRecord) -> Self {
        Self {
            id,
            chain_id,
            timestamp_ms: record.timestamp_ms,
            drive_id: record.drive_id,
            agent_id: record.agent_id,
            user_id: record.user_id,
            connection_id: record.connection_id,
            tool_name: record.tool_name,
            input_summary: record.input_summary,
            success: record.success,
            response_code: record.response_code,
            error_code: record.error_code,
            error_message: record.error_message,
            duration_ms: record.duration_ms,
            attempts: record.attempts,
            previous_log_hash: None,
            log_hash: None,
            chain_seed: None,
        }
    }

    /// Returns true when the entry carries a chain hash.
    #[must_use]
    pub const fn is_hashed(&self) -> bool {
        self.log_hash.is_some()
    }

    /// Returns RFC 8785 bytes of the entry without its hash fields.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the entry cannot be serialized.
    pub fn canonical_body(&self) -> Result<Vec<u8>, HashError> {
        let mut value = serde_json::to_value(self)
            .map_err(|err| HashError::Canonicalization(err.to_string()))?;
        if let Value::Object(map) = &mut value {
            for field in HASH_FIELDS {
                map.remove(field);
            }
        }
        canonical_json_bytes(&value)
    }

    /// Computes the chain hash of this entry against a previous hash.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the entry cannot be serialized.
    pub fn compute_log_hash(&self, previous_hash: &str) -> Result<String, HashError> {
        let body = self.canonical_body()?;
        Ok(chain_link_hex(&body, previous_hash))
    }
}

// ============================================================================
// SECTION: Chain Head
// ============================================================================

/// Most recent hashed position of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainHead {
    /// No hashed entries exist yet.
    Empty,
    /// Latest hashed entry's hash and timestamp.
    Linked {
        /// Hash of the latest hashed entry.
        log_hash: String,
        /// Timestamp of the latest hashed entry.
        timestamp_ms: i64,
    },
}
