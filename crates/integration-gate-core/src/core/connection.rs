// crates/integration-gate-core/src/core/connection.rs
// ============================================================================
// Module: Integration Connections and Grants
// Description: User connections to providers and agent access grants.
// Purpose: Model the per-user binding and the per-agent tool permissions.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A connection binds a user to a provider and holds encrypted credentials.
//! A grant scopes what a given agent may call through that connection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::ConnectionId;
use crate::core::identifiers::ProviderId;
use crate::core::identifiers::UserId;
use crate::core::provider::IntegrationProviderConfig;
use crate::core::provider::RateLimitSpec;

// ============================================================================
// SECTION: Connections
// ============================================================================

/// Lifecycle status of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Usable for tool calls.
    Active,
    /// Awaiting authorization.
    Pending,
    /// Credentials expired.
    Expired,
    /// Last refresh or probe failed.
    Error,
    /// Revoked by the user.
    Revoked,
}

impl ConnectionStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Expired => "expired",
            Self::Error => "error",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-connection overrides of provider defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConnectionOverrides {
    /// Connection-level request limit.
    #[serde(default)]
    pub rate_limit: Option<RateLimitSpec>,
    /// Connection-level request timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// User connection to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Provider the connection targets.
    pub provider_id: ProviderId,
    /// Owning user.
    pub user_id: UserId,
    /// Lifecycle status.
    pub status: ConnectionStatus,
    /// Encrypted credential blob.
    #[serde(default)]
    pub credentials: Option<String>,
    /// Base URL replacing the provider default.
    #[serde(default)]
    pub base_url_override: Option<String>,
    /// Connection-level overrides.
    #[serde(default)]
    pub config_overrides: ConnectionOverrides,
}

/// Connection paired with its provider configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConnection {
    /// Connection record.
    pub connection: Connection,
    /// Provider configuration.
    pub provider: IntegrationProviderConfig,
}

impl LoadedConnection {
    /// Returns the base URL for outbound requests.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.connection.base_url_override.as_deref().unwrap_or(&self.provider.base_url)
    }
}

// ============================================================================
// SECTION: Grants
// ============================================================================

/// Agent permissions on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ToolGrant {
    /// Agent the grant applies to.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Connection the grant applies to.
    #[serde(default)]
    pub connection_id: Option<ConnectionId>,
    /// Explicit allow list; absent allows every tool.
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
    /// Explicit deny list; always wins over the allow list.
    #[serde(default)]
    pub denied_tools: Option<Vec<String>>,
    /// Rejects write, admin, and dangerous tools.
    #[serde(default)]
    pub read_only: bool,
    /// Grant-level request limit.
    #[serde(default)]
    pub rate_limit_override: Option<RateLimitSpec>,
}

impl ToolGrant {
    /// Grant that allows every tool on the connection.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }
}
