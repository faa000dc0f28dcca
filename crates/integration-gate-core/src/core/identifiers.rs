// crates/integration-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Integration Gate Identifiers
// Description: Opaque identifiers for connections, agents, tools, and audit rows.
// Purpose: Keep identifier kinds from being mixed up at call sites.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings that serialize transparently. Format checks
//! happen at the boundaries that mint them; these wrappers only carry values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares a transparent string identifier with the shared accessors.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier!(
    /// Connection identifier binding a user to a configured provider.
    ConnectionId
);

string_identifier!(
    /// Agent identifier for the caller invoking tools.
    AgentId
);

string_identifier!(
    /// User identifier owning a connection.
    UserId
);

string_identifier!(
    /// Drive identifier scoping an agent session.
    DriveId
);

string_identifier!(
    /// Integration provider identifier.
    ProviderId
);

string_identifier!(
    /// Tool identifier declared by a provider.
    ToolId
);

string_identifier!(
    /// Audit chain identifier.
    ChainId
);

string_identifier!(
    /// Audit log entry identifier.
    AuditEntryId
);

impl AuditEntryId {
    /// Mints a time-ordered identifier for a new audit entry.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

/// Default audit chain identifier for integration tool calls.
pub const DEFAULT_CHAIN_ID: &str = "integration_tool_calls";

impl Default for ChainId {
    fn default() -> Self {
        Self::new(DEFAULT_CHAIN_ID)
    }
}
