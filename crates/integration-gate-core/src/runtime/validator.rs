// crates/integration-gate-core/src/runtime/validator.rs
// ============================================================================
// Module: Tool Access Validator
// Description: Grant evaluation for tool invocations.
// Purpose: Decide whether an agent may call a tool through a connection.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Evaluation order is fixed: unknown tool, deny list, allow list, read-only
//! category. The deny list always wins. The function is pure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::IntegrationProviderConfig;
use crate::core::ToolGrant;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Inputs for a tool access decision.
#[derive(Debug, Clone, Copy)]
pub struct ToolAccessContext<'a> {
    /// Grant in force for the agent.
    pub grant: &'a ToolGrant,
    /// Provider declaring the tool.
    pub provider: &'a IntegrationProviderConfig,
}

/// Tool access decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAccessDecision {
    /// Tool may be called.
    Allowed,
    /// Tool may not be called.
    Denied {
        /// Rejection reason.
        reason: String,
    },
}

impl ToolAccessDecision {
    /// Returns true when access is allowed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Builds a denial.
    fn denied(reason: impl Into<String>) -> Self {
        Self::Denied { reason: reason.into() }
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Decides whether `tool_name` may be called under the context's grant.
#[must_use]
pub fn is_tool_allowed(tool_name: &str, context: &ToolAccessContext<'_>) -> ToolAccessDecision {
    let Some(tool) = context.provider.tool(tool_name) else {
        return ToolAccessDecision::denied(format!("Tool not found: {tool_name}"));
    };
    let grant = context.grant;
    if grant
        .denied_tools
        .as_deref()
        .is_some_and(|denied| denied.iter().any(|name| name == tool_name))
    {
        return ToolAccessDecision::denied(format!("Tool {tool_name} is explicitly denied"));
    }
    if grant
        .allowed_tools
        .as_deref()
        .is_some_and(|allowed| !allowed.iter().any(|name| name == tool_name))
    {
        return ToolAccessDecision::denied(format!("Tool {tool_name} is not in the allowed list"));
    }
    if grant.read_only && tool.category.is_mutating() {
        return ToolAccessDecision::denied(format!(
            "Tool {tool_name} is a {} tool and the grant is read-only",
            tool.category.as_str()
        ));
    }
    ToolAccessDecision::Allowed
}

