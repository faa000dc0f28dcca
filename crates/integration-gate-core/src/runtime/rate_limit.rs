// crates/integration-gate-core/src/runtime/rate_limit.rs
// ============================================================================
// Module: Integration Rate Limiter
// Description: Multi-level sliding-window limits over a shared counter store.
// Purpose: Bound call volume per connection, agent, and tool.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Limits are keyed by connection, agent, and tool:
//!
//! - tool scope: `integration:{connection}:{agent|global}:{tool}`
//! - provider scope: `integration:{connection}:{agent|global}:provider`
//!
//! The effective limit is the most restrictive configured value, clamped to
//! the policy bounds. Check-and-increment is delegated to the
//! [`CounterStore`], which performs it atomically per key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::AgentId;
use crate::core::ConnectionId;
use crate::core::RateLimitSpec;
use crate::interfaces::Clock;
use crate::interfaces::CounterStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Default requests per minute when nothing is configured.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 30;
/// Lower clamp for configured limits.
pub const MIN_REQUESTS_PER_MINUTE: u32 = 1;
/// Upper clamp for configured limits.
pub const MAX_REQUESTS_PER_MINUTE: u32 = 1000;
/// Window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Rate limit policy bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Limit used when no level configures one.
    pub default_requests_per_minute: u32,
    /// Lower clamp.
    pub min_requests_per_minute: u32,
    /// Upper clamp.
    pub max_requests_per_minute: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default_requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            min_requests_per_minute: MIN_REQUESTS_PER_MINUTE,
            max_requests_per_minute: MAX_REQUESTS_PER_MINUTE,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

impl RateLimitPolicy {
    /// Clamps a limit to the policy bounds.
    #[must_use]
    pub fn clamp(&self, requests_per_minute: u32) -> u32 {
        requests_per_minute.clamp(self.min_requests_per_minute, self.max_requests_per_minute)
    }
}

/// Configured limits at each level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitLevels {
    /// Provider-wide limit.
    pub provider: Option<RateLimitSpec>,
    /// Connection override.
    pub connection: Option<RateLimitSpec>,
    /// Grant override.
    pub grant: Option<RateLimitSpec>,
    /// Tool-specific limit.
    pub tool: Option<RateLimitSpec>,
}

impl LimitLevels {
    /// Returns the provider-scope limit, when any non-tool level is configured.
    #[must_use]
    pub fn provider_limit(&self, policy: &RateLimitPolicy) -> Option<u32> {
        most_restrictive([self.provider, self.connection, self.grant]).map(|limit| policy.clamp(limit))
    }

    /// Returns the tool-scope limit, falling back to the policy default.
    #[must_use]
    pub fn tool_limit(&self, policy: &RateLimitPolicy) -> u32 {
        let limit = most_restrictive([self.provider, self.connection, self.grant, self.tool])
            .unwrap_or(policy.default_requests_per_minute);
        policy.clamp(limit)
    }
}

/// Returns the smallest configured limit.
fn most_restrictive<const N: usize>(levels: [Option<RateLimitSpec>; N]) -> Option<u32> {
    levels.into_iter().flatten().map(|spec| spec.requests_per_minute).min()
}

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Scope of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope<'a> {
    /// Per-tool counter.
    Tool(&'a str),
    /// Provider-wide counter for the connection.
    Provider,
}

/// Builds the counter key for a scope.
#[must_use]
pub fn rate_limit_key(
    connection_id: &ConnectionId,
    agent_id: Option<&AgentId>,
    scope: RateLimitScope<'_>,
) -> String {
    let agent = agent_id.map_or("global", AgentId::as_str);
    let suffix = match scope {
        RateLimitScope::Tool(tool) => tool,
        RateLimitScope::Provider => "provider",
    };
    format!("integration:{connection_id}:{agent}:{suffix}")
}

// ============================================================================
// SECTION: Limiter
// ============================================================================

/// Rate limit check request.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitCheck<'a> {
    /// Connection being called.
    pub connection_id: &'a ConnectionId,
    /// Calling agent.
    pub agent_id: Option<&'a AgentId>,
    /// Counter scope.
    pub scope: RateLimitScope<'a>,
    /// Limit to enforce before clamping.
    pub requests_per_minute: u32,
}

/// Rate limit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// True when the call may proceed.
    pub allowed: bool,
    /// Enforced limit after clamping.
    pub limit: u32,
    /// Calls remaining in the window.
    pub remaining: u32,
    /// Whole seconds until a slot frees, when rejected.
    pub retry_after_secs: Option<u64>,
}

/// Sliding-window limiter over a counter store.
#[derive(Clone)]
pub struct IntegrationRateLimiter {
    /// Shared counters.
    store: Arc<dyn CounterStore>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Policy bounds.
    policy: RateLimitPolicy,
}

impl IntegrationRateLimiter {
    /// Creates a limiter.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, policy: RateLimitPolicy) -> Self {
        Self { store, clock, policy }
    }

    /// Returns the policy bounds.
    #[must_use]
    pub const fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Checks and records one call against a scope.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the counter store fails.
    pub fn check_integration_rate_limit(
        &self,
        check: &RateLimitCheck<'_>,
    ) -> Result<RateLimitDecision, StoreError> {
        let limit = self.policy.clamp(check.requests_per_minute);
        let key = rate_limit_key(check.connection_id, check.agent_id, check.scope);
        let decision = self.store.check_and_increment(
            &key,
            self.policy.window_ms,
            limit,
            self.clock.now_ms(),
        )?;
        let retry_after_secs = if decision.allowed {
            None
        } else {
            let millis = decision.retry_after_ms.unwrap_or(self.policy.window_ms);
            Some(millis.div_ceil(1000).max(1))
        };
        Ok(RateLimitDecision {
            allowed: decision.allowed,
            limit,
            remaining: decision.remaining,
            retry_after_secs,
        })
    }

    /// Clears the tool and provider windows for an agent on a connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the counter store fails.
    pub fn reset_integration_rate_limit(
        &self,
        connection_id: &ConnectionId,
        agent_id: Option<&AgentId>,
        tool_name: &str,
    ) -> Result<(), StoreError> {
        self.store.reset(&rate_limit_key(connection_id, agent_id, RateLimitScope::Tool(tool_name)))?;
        self.store.reset(&rate_limit_key(connection_id, agent_id, RateLimitScope::Provider))
    }
}
