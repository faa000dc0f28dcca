// crates/integration-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Integration Gate Runtime
// Description: Gating pipeline, audit chain, and in-memory backings.
// Purpose: Group the behavior that operates on core types.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The runtime is synchronous. [`saga::ToolExecutor::execute_async`] hosts it
//! on a blocking pool for async callers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit_log;
pub mod auth;
pub mod credentials;
pub mod rate_limit;
pub mod request;
pub mod saga;
pub mod store;
pub mod telemetry;
pub mod transform;
pub mod validator;
pub mod verifier;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit_log::AuditError;
pub use audit_log::AuditLogger;
pub use audit_log::summarize_input;
pub use auth::AuthMaterial;
pub use auth::apply_auth;
pub use credentials::EncryptionKey;
pub use credentials::XChaChaCredentialCodec;
pub use credentials::open_credentials;
pub use credentials::seal_credentials;
pub use rate_limit::IntegrationRateLimiter;
pub use rate_limit::RateLimitDecision;
pub use rate_limit::RateLimitPolicy;
pub use request::RequestBuildError;
pub use request::build_request;
pub use saga::ExecutorConfig;
pub use saga::MissingGrantPolicy;
pub use saga::ToolExecutor;
pub use saga::ToolExecutorDeps;
pub use saga::create_tool_executor;
pub use store::InMemoryAuditStore;
pub use store::InMemoryConnectionRegistry;
pub use store::InMemoryCounterStore;
pub use telemetry::GatewayTelemetry;
pub use telemetry::NoopTelemetry;
pub use telemetry::TracingTelemetry;
pub use transform::TransformError;
pub use transform::transform_output;
pub use validator::ToolAccessDecision;
pub use validator::is_tool_allowed;
pub use verifier::HashChainVerifier;
pub use verifier::VerificationResult;
pub use verifier::VerifyOptions;
