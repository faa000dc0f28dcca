// crates/integration-gate-core/src/lib.rs
// ============================================================================
// Module: Integration Gate Core Library
// Description: Public API surface for the integration tool-execution gateway.
// Purpose: Expose core types, interfaces, and the gated execution runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Integration Gate runs agent tool calls against third-party APIs through a
//! fixed sequence of gates: connection status, grant evaluation, rate limits,
//! credential decryption, request templating, and authentication. Every call
//! that reaches a known connection leaves one hash-chained audit entry, and
//! the chain can be verified independently of the writer.
//!
//! Storage, transport, and crypto are reached through [`interfaces`]; durable
//! adapters live in sibling crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditStore;
pub use interfaces::Clock;
pub use interfaces::ConnectionLoader;
pub use interfaces::CounterDecision;
pub use interfaces::CounterStore;
pub use interfaces::CredentialCodec;
pub use interfaces::CredentialError;
pub use interfaces::Credentials;
pub use interfaces::GrantStore;
pub use interfaces::HttpExecutionError;
pub use interfaces::HttpExecutor;
pub use interfaces::HttpRequest;
pub use interfaces::HttpResponse;
pub use interfaces::LinkFn;
pub use interfaces::RequestBody;
pub use interfaces::StoreError;
pub use interfaces::SystemClock;
pub use runtime::ExecutorConfig;
pub use runtime::MissingGrantPolicy;
pub use runtime::ToolExecutor;
pub use runtime::ToolExecutorDeps;
pub use runtime::create_tool_executor;
