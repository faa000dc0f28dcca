// crates/integration-gate-http/src/lib.rs
// ============================================================================
// Module: Integration Gate HTTP
// Description: Blocking HTTP transport for gated tool calls.
// Purpose: Provide the production HttpExecutor behind the tool executor.
// Dependencies: integration-gate-core, reqwest
// ============================================================================

//! ## Overview
//! This crate ships the reqwest-backed [`ReqwestHttpExecutor`]. It enforces
//! scheme restrictions, optional host allowlists, disabled redirects, and a
//! response size limit so upstream APIs cannot exhaust gateway memory.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod executor;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use executor::HttpExecutorConfig;
pub use executor::ReqwestHttpExecutor;
