// crates/integration-gate-core/src/core/mod.rs
// ============================================================================
// Module: Integration Gate Core Types
// Description: Data model for providers, connections, calls, and audit entries.
// Purpose: Group the serializable types shared by runtime and adapters.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! Core types are plain data with serde derives. Behavior lives in
//! [`crate::runtime`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod call;
pub mod connection;
pub mod hashing;
pub mod identifiers;
pub mod provider;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::*;
pub use call::*;
pub use connection::*;
pub use hashing::*;
pub use identifiers::*;
pub use provider::*;
