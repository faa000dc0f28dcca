// crates/integration-gate-config/src/lib.rs
// ============================================================================
// Module: Integration Gate Config Library
// Description: Gateway configuration model, validation, and examples.
// Purpose: Single source of truth for integration-gate.toml semantics.
// Dependencies: integration-gate-core, integration-gate-http, serde, toml
// ============================================================================

//! ## Overview
//! `integration-gate-config` defines the configuration model for the tool
//! execution gateway. Loading is strict and fail-closed: oversized, non-UTF-8,
//! unknown, or inconsistent settings are rejected before any component is
//! built from them.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
