// crates/integration-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Gateway Store
// Description: Durable AuditStore and CounterStore backends using SQLite WAL.
// Purpose: Persist audit chains and rate limit windows across restarts.
// Dependencies: integration-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides SQLite-backed [`AuditStore`] and [`CounterStore`]
//! implementations. Chain appends and counter updates run inside `IMMEDIATE`
//! transactions, so concurrent writers (including separate processes sharing
//! the database file) are serialized by the database write lock.
//!
//! [`AuditStore`]: integration_gate_core::AuditStore
//! [`CounterStore`]: integration_gate_core::CounterStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_ENTRY_BYTES;
pub use store::SqliteAuditStore;
pub use store::SqliteCounterStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
