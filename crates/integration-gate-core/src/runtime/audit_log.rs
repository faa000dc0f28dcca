// crates/integration-gate-core/src/runtime/audit_log.rs
// ============================================================================
// Module: Audit Logger
// Description: Appends hash-chained audit entries for tool invocations.
// Purpose: Make every gated invocation tamper-evident after the fact.
// Dependencies: rand, serde_json, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The logger builds each entry inside [`AuditStore::append_linked`] so the
//! chain head read and the append happen under the store's per-chain
//! serialization. The first hashed entry of a chain receives a random seed
//! that stands in for the missing predecessor. Entry timestamps are taken at
//! link time and never precede the chain head, so chain order and timestamp
//! order agree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::AuditEntryId;
use crate::core::AuditLogEntry;
use crate::core::AuditRecord;
use crate::core::ChainHead;
use crate::core::ChainId;
use crate::core::hashing::HashError;
use crate::core::hashing::hex_encode;
use crate::core::hashing::sha256_canonical_hex;
use crate::interfaces::AuditStore;
use crate::interfaces::Clock;
use crate::interfaces::StoreError;
use crate::interfaces::SystemClock;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Audit logging failures.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Store rejected the append or read.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Entry could not be hashed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Logger
// ============================================================================

/// Chain seed length in bytes.
const CHAIN_SEED_BYTES: usize = 32;

/// Hash-chained audit logger for one chain.
#[derive(Clone)]
pub struct AuditLogger {
    /// Backing store.
    store: Arc<dyn AuditStore>,
    /// Chain written to.
    chain_id: ChainId,
    /// Time source for entry timestamps.
    clock: Arc<dyn Clock>,
}

impl AuditLogger {
    /// Creates a logger for a chain stamped by the wall clock.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, chain_id: ChainId) -> Self {
        Self { store, chain_id, clock: Arc::new(SystemClock) }
    }

    /// Replaces the time source used for entry timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the chain identifier.
    #[must_use]
    pub const fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    /// Appends a record, linking it to the current chain head.
    ///
    /// The record's timestamp is replaced by the clock reading at link time,
    /// raised to the head's timestamp when the clock lags it.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when hashing or persistence fails.
    pub fn append_log(&self, record: AuditRecord) -> Result<AuditLogEntry, AuditError> {
        let id = AuditEntryId::generate();
        let mut link = |head: &ChainHead| -> Result<AuditLogEntry, StoreError> {
            let mut entry = AuditLogEntry::from_record(id.clone(), self.chain_id.clone(), record.clone());
            entry.timestamp_ms = link_timestamp(self.clock.now_ms(), head);
            link_entry(entry, head).map_err(|err| StoreError::Invalid(err.to_string()))
        };
        Ok(self.store.append_linked(&self.chain_id, &mut link)?)
    }
}

/// Sets the chain fields of an entry against the chain head.
///
/// # Errors
///
/// Returns [`HashError`] when the entry cannot be canonicalized.
pub fn link_entry(mut entry: AuditLogEntry, head: &ChainHead) -> Result<AuditLogEntry, HashError> {
    let (previous, seed) = match head {
        ChainHead::Empty => {
            let seed = generate_chain_seed();
            (seed.clone(), Some(seed))
        }
        ChainHead::Linked { log_hash, .. } => (log_hash.clone(), None),
    };
    let log_hash = entry.compute_log_hash(&previous)?;
    entry.previous_log_hash = Some(previous);
    entry.log_hash = Some(log_hash);
    entry.chain_seed = seed;
    Ok(entry)
}

/// Returns `now_ms` clamped to be no earlier than the chain head.
#[must_use]
pub const fn link_timestamp(now_ms: i64, head: &ChainHead) -> i64 {
    match head {
        ChainHead::Linked { timestamp_ms, .. } if *timestamp_ms > now_ms => *timestamp_ms,
        _ => now_ms,
    }
}

/// Generates a random chain seed as lowercase hex.
#[must_use]
pub fn generate_chain_seed() -> String {
    let mut bytes = [0_u8; CHAIN_SEED_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

// ============================================================================
// SECTION: Input Summary
// ============================================================================

/// Summarizes tool input for the audit log without recording values.
///
/// The summary holds sorted top-level key names (capped), the key count, the
/// serialized size, and the canonical SHA-256 of the full input.
#[must_use]
pub fn summarize_input(input: &Value, max_keys: usize) -> Value {
    let size_bytes = serde_json::to_vec(input).map_or(0, |bytes| bytes.len());
    let hash = sha256_canonical_hex(input).ok();
    match input {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let truncated = keys.len() > max_keys;
            keys.truncate(max_keys);
            json!({
                "keys": keys,
                "key_count": map.len(),
                "keys_truncated": truncated,
                "size_bytes": size_bytes,
                "sha256": hash,
            })
        }
        other => json!({
            "kind": json_kind(other),
            "size_bytes": size_bytes,
            "sha256": hash,
        }),
    }
}

/// Returns the JSON kind label of a value.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
