// crates/integration-gate-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Gateway Store Tests
// Description: Persistence, tamper detection, and counter tests for SQLite.
// Purpose: Ensure durable chains verify across restarts and writers.
// Dependencies: integration-gate-store-sqlite, integration-gate-core, tempfile
// ============================================================================

//! ## Overview
//! Writes through the core [`AuditLogger`] into a temporary database, edits
//! rows with raw SQL to simulate tampering, and checks the verifier finds the
//! break. Counter tests cover window limits and writers on separate handles.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::thread;

use integration_gate_core::AuditEntryId;
use integration_gate_core::AuditLogEntry;
use integration_gate_core::AuditRecord;
use integration_gate_core::AuditStore;
use integration_gate_core::ChainId;
use integration_gate_core::ConnectionId;
use integration_gate_core::CounterStore;
use integration_gate_core::SystemClock;
use integration_gate_core::UserId;
use integration_gate_core::runtime::AuditLogger;
use integration_gate_core::runtime::HashChainVerifier;
use integration_gate_core::runtime::VerifyOptions;
use integration_gate_store_sqlite::SqliteAuditStore;
use integration_gate_store_sqlite::SqliteCounterStore;
use integration_gate_store_sqlite::SqliteStoreConfig;
use integration_gate_store_sqlite::SqliteStoreError;
use rusqlite::Connection;
use rusqlite::params;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Start time used for records and counters.
const START_MS: i64 = 1_700_000_000_000;

/// Builds a store config inside a temp directory.
fn config(dir: &TempDir) -> SqliteStoreConfig {
    SqliteStoreConfig::new(dir.path().join("gateway.db"))
}

/// Builds an audit record.
fn record(tool: &str) -> AuditRecord {
    AuditRecord {
        timestamp_ms: START_MS,
        drive_id: None,
        agent_id: Some("agent-1".into()),
        user_id: UserId::new("user-1"),
        connection_id: ConnectionId::new("conn-1"),
        tool_name: tool.to_string(),
        input_summary: json!({"keys": ["repo"], "key_count": 1}),
        success: true,
        response_code: Some(200),
        error_code: None,
        error_message: None,
        duration_ms: 5,
        attempts: 1,
    }
}

/// Appends `count` entries through a logger.
fn append(store: &SqliteAuditStore, count: usize) {
    let logger = AuditLogger::new(Arc::new(store.clone()), ChainId::default());
    for index in 0 .. count {
        logger.append_log(record(&format!("tool_{index}"))).unwrap();
    }
}

/// Verifies the default chain.
fn verify(store: &SqliteAuditStore) -> integration_gate_core::runtime::VerificationResult {
    HashChainVerifier::new(Arc::new(store.clone()), ChainId::default(), Arc::new(SystemClock))
        .verify_hash_chain(VerifyOptions::default())
        .unwrap()
}

/// Rewrites the stored JSON of one entry with raw SQL.
fn tamper(path: &Path, entry: &AuditLogEntry, edit: impl FnOnce(&mut AuditLogEntry)) {
    let mut altered = entry.clone();
    edit(&mut altered);
    let connection = Connection::open(path).unwrap();
    connection
        .execute(
            "UPDATE audit_entries SET entry_json = ?1 WHERE entry_id = ?2",
            params![serde_json::to_vec(&altered).unwrap(), entry.id.as_str()],
        )
        .unwrap();
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

#[test]
fn chain_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let store = SqliteAuditStore::new(&config(&dir)).unwrap();
    append(&store, 3);
    drop(store);

    let reopened = SqliteAuditStore::new(&config(&dir)).unwrap();
    append(&reopened, 2);
    let entries = reopened.load_chain(&ChainId::default(), None).unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries.iter().filter(|entry| entry.chain_seed.is_some()).count(), 1);
    assert_eq!(entries[3].previous_log_hash, entries[2].log_hash);

    let result = verify(&reopened);
    assert!(result.is_valid);
    assert_eq!(result.valid_entries, 5);
    assert_eq!(result.chain_seed, entries[0].chain_seed);
}

#[test]
fn lookups_follow_insertion_order() {
    let dir = TempDir::new().unwrap();
    let store = SqliteAuditStore::new(&config(&dir)).unwrap();
    append(&store, 4);
    let chain = ChainId::default();
    let entries = store.load_chain(&chain, None).unwrap();

    assert_eq!(store.count(&chain).unwrap(), 4);
    assert_eq!(store.load_chain(&chain, Some(2)).unwrap(), entries[.. 2].to_vec());
    assert_eq!(store.get_entry(&chain, &entries[1].id).unwrap(), Some(entries[1].clone()));
    assert_eq!(store.previous_hashed_entry(&chain, &entries[2].id).unwrap(), Some(entries[1].clone()));
    assert_eq!(store.previous_hashed_entry(&chain, &entries[0].id).unwrap(), None);
    assert_eq!(store.last_entry(&chain).unwrap(), Some(entries[3].clone()));
    assert_eq!(store.chain_seed(&chain).unwrap(), entries[0].chain_seed);
    assert!(store.get_entry(&chain, &AuditEntryId::new("missing")).unwrap().is_none());
    assert_eq!(store.count(&ChainId::new("other")).unwrap(), 0);
}

#[test]
fn edited_row_is_detected() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let store = SqliteAuditStore::new(&cfg).unwrap();
    append(&store, 4);
    let entries = store.load_chain(&ChainId::default(), None).unwrap();

    tamper(&cfg.path, &entries[2], |entry| entry.success = false);
    let result = verify(&store);
    assert!(!result.is_valid);
    let point = result.break_point.unwrap();
    assert_eq!(point.position, 2);
    assert_eq!(point.entry_id, entries[2].id);
}

#[test]
fn deleted_row_is_detected() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let store = SqliteAuditStore::new(&cfg).unwrap();
    append(&store, 4);
    let entries = store.load_chain(&ChainId::default(), None).unwrap();

    Connection::open(&cfg.path)
        .unwrap()
        .execute("DELETE FROM audit_entries WHERE entry_id = ?1", params![entries[1].id.as_str()])
        .unwrap();
    let result = verify(&store);
    assert!(!result.is_valid);
    assert_eq!(result.break_point.unwrap().position, 1);
}

#[test]
fn row_key_mismatch_fails_closed() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    let store = SqliteAuditStore::new(&cfg).unwrap();
    append(&store, 2);
    let entries = store.load_chain(&ChainId::default(), None).unwrap();
    tamper(&cfg.path, &entries[0], |entry| entry.id = AuditEntryId::new("swapped"));
    let err = store.load_chain(&ChainId::default(), None).unwrap_err();
    assert!(matches!(err, integration_gate_core::StoreError::Corrupt(_)));
}

#[test]
fn concurrent_writers_on_separate_handles_share_one_chain() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    SqliteAuditStore::new(&cfg).unwrap();
    let handles: Vec<_> = (0 .. 4)
        .map(|worker| {
            let cfg = cfg.clone();
            thread::spawn(move || {
                let store = SqliteAuditStore::new(&cfg).unwrap();
                let logger = AuditLogger::new(Arc::new(store), ChainId::default());
                for index in 0 .. 10 {
                    logger.append_log(record(&format!("w{worker}_{index}"))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let store = SqliteAuditStore::new(&cfg).unwrap();
    let result = verify(&store);
    assert!(result.is_valid);
    assert_eq!(result.total_entries, 40);
    assert_eq!(result.valid_entries, 40);
}

#[test]
fn legacy_import_precedes_hashed_entries() {
    let dir = TempDir::new().unwrap();
    let store = SqliteAuditStore::new(&config(&dir)).unwrap();
    let legacy: Vec<AuditLogEntry> = (0 .. 3)
        .map(|index| {
            AuditLogEntry::from_record(AuditEntryId::generate(), ChainId::default(), record(&format!("old_{index}")))
        })
        .collect();
    assert_eq!(store.import_legacy(&ChainId::default(), legacy).unwrap(), 3);
    append(&store, 2);

    let result = verify(&store);
    assert!(result.is_valid);
    assert_eq!(result.entries_without_hash, 3);
    assert_eq!(result.valid_entries, 2);

    let foreign = AuditLogEntry::from_record(AuditEntryId::generate(), ChainId::new("other"), record("x"));
    let err = store.import_legacy(&ChainId::default(), [foreign]).unwrap_err();
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

// ============================================================================
// SECTION: Store Lifecycle
// ============================================================================

#[test]
fn schema_version_mismatch_fails_closed() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    drop(SqliteAuditStore::new(&cfg).unwrap());
    Connection::open(&cfg.path).unwrap().execute("UPDATE store_meta SET version = 99", params![]).unwrap();
    assert!(matches!(SqliteAuditStore::new(&cfg), Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn directory_paths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let cfg = SqliteStoreConfig::new(dir.path());
    assert!(matches!(SqliteCounterStore::new(&cfg), Err(SqliteStoreError::Invalid(_))));
}

// ============================================================================
// SECTION: Counter Store
// ============================================================================

#[test]
fn counters_enforce_sliding_window() {
    let dir = TempDir::new().unwrap();
    let store = SqliteCounterStore::new(&config(&dir)).unwrap();
    let first = store.check_and_increment("k", 60_000, 2, START_MS).unwrap();
    assert!(first.allowed);
    assert_eq!(first.remaining, 1);
    assert!(store.check_and_increment("k", 60_000, 2, START_MS + 10_000).unwrap().allowed);

    let rejected = store.check_and_increment("k", 60_000, 2, START_MS + 20_000).unwrap();
    assert!(!rejected.allowed);
    assert_eq!(rejected.retry_after_ms, Some(40_000));

    assert!(store.check_and_increment("k", 60_000, 2, START_MS + 60_000).unwrap().allowed);
    assert!(store.check_and_increment("other", 60_000, 2, START_MS + 60_000).unwrap().allowed);
}

#[test]
fn reset_and_prune_clear_hits() {
    let dir = TempDir::new().unwrap();
    let store = SqliteCounterStore::new(&config(&dir)).unwrap();
    assert!(store.check_and_increment("a", 60_000, 1, START_MS).unwrap().allowed);
    assert!(!store.check_and_increment("a", 60_000, 1, START_MS).unwrap().allowed);
    store.reset("a").unwrap();
    assert!(store.check_and_increment("a", 60_000, 1, START_MS).unwrap().allowed);

    assert!(store.check_and_increment("b", 60_000, 1, START_MS).unwrap().allowed);
    assert_eq!(store.prune_expired(60_000, START_MS + 60_000).unwrap(), 2);
}

#[test]
fn counters_hold_across_handles_and_threads() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    SqliteCounterStore::new(&cfg).unwrap();
    let handles: Vec<_> = (0 .. 4)
        .map(|_| {
            let cfg = cfg.clone();
            thread::spawn(move || {
                let store = SqliteCounterStore::new(&cfg).unwrap();
                (0 .. 10)
                    .filter(|_| store.check_and_increment("shared", 60_000, 15, START_MS).unwrap().allowed)
                    .count()
            })
        })
        .collect();
    let allowed: usize = handles.into_iter().map(|handle| handle.join().unwrap()).sum();
    assert_eq!(allowed, 15);
}
