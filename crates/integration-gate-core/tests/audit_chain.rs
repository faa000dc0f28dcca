// crates/integration-gate-core/tests/audit_chain.rs
// ============================================================================
// Module: Audit Chain Tests
// Description: Hash-chained audit appends and chain verification.
// Purpose: Ensure tampering, reordering, and concurrent writes are handled.
// Dependencies: integration-gate-core
// ============================================================================

//! ## Overview
//! Appends through [`AuditLogger`] and verifies with [`HashChainVerifier`].
//! Tampered chains are rebuilt by importing altered entries into a fresh
//! store, which mirrors an attacker editing persisted rows.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;

use common::ManualClock;
use common::START_MS;
use integration_gate_core::AuditEntryId;
use integration_gate_core::AuditErrorCode;
use integration_gate_core::AuditLogEntry;
use integration_gate_core::AuditRecord;
use integration_gate_core::AuditStore;
use integration_gate_core::ChainId;
use integration_gate_core::ConnectionId;
use integration_gate_core::UserId;
use integration_gate_core::runtime::AuditLogger;
use integration_gate_core::runtime::HashChainVerifier;
use integration_gate_core::runtime::InMemoryAuditStore;
use integration_gate_core::runtime::VerifyOptions;
use integration_gate_core::runtime::summarize_input;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an audit record for a tool call.
fn record(tool: &str, success: bool) -> AuditRecord {
    AuditRecord {
        timestamp_ms: START_MS,
        drive_id: Some("drive-1".into()),
        agent_id: Some("agent-1".into()),
        user_id: UserId::new("user-1"),
        connection_id: ConnectionId::new("conn-1"),
        tool_name: tool.to_string(),
        input_summary: summarize_input(&json!({"repo": "acme/api"}), 32),
        success,
        response_code: success.then_some(200),
        error_code: (!success).then_some(AuditErrorCode::HttpError),
        error_message: (!success).then(|| "HTTP 500".to_string()),
        duration_ms: 12,
        attempts: 1,
    }
}

/// Writes `count` linked entries and returns the store.
fn populated(count: usize) -> InMemoryAuditStore {
    let store = InMemoryAuditStore::new();
    let logger = AuditLogger::new(Arc::new(store.clone()), ChainId::default());
    for index in 0 .. count {
        logger.append_log(record(&format!("tool_{index}"), index % 2 == 0)).unwrap();
    }
    store
}

/// Builds a verifier over a store.
fn verifier(store: &InMemoryAuditStore) -> HashChainVerifier {
    HashChainVerifier::new(
        Arc::new(store.clone()),
        ChainId::default(),
        Arc::new(ManualClock::new(START_MS)),
    )
}

/// Loads every entry of the default chain.
fn entries(store: &InMemoryAuditStore) -> Vec<AuditLogEntry> {
    store.load_chain(&ChainId::default(), None).unwrap()
}

/// Copies entries into a fresh store after applying an edit.
fn rewritten(
    store: &InMemoryAuditStore,
    edit: impl FnOnce(&mut Vec<AuditLogEntry>),
) -> InMemoryAuditStore {
    let mut copied = entries(store);
    edit(&mut copied);
    let fresh = InMemoryAuditStore::new();
    fresh.import_legacy(&ChainId::default(), copied).unwrap();
    fresh
}

// ============================================================================
// SECTION: Append
// ============================================================================

#[test]
fn entries_link_to_their_predecessor() {
    let store = populated(4);
    let entries = entries(&store);
    assert_eq!(entries.len(), 4);
    let seed = entries[0].chain_seed.clone().unwrap();
    assert_eq!(seed.len(), 64);
    assert_eq!(entries[0].previous_log_hash.as_deref(), Some(seed.as_str()));
    for pair in entries.windows(2) {
        assert_eq!(pair[1].previous_log_hash, pair[0].log_hash);
        assert!(pair[1].chain_seed.is_none());
    }
    for entry in &entries {
        let previous = entry.previous_log_hash.as_deref().unwrap();
        assert_eq!(entry.compute_log_hash(previous).unwrap(), entry.log_hash.clone().unwrap());
    }
}

#[test]
fn separate_chains_have_separate_seeds() {
    let store = InMemoryAuditStore::new();
    let shared: Arc<dyn AuditStore> = Arc::new(store.clone());
    let calls = AuditLogger::new(shared.clone(), ChainId::default());
    let admin = AuditLogger::new(shared, ChainId::new("admin_actions"));
    let first = calls.append_log(record("a", true)).unwrap();
    let second = admin.append_log(record("b", true)).unwrap();
    assert!(first.chain_seed.is_some());
    assert!(second.chain_seed.is_some());
    assert_ne!(first.chain_seed, second.chain_seed);
    assert_eq!(store.count(&ChainId::new("admin_actions")).unwrap(), 1);
}

#[test]
fn concurrent_appends_form_a_single_chain() {
    let store = InMemoryAuditStore::new();
    let logger = AuditLogger::new(Arc::new(store.clone()), ChainId::default());
    let handles: Vec<_> = (0 .. 8)
        .map(|worker| {
            let logger = logger.clone();
            std::thread::spawn(move || {
                for index in 0 .. 10 {
                    logger.append_log(record(&format!("w{worker}_{index}"), true)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let entries = entries(&store);
    assert_eq!(entries.len(), 80);
    assert_eq!(entries.iter().filter(|entry| entry.chain_seed.is_some()).count(), 1);
    let result = verifier(&store).verify_hash_chain(VerifyOptions::default()).unwrap();
    assert!(result.is_valid);
    assert_eq!(result.valid_entries, 80);
}

// ============================================================================
// SECTION: Verification
// ============================================================================

#[test]
fn untouched_chain_verifies() {
    let store = populated(5);
    let result = verifier(&store).verify_hash_chain(VerifyOptions::default()).unwrap();
    assert!(result.is_valid);
    assert_eq!(result.total_entries, 5);
    assert_eq!(result.entries_verified, 5);
    assert_eq!(result.valid_entries, 5);
    assert_eq!(result.invalid_entries, 0);
    assert!(result.break_point.is_none());
    assert_eq!(result.chain_seed, entries(&store)[0].chain_seed);
    assert_eq!(result.verification_started_at, START_MS);
}

#[test]
fn altered_field_is_reported_at_its_position() {
    let store = populated(5);
    let tampered = rewritten(&store, |entries| entries[2].success = !entries[2].success);
    let result = verifier(&tampered).verify_hash_chain(VerifyOptions::default()).unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.invalid_entries, 1);
    let point = result.break_point.unwrap();
    assert_eq!(point.position, 2);
    assert_eq!(point.entry_id, entries(&store)[2].id);
    assert_ne!(point.computed_hash, point.stored_hash);
}

#[test]
fn deleted_entry_breaks_the_next_link() {
    let store = populated(5);
    let tampered = rewritten(&store, |entries| {
        entries.remove(1);
    });
    let result = verifier(&tampered).verify_hash_chain(VerifyOptions::default()).unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.break_point.unwrap().position, 1);
}

#[test]
fn reordered_entries_are_detected() {
    let store = populated(4);
    let tampered = rewritten(&store, |entries| entries.swap(1, 2));
    let result = verifier(&tampered).verify_hash_chain(VerifyOptions::default()).unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.break_point.unwrap().position, 1);
}

#[test]
fn rehashed_entry_with_stale_link_is_detected() {
    let store = populated(3);
    let tampered = rewritten(&store, |entries| {
        let entry = &mut entries[1];
        entry.tool_name = "forged".to_string();
        let forged = entry.compute_log_hash("0000").unwrap();
        entry.previous_log_hash = Some("0000".to_string());
        entry.log_hash = Some(forged);
    });
    let result = verifier(&tampered).verify_hash_chain(VerifyOptions::default()).unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.break_point.unwrap().position, 1);
}

#[test]
fn stop_on_first_break_halts_the_walk() {
    let store = populated(6);
    let tampered = rewritten(&store, |entries| {
        entries[1].duration_ms = 999;
        entries[4].duration_ms = 999;
    });
    let verifier = verifier(&tampered);
    let full = verifier.verify_hash_chain(VerifyOptions::default()).unwrap();
    assert_eq!(full.invalid_entries, 2);
    assert_eq!(full.entries_verified, 6);
    let halted = verifier
        .verify_hash_chain(VerifyOptions { limit: None, stop_on_first_break: true })
        .unwrap();
    assert_eq!(halted.invalid_entries, 1);
    assert_eq!(halted.entries_verified, 2);
}

#[test]
fn limit_bounds_the_walk() {
    let store = populated(6);
    let result = verifier(&store)
        .verify_hash_chain(VerifyOptions { limit: Some(3), stop_on_first_break: false })
        .unwrap();
    assert!(result.is_valid);
    assert_eq!(result.total_entries, 6);
    assert_eq!(result.entries_verified, 3);
}

#[test]
fn legacy_entries_are_counted_and_skipped() {
    let store = InMemoryAuditStore::new();
    let legacy = (0 .. 2).map(|index| {
        AuditLogEntry::from_record(AuditEntryId::generate(), ChainId::default(), record(&format!("old_{index}"), true))
    });
    store.import_legacy(&ChainId::default(), legacy).unwrap();
    let logger = AuditLogger::new(Arc::new(store.clone()), ChainId::default());
    let first_hashed = logger.append_log(record("new_0", true)).unwrap();
    logger.append_log(record("new_1", true)).unwrap();
    assert!(first_hashed.chain_seed.is_some());

    let result = verifier(&store).verify_hash_chain(VerifyOptions::default()).unwrap();
    assert!(result.is_valid);
    assert_eq!(result.total_entries, 4);
    assert_eq!(result.entries_without_hash, 2);
    assert_eq!(result.valid_entries, 2);
}

#[test]
fn import_rejects_entries_from_another_chain() {
    let store = InMemoryAuditStore::new();
    let foreign = AuditLogEntry::from_record(AuditEntryId::generate(), ChainId::new("other"), record("x", true));
    assert!(store.import_legacy(&ChainId::default(), [foreign]).is_err());
}

#[test]
fn single_entry_verification_uses_predecessor() {
    let store = populated(3);
    let stored = entries(&store);
    let ids: Vec<AuditEntryId> = stored.iter().map(|entry| entry.id.clone()).collect();
    let verifier = verifier(&store);
    for id in &ids {
        let verification = verifier.verify_entry(id).unwrap().unwrap();
        assert!(verification.is_valid, "{}", verification.description);
        assert!(verification.has_hash);
    }
    let first = verifier.verify_entry(&ids[0]).unwrap().unwrap();
    assert!(stored[0].chain_seed.is_some());
    assert_eq!(first.previous_hash, stored[0].chain_seed);
    let second = verifier.verify_entry(&ids[1]).unwrap().unwrap();
    assert_eq!(second.previous_hash, stored[0].log_hash);
    assert!(verifier.verify_entry(&AuditEntryId::new("missing")).unwrap().is_none());

    let tampered = rewritten(&store, |entries| entries[1].attempts = 7);
    let verification = self::verifier(&tampered).verify_entry(&ids[1]).unwrap().unwrap();
    assert!(!verification.is_valid);
    assert!(verification.computed_hash.is_some());
}

#[test]
fn quick_check_reports_health() {
    let empty = InMemoryAuditStore::new();
    let result = verifier(&empty).quick_integrity_check(10).unwrap();
    assert!(result.is_likely_valid);
    assert!(!result.has_chain_seed);
    assert_eq!(result.sampled_entries, 0);

    let store = populated(4);
    let result = verifier(&store).quick_integrity_check(2).unwrap();
    assert!(result.is_likely_valid, "{}", result.details);
    assert!(result.has_chain_seed);
    assert_eq!(result.sampled_entries, 2);
    assert_eq!(result.latest_entry_valid, Some(true));

    let tampered = rewritten(&store, |entries| entries[3].tool_name = "forged".to_string());
    let result = verifier(&tampered).quick_integrity_check(2).unwrap();
    assert!(!result.is_likely_valid);
    assert_eq!(result.latest_entry_valid, Some(false));
}
