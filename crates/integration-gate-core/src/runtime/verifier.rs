// crates/integration-gate-core/src/runtime/verifier.rs
// ============================================================================
// Module: Hash Chain Verifier
// Description: Recomputes audit chain hashes and reports tampering.
// Purpose: Detect modified, reordered, or removed audit entries.
// Dependencies: subtle, serde, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Verification walks a chain oldest-first and recomputes each entry's hash
//! from its persisted fields and the previous entry's stored hash (or the
//! chain seed for the first hashed entry). Entries without hash fields are
//! counted separately and never break the chain. Hash comparison is
//! constant-time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::core::AuditEntryId;
use crate::core::AuditLogEntry;
use crate::core::ChainId;
use crate::interfaces::AuditStore;
use crate::interfaces::Clock;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Options and Results
// ============================================================================

/// Default number of entries sampled by the quick check.
pub const DEFAULT_QUICK_CHECK_SAMPLE: usize = 10;

/// Full verification options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOptions {
    /// Maximum entries to load, oldest first.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Halts at the first break.
    #[serde(default)]
    pub stop_on_first_break: bool,
}

/// First entry whose recomputed hash disagrees with its stored hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakPoint {
    /// Entry identifier.
    pub entry_id: AuditEntryId,
    /// Zero-based position in the walked chain.
    pub position: usize,
    /// Stored hash.
    pub stored_hash: String,
    /// Recomputed hash.
    pub computed_hash: String,
    /// Failure description.
    pub description: String,
}

/// Full verification report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// True when no entry failed verification.
    pub is_valid: bool,
    /// Entries stored in the chain.
    pub total_entries: u64,
    /// Hashed entries checked.
    pub entries_verified: u64,
    /// Hashed entries that matched.
    pub valid_entries: u64,
    /// Hashed entries that did not match.
    pub invalid_entries: u64,
    /// Legacy entries without hash fields.
    pub entries_without_hash: u64,
    /// First break, if any.
    pub break_point: Option<BreakPoint>,
    /// Chain seed of the first hashed entry.
    pub chain_seed: Option<String>,
    /// Start time in unix milliseconds.
    pub verification_started_at: i64,
    /// Completion time in unix milliseconds.
    pub verification_completed_at: i64,
    /// Elapsed time in milliseconds.
    pub duration_ms: u64,
}

/// Single-entry verification report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryVerification {
    /// Entry identifier.
    pub entry_id: AuditEntryId,
    /// True when the stored hash matches.
    pub is_valid: bool,
    /// True when the entry carries a hash.
    pub has_hash: bool,
    /// Previous hash used for recomputation.
    pub previous_hash: Option<String>,
    /// Stored hash.
    pub stored_hash: Option<String>,
    /// Recomputed hash.
    pub computed_hash: Option<String>,
    /// Outcome description.
    pub description: String,
}

/// Quick health check report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickCheckResult {
    /// True when the seed exists and every sampled entry verified.
    pub is_likely_valid: bool,
    /// True when the chain has a seed.
    pub has_chain_seed: bool,
    /// Entries sampled from the chain start.
    pub sampled_entries: u64,
    /// True when the latest entry verified against its predecessor.
    pub latest_entry_valid: Option<bool>,
    /// Summary of findings.
    pub details: String,
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Hash chain verifier for one audit chain.
#[derive(Clone)]
pub struct HashChainVerifier {
    /// Backing store.
    store: Arc<dyn AuditStore>,
    /// Chain verified.
    chain_id: ChainId,
    /// Time source for report timestamps.
    clock: Arc<dyn Clock>,
}

impl HashChainVerifier {
    /// Creates a verifier for a chain.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, chain_id: ChainId, clock: Arc<dyn Clock>) -> Self {
        Self { store, chain_id, clock }
    }

    /// Walks the chain and reports the first break.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when entries cannot be read.
    pub fn verify_hash_chain(&self, options: VerifyOptions) -> Result<VerificationResult, StoreError> {
        let started = Instant::now();
        let verification_started_at = self.clock.now_ms();
        let total_entries = self.store.count(&self.chain_id)?;
        let entries = self.store.load_chain(&self.chain_id, options.limit)?;
        let stored_seed = self.store.chain_seed(&self.chain_id)?;

        let mut entries_verified = 0_u64;
        let mut valid_entries = 0_u64;
        let mut invalid_entries = 0_u64;
        let mut entries_without_hash = 0_u64;
        let mut break_point = None;
        let mut chain_seed = stored_seed.clone();
        let mut previous: Option<String> = None;

        for (position, entry) in entries.iter().enumerate() {
            let Some(stored_hash) = entry.log_hash.as_deref() else {
                entries_without_hash += 1;
                continue;
            };
            entries_verified += 1;
            let expected_previous = match previous.take() {
                Some(hash) => Some(hash),
                None => {
                    let seed = entry.chain_seed.clone().or_else(|| stored_seed.clone());
                    chain_seed = seed.clone();
                    seed
                }
            };
            let outcome = check_entry(entry, stored_hash, expected_previous.as_deref());
            previous = Some(stored_hash.to_string());
            match outcome {
                Ok(()) => valid_entries += 1,
                Err(failure) => {
                    invalid_entries += 1;
                    if break_point.is_none() {
                        break_point = Some(BreakPoint {
                            entry_id: entry.id.clone(),
                            position,
                            stored_hash: stored_hash.to_string(),
                            computed_hash: failure.computed_hash,
                            description: failure.description,
                        });
                    }
                    if options.stop_on_first_break {
                        break;
                    }
                }
            }
        }

        Ok(VerificationResult {
            is_valid: invalid_entries == 0,
            total_entries,
            entries_verified,
            valid_entries,
            invalid_entries,
            entries_without_hash,
            break_point,
            chain_seed,
            verification_started_at,
            verification_completed_at: self.clock.now_ms(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Confirms a seed exists and spot-checks the chain start and latest entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when entries cannot be read.
    pub fn quick_integrity_check(&self, sample_size: usize) -> Result<QuickCheckResult, StoreError> {
        let total = self.store.count(&self.chain_id)?;
        if total == 0 {
            return Ok(QuickCheckResult {
                is_likely_valid: true,
                has_chain_seed: false,
                sampled_entries: 0,
                latest_entry_valid: None,
                details: "chain is empty".to_string(),
            });
        }
        let has_chain_seed = self.store.chain_seed(&self.chain_id)?.is_some();
        let sample = self.verify_hash_chain(VerifyOptions {
            limit: Some(sample_size.max(1)),
            stop_on_first_break: true,
        })?;
        let latest_entry_valid = match self.store.last_entry(&self.chain_id)? {
            Some(entry) if entry.is_hashed() => {
                self.verify_entry(&entry.id)?.map(|verification| verification.is_valid)
            }
            _ => None,
        };
        let hashed_entries_exist = sample.entries_verified > 0 || latest_entry_valid.is_some();
        let mut findings = Vec::new();
        if hashed_entries_exist && !has_chain_seed {
            findings.push("chain seed missing".to_string());
        }
        if let Some(point) = &sample.break_point {
            findings.push(format!("break at position {}: {}", point.position, point.description));
        }
        if latest_entry_valid == Some(false) {
            findings.push("latest entry failed verification".to_string());
        }
        let is_likely_valid = findings.is_empty();
        let details = if is_likely_valid {
            format!("sampled {} entries; no breaks found", sample.entries_verified + sample.entries_without_hash)
        } else {
            findings.join("; ")
        };
        Ok(QuickCheckResult {
            is_likely_valid,
            has_chain_seed,
            sampled_entries: sample.entries_verified + sample.entries_without_hash,
            latest_entry_valid,
            details,
        })
    }

    /// Verifies one entry against its predecessor's stored hash.
    ///
    /// The first hashed entry is verified against the chain seed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when entries cannot be read.
    pub fn verify_entry(
        &self,
        entry_id: &AuditEntryId,
    ) -> Result<Option<EntryVerification>, StoreError> {
        let Some(entry) = self.store.get_entry(&self.chain_id, entry_id)? else {
            return Ok(None);
        };
        let Some(stored_hash) = entry.log_hash.clone() else {
            return Ok(Some(EntryVerification {
                entry_id: entry.id,
                is_valid: false,
                has_hash: false,
                previous_hash: None,
                stored_hash: None,
                computed_hash: None,
                description: "entry has no hash".to_string(),
            }));
        };
        let previous_hash = match self.store.previous_hashed_entry(&self.chain_id, entry_id)? {
            Some(previous) => previous.log_hash,
            None => match entry.chain_seed.clone() {
                Some(seed) => Some(seed),
                None => self.store.chain_seed(&self.chain_id)?,
            },
        };
        let outcome = check_entry(&entry, &stored_hash, previous_hash.as_deref());
        let (is_valid, computed_hash, description) = match outcome {
            Ok(()) => (true, Some(stored_hash.clone()), "entry hash verified".to_string()),
            Err(failure) => {
                let computed = (!failure.computed_hash.is_empty()).then_some(failure.computed_hash);
                (false, computed, failure.description)
            }
        };
        Ok(Some(EntryVerification {
            entry_id: entry.id,
            is_valid,
            has_hash: true,
            previous_hash,
            stored_hash: Some(stored_hash),
            computed_hash,
            description,
        }))
    }
}

// ============================================================================
// SECTION: Entry Checks
// ============================================================================

/// Details of a failed entry check.
struct EntryFailure {
    /// Recomputed hash, empty when it could not be computed.
    computed_hash: String,
    /// Failure description.
    description: String,
}

/// Recomputes an entry hash and checks its link to the previous hash.
fn check_entry(
    entry: &AuditLogEntry,
    stored_hash: &str,
    expected_previous: Option<&str>,
) -> Result<(), EntryFailure> {
    let Some(expected_previous) = expected_previous else {
        return Err(EntryFailure {
            computed_hash: String::new(),
            description: "chain seed missing for first hashed entry".to_string(),
        });
    };
    let computed_hash = entry.compute_log_hash(expected_previous).map_err(|err| EntryFailure {
        computed_hash: String::new(),
        description: err.to_string(),
    })?;
    let hash_matches: bool = computed_hash.as_bytes().ct_eq(stored_hash.as_bytes()).into();
    if !hash_matches {
        return Err(EntryFailure {
            computed_hash,
            description: "stored hash does not match recomputed hash".to_string(),
        });
    }
    let link_matches = entry.previous_log_hash.as_deref().is_some_and(|previous| {
        bool::from(previous.as_bytes().ct_eq(expected_previous.as_bytes()))
    });
    if !link_matches {
        return Err(EntryFailure {
            computed_hash,
            description: "previous hash does not link to the preceding entry".to_string(),
        });
    }
    Ok(())
}
