// crates/integration-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Integration Gate In-Memory Stores
// Description: In-memory registries, counters, and audit storage.
// Purpose: Provide deterministic store implementations without external deps.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! These stores back tests, local tooling, and single-process deployments.
//! Every mutation happens under one mutex, which makes counter
//! check-and-increment and audit head-read-then-append atomic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AgentId;
use crate::core::AuditEntryId;
use crate::core::AuditLogEntry;
use crate::core::ChainHead;
use crate::core::ChainId;
use crate::core::Connection;
use crate::core::ConnectionId;
use crate::core::IntegrationProviderConfig;
use crate::core::LoadedConnection;
use crate::core::ProviderId;
use crate::core::ToolGrant;
use crate::interfaces::AuditStore;
use crate::interfaces::ConnectionLoader;
use crate::interfaces::CounterDecision;
use crate::interfaces::CounterStore;
use crate::interfaces::GrantStore;
use crate::interfaces::LinkFn;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Connection Registry
// ============================================================================

/// Registry contents guarded together.
#[derive(Debug, Default)]
struct RegistryState {
    /// Provider configurations.
    providers: BTreeMap<ProviderId, IntegrationProviderConfig>,
    /// Connections.
    connections: BTreeMap<ConnectionId, Connection>,
    /// Grants keyed by connection then agent.
    grants: BTreeMap<(ConnectionId, Option<AgentId>), ToolGrant>,
}

/// In-memory provider, connection, and grant registry.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConnectionRegistry {
    /// Registry state protected by a mutex.
    state: Arc<Mutex<RegistryState>>,
}

impl InMemoryConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a provider.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry lock is poisoned.
    pub fn upsert_provider(&self, provider: IntegrationProviderConfig) -> Result<(), StoreError> {
        self.lock()?.providers.insert(provider.id.clone(), provider);
        Ok(())
    }

    /// Registers or replaces a connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry lock is poisoned.
    pub fn upsert_connection(&self, connection: Connection) -> Result<(), StoreError> {
        self.lock()?.connections.insert(connection.id.clone(), connection);
        Ok(())
    }

    /// Registers or replaces a grant for an agent on a connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry lock is poisoned.
    pub fn upsert_grant(
        &self,
        connection_id: ConnectionId,
        agent_id: Option<AgentId>,
        grant: ToolGrant,
    ) -> Result<(), StoreError> {
        self.lock()?.grants.insert((connection_id, agent_id), grant);
        Ok(())
    }

    /// Removes a grant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry lock is poisoned.
    pub fn remove_grant(
        &self,
        connection_id: &ConnectionId,
        agent_id: Option<&AgentId>,
    ) -> Result<Option<ToolGrant>, StoreError> {
        Ok(self.lock()?.grants.remove(&(connection_id.clone(), agent_id.cloned())))
    }

    /// Locks the registry state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("connection registry mutex poisoned".to_string()))
    }
}

impl ConnectionLoader for InMemoryConnectionRegistry {
    fn load_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<LoadedConnection>, StoreError> {
        let guard = self.lock()?;
        let Some(connection) = guard.connections.get(connection_id) else {
            return Ok(None);
        };
        let provider = guard.providers.get(&connection.provider_id).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "connection {connection_id} references unknown provider {}",
                connection.provider_id
            ))
        })?;
        Ok(Some(LoadedConnection { connection: connection.clone(), provider: provider.clone() }))
    }
}

impl GrantStore for InMemoryConnectionRegistry {
    fn load_grant(
        &self,
        agent_id: Option<&AgentId>,
        connection_id: &ConnectionId,
    ) -> Result<Option<ToolGrant>, StoreError> {
        Ok(self.lock()?.grants.get(&(connection_id.clone(), agent_id.cloned())).cloned())
    }
}

// ============================================================================
// SECTION: Counter Store
// ============================================================================

/// Default maximum number of tracked counter keys.
pub const DEFAULT_MAX_COUNTER_KEYS: usize = 65_536;

/// In-memory sliding-log counters.
#[derive(Debug, Clone)]
pub struct InMemoryCounterStore {
    /// Hit timestamps per key, oldest first.
    hits: Arc<Mutex<BTreeMap<String, VecDeque<i64>>>>,
    /// Maximum tracked keys.
    max_entries: usize,
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COUNTER_KEYS)
    }
}

impl InMemoryCounterStore {
    /// Creates a counter store tracking at most `max_entries` keys.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self { hits: Arc::new(Mutex::new(BTreeMap::new())), max_entries: max_entries.max(1) }
    }
}

impl CounterStore for InMemoryCounterStore {
    fn check_and_increment(
        &self,
        key: &str,
        window_ms: u64,
        max: u32,
        now_ms: i64,
    ) -> Result<CounterDecision, StoreError> {
        let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(window);
        let mut guard = self
            .hits
            .lock()
            .map_err(|_| StoreError::Store("counter store mutex poisoned".to_string()))?;
        if !guard.contains_key(key) && guard.len() >= self.max_entries {
            guard.retain(|_, hits| hits.back().is_some_and(|last| *last > cutoff));
            if guard.len() >= self.max_entries {
                return Ok(CounterDecision {
                    allowed: false,
                    remaining: 0,
                    retry_after_ms: Some(window_ms),
                });
            }
        }
        let hits = guard.entry(key.to_string()).or_default();
        while hits.front().is_some_and(|first| *first <= cutoff) {
            hits.pop_front();
        }
        let used = u32::try_from(hits.len()).unwrap_or(u32::MAX);
        if used >= max {
            let retry_after_ms = hits
                .front()
                .map_or(window_ms, |first| u64::try_from(first + window - now_ms).unwrap_or(1));
            return Ok(CounterDecision {
                allowed: false,
                remaining: 0,
                retry_after_ms: Some(retry_after_ms.max(1)),
            });
        }
        hits.push_back(now_ms);
        Ok(CounterDecision { allowed: true, remaining: max - used - 1, retry_after_ms: None })
    }

    fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.hits
            .lock()
            .map_err(|_| StoreError::Store("counter store mutex poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit Store
// ============================================================================

/// In-memory append-only audit chains.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditStore {
    /// Entries per chain in write order.
    chains: Arc<Mutex<BTreeMap<ChainId, Vec<AuditLogEntry>>>>,
}

impl InMemoryAuditStore {
    /// Creates an empty audit store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends previously persisted entries verbatim, without linking.
    ///
    /// Used to migrate entries written before chain hashing existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when an entry belongs to another chain.
    pub fn import_legacy(
        &self,
        chain_id: &ChainId,
        entries: impl IntoIterator<Item = AuditLogEntry>,
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let chain = guard.entry(chain_id.clone()).or_default();
        for entry in entries {
            if &entry.chain_id != chain_id {
                return Err(StoreError::Invalid(format!(
                    "entry {} belongs to chain {}",
                    entry.id, entry.chain_id
                )));
            }
            chain.push(entry);
        }
        Ok(())
    }

    /// Locks the chain map.
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<ChainId, Vec<AuditLogEntry>>>, StoreError> {
        self.chains.lock().map_err(|_| StoreError::Store("audit store mutex poisoned".to_string()))
    }
}

impl AuditStore for InMemoryAuditStore {
    fn append_linked(
        &self,
        chain_id: &ChainId,
        link: &mut LinkFn<'_>,
    ) -> Result<AuditLogEntry, StoreError> {
        let mut guard = self.lock()?;
        let chain = guard.entry(chain_id.clone()).or_default();
        let head = chain
            .iter()
            .rev()
            .find_map(|entry| entry.log_hash.clone().map(|log_hash| (log_hash, entry.timestamp_ms)))
            .map_or(ChainHead::Empty, |(log_hash, timestamp_ms)| ChainHead::Linked {
                log_hash,
                timestamp_ms,
            });
        let entry = link(&head)?;
        chain.push(entry.clone());
        Ok(entry)
    }

    fn load_chain(
        &self,
        chain_id: &ChainId,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        let guard = self.lock()?;
        let entries = guard.get(chain_id).map_or(&[][..], Vec::as_slice);
        let take = limit.unwrap_or(entries.len()).min(entries.len());
        Ok(entries[.. take].to_vec())
    }

    fn get_entry(
        &self,
        chain_id: &ChainId,
        entry_id: &AuditEntryId,
    ) -> Result<Option<AuditLogEntry>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .get(chain_id)
            .and_then(|entries| entries.iter().find(|entry| &entry.id == entry_id))
            .cloned())
    }

    fn previous_hashed_entry(
        &self,
        chain_id: &ChainId,
        entry_id: &AuditEntryId,
    ) -> Result<Option<AuditLogEntry>, StoreError> {
        let guard = self.lock()?;
        let Some(entries) = guard.get(chain_id) else {
            return Ok(None);
        };
        let Some(position) = entries.iter().position(|entry| &entry.id == entry_id) else {
            return Ok(None);
        };
        Ok(entries[.. position].iter().rev().find(|entry| entry.is_hashed()).cloned())
    }

    fn last_entry(&self, chain_id: &ChainId) -> Result<Option<AuditLogEntry>, StoreError> {
        Ok(self.lock()?.get(chain_id).and_then(|entries| entries.last()).cloned())
    }

    fn chain_seed(&self, chain_id: &ChainId) -> Result<Option<String>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .get(chain_id)
            .and_then(|entries| entries.iter().find(|entry| entry.is_hashed()))
            .and_then(|entry| entry.chain_seed.clone()))
    }

    fn count(&self, chain_id: &ChainId) -> Result<u64, StoreError> {
        let guard = self.lock()?;
        Ok(guard.get(chain_id).map_or(0, |entries| u64::try_from(entries.len()).unwrap_or(u64::MAX)))
    }
}
