// crates/integration-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Gateway Store
// Description: Durable audit chains and rate limit counters backed by SQLite WAL.
// Purpose: Persist hash-chained audit entries and sliding-window hits.
// Dependencies: integration-gate-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Audit entries are stored as JSON blobs in an append-only table ordered by
//! an autoincrement sequence. Chain appends read the head and insert the new
//! entry in one `IMMEDIATE` transaction, so two writers can never link to the
//! same predecessor. Counter hits are stored per key and pruned as windows
//! slide. Loads fail closed on oversized or mismatched rows.

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use integration_gate_core::AuditEntryId;
use integration_gate_core::AuditLogEntry;
use integration_gate_core::AuditStore;
use integration_gate_core::ChainHead;
use integration_gate_core::ChainId;
use integration_gate_core::CounterDecision;
use integration_gate_core::CounterStore;
use integration_gate_core::LinkFn;
use integration_gate_core::StoreError;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized audit entry size accepted by the store.
pub const MAX_ENTRY_BYTES: usize = 256 * 1024;

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` gateway store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config with default pragmas for a database path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row does not match its key.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Stored entry exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "entry_json exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps an engine error.
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err callback.")]
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================//
// SECTION: Shared Connection
// ============================================================================//

/// Opened database shared by the store handles.
#[derive(Clone)]
struct SharedConnection {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SharedConnection {
    /// Opens and initializes the database.
    fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

// ============================================================================//
// SECTION: Audit Store
// ============================================================================//

/// `SQLite`-backed append-only audit chains.
#[derive(Clone)]
pub struct SqliteAuditStore {
    /// Database handle.
    shared: SharedConnection,
}

impl SqliteAuditStore {
    /// Opens an `SQLite`-backed audit store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Ok(Self {
            shared: SharedConnection::open(config)?,
        })
    }

    /// Appends previously persisted entries verbatim, without linking.
    ///
    /// Used to migrate entries written before chain hashing existed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when an entry belongs to another chain or
    /// cannot be written.
    pub fn import_legacy(
        &self,
        chain_id: &ChainId,
        entries: impl IntoIterator<Item = AuditLogEntry>,
    ) -> Result<u64, SqliteStoreError> {
        let mut guard = self.shared.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
        let mut imported = 0_u64;
        for entry in entries {
            insert_entry(&tx, chain_id, &entry)?;
            imported += 1;
        }
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(imported)
    }

    /// Appends an entry produced by `link` against the current chain head.
    fn append_entry(
        &self,
        chain_id: &ChainId,
        link: &mut LinkFn<'_>,
    ) -> Result<AuditLogEntry, StoreError> {
        let mut guard = self.shared.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
        let head: Option<(String, i64)> = tx
            .query_row(
                "SELECT log_hash, timestamp_ms FROM audit_entries WHERE chain_id = ?1 AND \
                 log_hash IS NOT NULL ORDER BY seq DESC LIMIT 1",
                params![chain_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(db_error)?;
        let head = head.map_or(ChainHead::Empty, |(log_hash, timestamp_ms)| ChainHead::Linked {
            log_hash,
            timestamp_ms,
        });
        let entry = link(&head)?;
        insert_entry(&tx, chain_id, &entry)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(entry)
    }

    /// Runs a query returning entry rows and decodes them.
    fn query_entries(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<AuditLogEntry>, SqliteStoreError> {
        let guard = self.shared.lock()?;
        let mut statement = guard.prepare(sql).map_err(db_error)?;
        let rows = statement
            .query_map(params, |row| {
                let entry_id: String = row.get(0)?;
                let length: i64 = row.get(1)?;
                let bytes: Vec<u8> = row.get(2)?;
                Ok((entry_id, length, bytes))
            })
            .map_err(db_error)?;
        let mut entries = Vec::new();
        for row in rows {
            let (entry_id, length, bytes) = row.map_err(db_error)?;
            entries.push(decode_entry(&entry_id, length, &bytes)?);
        }
        Ok(entries)
    }

    /// Runs a query returning at most one entry row.
    fn query_entry(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<AuditLogEntry>, SqliteStoreError> {
        Ok(self.query_entries(sql, params)?.into_iter().next())
    }
}

impl AuditStore for SqliteAuditStore {
    fn append_linked(
        &self,
        chain_id: &ChainId,
        link: &mut LinkFn<'_>,
    ) -> Result<AuditLogEntry, StoreError> {
        self.append_entry(chain_id, link)
    }

    fn load_chain(
        &self,
        chain_id: &ChainId,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        let limit = limit.map_or(Ok(-1), i64::try_from).map_err(|_| {
            StoreError::Invalid("load limit too large".to_string())
        })?;
        Ok(self.query_entries(
            "SELECT entry_id, length(entry_json), entry_json FROM audit_entries WHERE chain_id = \
             ?1 ORDER BY seq ASC LIMIT ?2",
            params![chain_id.as_str(), limit],
        )?)
    }

    fn get_entry(
        &self,
        chain_id: &ChainId,
        entry_id: &AuditEntryId,
    ) -> Result<Option<AuditLogEntry>, StoreError> {
        Ok(self.query_entry(
            "SELECT entry_id, length(entry_json), entry_json FROM audit_entries WHERE chain_id = \
             ?1 AND entry_id = ?2",
            params![chain_id.as_str(), entry_id.as_str()],
        )?)
    }

    fn previous_hashed_entry(
        &self,
        chain_id: &ChainId,
        entry_id: &AuditEntryId,
    ) -> Result<Option<AuditLogEntry>, StoreError> {
        Ok(self.query_entry(
            "SELECT entry_id, length(entry_json), entry_json FROM audit_entries WHERE chain_id = \
             ?1 AND log_hash IS NOT NULL AND seq < (SELECT seq FROM audit_entries WHERE chain_id \
             = ?1 AND entry_id = ?2) ORDER BY seq DESC LIMIT 1",
            params![chain_id.as_str(), entry_id.as_str()],
        )?)
    }

    fn last_entry(&self, chain_id: &ChainId) -> Result<Option<AuditLogEntry>, StoreError> {
        Ok(self.query_entry(
            "SELECT entry_id, length(entry_json), entry_json FROM audit_entries WHERE chain_id = \
             ?1 ORDER BY seq DESC LIMIT 1",
            params![chain_id.as_str()],
        )?)
    }

    fn chain_seed(&self, chain_id: &ChainId) -> Result<Option<String>, StoreError> {
        let guard = self.shared.lock()?;
        let seed: Option<Option<String>> = guard
            .query_row(
                "SELECT chain_seed FROM audit_entries WHERE chain_id = ?1 AND log_hash IS NOT \
                 NULL ORDER BY seq ASC LIMIT 1",
                params![chain_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        drop(guard);
        Ok(seed.flatten())
    }

    fn count(&self, chain_id: &ChainId) -> Result<u64, StoreError> {
        let guard = self.shared.lock()?;
        let count: i64 = guard
            .query_row(
                "SELECT COUNT(*) FROM audit_entries WHERE chain_id = ?1",
                params![chain_id.as_str()],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        drop(guard);
        u64::try_from(count).map_err(|_| StoreError::Corrupt("negative entry count".to_string()))
    }
}

/// Inserts one entry inside an open transaction.
fn insert_entry(
    tx: &Transaction<'_>,
    chain_id: &ChainId,
    entry: &AuditLogEntry,
) -> Result<(), SqliteStoreError> {
    if &entry.chain_id != chain_id {
        return Err(SqliteStoreError::Invalid(format!(
            "entry {} belongs to chain {}",
            entry.id, entry.chain_id
        )));
    }
    let entry_json =
        serde_json::to_vec(entry).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if entry_json.len() > MAX_ENTRY_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_ENTRY_BYTES,
            actual_bytes: entry_json.len(),
        });
    }
    tx.execute(
        "INSERT INTO audit_entries (chain_id, entry_id, timestamp_ms, log_hash, chain_seed, \
         entry_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chain_id.as_str(),
            entry.id.as_str(),
            entry.timestamp_ms,
            entry.log_hash,
            entry.chain_seed,
            entry_json
        ],
    )
    .map_err(db_error)?;
    Ok(())
}

/// Decodes a stored entry row.
fn decode_entry(
    entry_id: &str,
    length: i64,
    bytes: &[u8],
) -> Result<AuditLogEntry, SqliteStoreError> {
    let length = usize::try_from(length).map_err(|_| {
        SqliteStoreError::Invalid(format!("negative entry length for entry {entry_id}"))
    })?;
    if length > MAX_ENTRY_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_ENTRY_BYTES,
            actual_bytes: length,
        });
    }
    let entry: AuditLogEntry =
        serde_json::from_slice(bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
    if entry.id.as_str() != entry_id {
        return Err(SqliteStoreError::Corrupt(
            "entry_id mismatch between key and payload".to_string(),
        ));
    }
    Ok(entry)
}

// ============================================================================//
// SECTION: Counter Store
// ============================================================================//

/// `SQLite`-backed sliding-window counters.
#[derive(Clone)]
pub struct SqliteCounterStore {
    /// Database handle.
    shared: SharedConnection,
}

impl SqliteCounterStore {
    /// Opens an `SQLite`-backed counter store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Ok(Self {
            shared: SharedConnection::open(config)?,
        })
    }

    /// Deletes hits older than the window across all keys.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the delete fails.
    pub fn prune_expired(&self, window_ms: u64, now_ms: i64) -> Result<u64, SqliteStoreError> {
        let cutoff = now_ms.saturating_sub(window_as_i64(window_ms));
        let guard = self.shared.lock()?;
        let removed = guard
            .execute("DELETE FROM rate_limit_hits WHERE hit_ms <= ?1", params![cutoff])
            .map_err(db_error)?;
        drop(guard);
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    /// Checks and records a hit inside one write transaction.
    fn check_hit(
        &self,
        key: &str,
        window_ms: u64,
        max: u32,
        now_ms: i64,
    ) -> Result<CounterDecision, SqliteStoreError> {
        let window = window_as_i64(window_ms);
        let cutoff = now_ms.saturating_sub(window);
        let mut guard = self.shared.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
        tx.execute(
            "DELETE FROM rate_limit_hits WHERE key = ?1 AND hit_ms <= ?2",
            params![key, cutoff],
        )
        .map_err(db_error)?;
        let (used, oldest): (i64, Option<i64>) = tx
            .query_row(
                "SELECT COUNT(*), MIN(hit_ms) FROM rate_limit_hits WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(db_error)?;
        let used = u32::try_from(used).unwrap_or(u32::MAX);
        let decision = if used >= max {
            let retry_after_ms = oldest.map_or(window_ms, |first| {
                u64::try_from(first.saturating_add(window).saturating_sub(now_ms)).unwrap_or(1)
            });
            CounterDecision {
                allowed: false,
                remaining: 0,
                retry_after_ms: Some(retry_after_ms.max(1)),
            }
        } else {
            tx.execute(
                "INSERT INTO rate_limit_hits (key, hit_ms) VALUES (?1, ?2)",
                params![key, now_ms],
            )
            .map_err(db_error)?;
            CounterDecision {
                allowed: true,
                remaining: max - used - 1,
                retry_after_ms: None,
            }
        };
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(decision)
    }
}

impl CounterStore for SqliteCounterStore {
    fn check_and_increment(
        &self,
        key: &str,
        window_ms: u64,
        max: u32,
        now_ms: i64,
    ) -> Result<CounterDecision, StoreError> {
        Ok(self.check_hit(key, window_ms, max, now_ms)?)
    }

    fn reset(&self, key: &str) -> Result<(), StoreError> {
        let guard = self.shared.lock()?;
        guard
            .execute("DELETE FROM rate_limit_hits WHERE key = ?1", params![key])
            .map_err(db_error)?;
        drop(guard);
        Ok(())
    }
}

/// Converts a window length to signed milliseconds.
fn window_as_i64(window_ms: u64) -> i64 {
    i64::try_from(window_ms).unwrap_or(i64::MAX)
}

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate).map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS audit_entries (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    chain_id TEXT NOT NULL,
                    entry_id TEXT NOT NULL UNIQUE,
                    timestamp_ms INTEGER NOT NULL,
                    log_hash TEXT,
                    chain_seed TEXT,
                    entry_json BLOB NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_audit_entries_chain
                    ON audit_entries (chain_id, seq);
                CREATE TABLE IF NOT EXISTS rate_limit_hits (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    key TEXT NOT NULL,
                    hit_ms INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_rate_limit_hits_key
                    ON rate_limit_hits (key, hit_ms);",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

// ============================================================================//
// SECTION: Tests
// ============================================================================//

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]
mod tests {
    use super::*;

    #[test]
    fn overlong_path_components_are_rejected() {
        let long = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let err = validate_store_path(Path::new(&long)).unwrap_err();
        assert!(matches!(err, SqliteStoreError::Invalid(_)));
    }

    #[test]
    fn oversized_rows_fail_closed() {
        let err = decode_entry("id", i64::try_from(MAX_ENTRY_BYTES + 1).unwrap(), b"{}").unwrap_err();
        assert!(matches!(err, SqliteStoreError::TooLarge { .. }));
    }
}
