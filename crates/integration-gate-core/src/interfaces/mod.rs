// crates/integration-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Integration Gate Interfaces
// Description: Backend-agnostic seams for stores, transport, and crypto.
// Purpose: Let the execution pipeline run against any registry or storage.
// Dependencies: crate::core, serde, thiserror, url
// ============================================================================

//! ## Overview
//! The execution pipeline only talks to the outside world through these
//! traits. Implementations must be `Send + Sync`; the in-memory versions live
//! in [`crate::runtime::store`] and durable adapters in sibling crates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::core::AgentId;
use crate::core::AuditEntryId;
use crate::core::AuditLogEntry;
use crate::core::ChainHead;
use crate::core::ChainId;
use crate::core::ConnectionId;
use crate::core::HttpMethod;
use crate::core::LoadedConnection;
use crate::core::ToolGrant;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Store errors shared by registries, counters, and audit storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Stored data version is incompatible.
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
    /// Stored or supplied data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Store capacity exhausted.
    #[error("store capacity exhausted: {0}")]
    Capacity(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Registries
// ============================================================================

/// Loads connections together with their provider configuration.
pub trait ConnectionLoader: Send + Sync {
    /// Loads a connection by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry cannot be read.
    fn load_connection(
        &self,
        connection_id: &ConnectionId,
    ) -> Result<Option<LoadedConnection>, StoreError>;
}

/// Loads agent grants for a connection.
pub trait GrantStore: Send + Sync {
    /// Loads the grant for an agent on a connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the registry cannot be read.
    fn load_grant(
        &self,
        agent_id: Option<&AgentId>,
        connection_id: &ConnectionId,
    ) -> Result<Option<ToolGrant>, StoreError>;
}

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Decrypted connection credentials.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    /// Creates credentials from a field map.
    #[must_use]
    pub const fn new(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }

    /// Returns a credential field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Returns true when no fields are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying field map.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").field("fields", &self.0.keys().collect::<Vec<_>>()).finish()
    }
}

/// Credential codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// Key material is invalid.
    #[error("invalid credential key: {0}")]
    InvalidKey(String),
    /// Stored blob is not valid base64 or is truncated.
    #[error("malformed credential blob: {0}")]
    Malformed(String),
    /// Authentication tag check failed.
    #[error("credential decryption failed")]
    DecryptionFailed,
    /// Encryption failed.
    #[error("credential encryption failed")]
    EncryptionFailed,
    /// Plaintext is not a credential object.
    #[error("invalid credential payload: {0}")]
    InvalidPayload(String),
}

/// Decrypts stored connection credentials.
pub trait CredentialCodec: Send + Sync {
    /// Decrypts a stored credential blob.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when the blob cannot be opened.
    fn decrypt(&self, ciphertext: &str) -> Result<Credentials, CredentialError>;
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Encoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    /// Content type header value.
    pub content_type: String,
    /// Encoded body bytes.
    pub bytes: Vec<u8>,
}

/// Fully built outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute request URL including query.
    pub url: Url,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Request body.
    pub body: Option<RequestBody>,
}

/// Upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers with lowercase names.
    pub headers: BTreeMap<String, String>,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns the content type header, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Transport failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpExecutionError {
    /// Request exceeded its timeout.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Upstream could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// Egress policy rejected the request.
    #[error("request blocked: {0}")]
    Blocked(String),
    /// Response arrived but its body could not be read.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Upstream status, when headers were received.
        status: Option<u16>,
        /// Failure detail.
        message: String,
    },
}

/// Executes outbound HTTP requests.
pub trait HttpExecutor: Send + Sync {
    /// Executes a request with the given timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HttpExecutionError`] when no response is obtained.
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, HttpExecutionError>;
}

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Result of an atomic check-and-increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDecision {
    /// True when the hit was recorded.
    pub allowed: bool,
    /// Hits remaining in the current window after this call.
    pub remaining: u32,
    /// Milliseconds until a slot frees, when rejected.
    pub retry_after_ms: Option<u64>,
}

/// Sliding-window counters for rate limiting.
pub trait CounterStore: Send + Sync {
    /// Records a hit if fewer than `max` hits exist in the window ending at `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the counter cannot be updated.
    fn check_and_increment(
        &self,
        key: &str,
        window_ms: u64,
        max: u32,
        now_ms: i64,
    ) -> Result<CounterDecision, StoreError>;

    /// Clears all hits for a key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the counter cannot be cleared.
    fn reset(&self, key: &str) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Audit Storage
// ============================================================================

/// Builds the next entry from the current chain head.
pub type LinkFn<'a> = dyn FnMut(&ChainHead) -> Result<AuditLogEntry, StoreError> + 'a;

/// Append-only storage for hash-chained audit entries.
pub trait AuditStore: Send + Sync {
    /// Appends an entry built from the chain head, serialized per chain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the head cannot be read or the entry persisted.
    fn append_linked(
        &self,
        chain_id: &ChainId,
        link: &mut LinkFn<'_>,
    ) -> Result<AuditLogEntry, StoreError>;

    /// Loads entries oldest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when entries cannot be read.
    fn load_chain(
        &self,
        chain_id: &ChainId,
        limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Loads one entry by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the entry cannot be read.
    fn get_entry(
        &self,
        chain_id: &ChainId,
        entry_id: &AuditEntryId,
    ) -> Result<Option<AuditLogEntry>, StoreError>;

    /// Loads the nearest hashed entry written before `entry_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when entries cannot be read.
    fn previous_hashed_entry(
        &self,
        chain_id: &ChainId,
        entry_id: &AuditEntryId,
    ) -> Result<Option<AuditLogEntry>, StoreError>;

    /// Loads the most recently written entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when entries cannot be read.
    fn last_entry(&self, chain_id: &ChainId) -> Result<Option<AuditLogEntry>, StoreError>;

    /// Returns the chain seed stored on the first hashed entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when entries cannot be read.
    fn chain_seed(&self, chain_id: &ChainId) -> Result<Option<String>, StoreError>;

    /// Returns the number of entries in the chain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when entries cannot be counted.
    fn count(&self, chain_id: &ChainId) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time source in unix milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current time in unix milliseconds.
    fn now_ms(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
    }
}
