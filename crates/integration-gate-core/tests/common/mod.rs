// crates/integration-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fakes and fixtures for gateway tests.
// Purpose: Provide recording dependencies and a deterministic clock.
// Dependencies: integration-gate-core
// ============================================================================

//! ## Overview
//! Fixtures build a small issue-tracker provider with read, write, and
//! dangerous tools. Fakes record calls so tests can assert which pipeline
//! stages ran.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::mpsc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use integration_gate_core::AuditEntryId;
use integration_gate_core::AuditLogEntry;
use integration_gate_core::AuditStore;
use integration_gate_core::AuthMethod;
use integration_gate_core::ChainId;
use integration_gate_core::Clock;
use integration_gate_core::Connection;
use integration_gate_core::ConnectionId;
use integration_gate_core::ConnectionOverrides;
use integration_gate_core::ConnectionStatus;
use integration_gate_core::CredentialCodec;
use integration_gate_core::CredentialError;
use integration_gate_core::Credentials;
use integration_gate_core::ExecutorConfig;
use integration_gate_core::HttpExecutionConfig;
use integration_gate_core::HttpExecutionError;
use integration_gate_core::HttpExecutor;
use integration_gate_core::HttpMethod;
use integration_gate_core::HttpRequest;
use integration_gate_core::HttpResponse;
use integration_gate_core::IntegrationProviderConfig;
use integration_gate_core::LinkFn;
use integration_gate_core::ParamValue;
use integration_gate_core::ParameterRef;
use integration_gate_core::ProviderId;
use integration_gate_core::StoreError;
use integration_gate_core::ToolCallRequest;
use integration_gate_core::ToolCategory;
use integration_gate_core::ToolDefinition;
use integration_gate_core::ToolExecution;
use integration_gate_core::ToolExecutor;
use integration_gate_core::ToolExecutorDeps;
use integration_gate_core::ToolGrant;
use integration_gate_core::UserId;
use integration_gate_core::create_tool_executor;
use integration_gate_core::runtime::EncryptionKey;
use integration_gate_core::runtime::InMemoryAuditStore;
use integration_gate_core::runtime::InMemoryConnectionRegistry;
use integration_gate_core::runtime::InMemoryCounterStore;
use integration_gate_core::runtime::XChaChaCredentialCodec;
use integration_gate_core::runtime::seal_credentials;
use integration_gate_core::runtime::telemetry::AuditFailureEvent;
use integration_gate_core::runtime::telemetry::GatewayTelemetry;
use integration_gate_core::runtime::telemetry::SagaEvent;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Manually advanced clock.
#[derive(Debug)]
pub struct ManualClock {
    /// Current time in unix milliseconds.
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock at the given time.
    pub fn new(now_ms: i64) -> Self {
        Self { now: AtomicI64::new(now_ms) }
    }

    /// Moves the clock forward.
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: HTTP Fake
// ============================================================================

/// HTTP executor that records requests and replays scripted outcomes.
#[derive(Debug, Default)]
pub struct RecordingHttpExecutor {
    /// Scripted outcomes, consumed in order; the last one repeats.
    script: Mutex<VecDeque<Result<HttpResponse, HttpExecutionError>>>,
    /// Requests seen.
    requests: Mutex<Vec<HttpRequest>>,
    /// Timeouts seen.
    timeouts: Mutex<Vec<Duration>>,
    /// Entry signal and release gate for the next request.
    hold: Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>,
}

impl RecordingHttpExecutor {
    /// Creates an executor answering every call with `200 {"ok":true}`.
    pub fn ok() -> Self {
        Self::scripted(vec![Ok(json_response(200, &json!({"ok": true})))])
    }

    /// Creates an executor replaying the given outcomes.
    pub fn scripted(outcomes: Vec<Result<HttpResponse, HttpExecutionError>>) -> Self {
        Self { script: Mutex::new(outcomes.into()), ..Self::default() }
    }

    /// Returns the number of requests executed.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Returns the recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Returns the recorded timeouts.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    /// Parks the next request until released.
    ///
    /// Returns a receiver signalled once the request is parked and a sender
    /// that lets it continue.
    pub fn hold_next(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.hold.lock().unwrap() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }
}

impl HttpExecutor for RecordingHttpExecutor {
    fn execute(
        &self,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, HttpExecutionError> {
        self.requests.lock().unwrap().push(request.clone());
        self.timeouts.lock().unwrap().push(timeout);
        let hold = self.hold.lock().unwrap().take();
        if let Some((entered, release)) = hold {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            return script.pop_front().unwrap();
        }
        script.front().cloned().unwrap_or_else(|| Ok(json_response(200, &Value::Null)))
    }
}

/// Builds a JSON response.
pub fn json_response(status: u16, body: &Value) -> HttpResponse {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "application/json".to_string());
    HttpResponse { status, headers, body: serde_json::to_vec(body).unwrap() }
}

// ============================================================================
// SECTION: Codec and Telemetry Fakes
// ============================================================================

/// Credential codec that counts decrypt calls.
pub struct CountingCodec {
    /// Wrapped codec.
    inner: XChaChaCredentialCodec,
    /// Decrypt calls.
    calls: AtomicUsize,
}

impl CountingCodec {
    /// Wraps a codec.
    pub fn new(key: EncryptionKey) -> Self {
        Self { inner: XChaChaCredentialCodec::new(key), calls: AtomicUsize::new(0) }
    }

    /// Returns decrypt calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialCodec for CountingCodec {
    fn decrypt(&self, ciphertext: &str) -> Result<Credentials, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(ciphertext)
    }
}

/// Telemetry sink recording events.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    /// Call events.
    pub calls: Mutex<Vec<SagaEvent>>,
    /// Audit failures.
    pub audit_failures: Mutex<Vec<AuditFailureEvent>>,
}

impl GatewayTelemetry for RecordingTelemetry {
    fn record_call(&self, event: &SagaEvent, _latency: Duration) {
        self.calls.lock().unwrap().push(event.clone());
    }

    fn record_audit_failure(&self, event: &AuditFailureEvent) {
        self.audit_failures.lock().unwrap().push(event.clone());
    }
}

/// Audit store whose appends always fail.
#[derive(Debug, Default)]
pub struct UnavailableAuditStore;

impl AuditStore for UnavailableAuditStore {
    fn append_linked(
        &self,
        _chain_id: &ChainId,
        _link: &mut LinkFn<'_>,
    ) -> Result<AuditLogEntry, StoreError> {
        Err(StoreError::Io("audit backend offline".to_string()))
    }

    fn load_chain(
        &self,
        _chain_id: &ChainId,
        _limit: Option<usize>,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        Ok(Vec::new())
    }

    fn get_entry(
        &self,
        _chain_id: &ChainId,
        _entry_id: &AuditEntryId,
    ) -> Result<Option<AuditLogEntry>, StoreError> {
        Ok(None)
    }

    fn previous_hashed_entry(
        &self,
        _chain_id: &ChainId,
        _entry_id: &AuditEntryId,
    ) -> Result<Option<AuditLogEntry>, StoreError> {
        Ok(None)
    }

    fn last_entry(&self, _chain_id: &ChainId) -> Result<Option<AuditLogEntry>, StoreError> {
        Ok(None)
    }

    fn chain_seed(&self, _chain_id: &ChainId) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn count(&self, _chain_id: &ChainId) -> Result<u64, StoreError> {
        Ok(0)
    }
}

// ============================================================================
// SECTION: Provider Fixtures
// ============================================================================

/// Fixed start time for tests.
pub const START_MS: i64 = 1_700_000_000_000;

/// Builds a reference to a tool input field.
pub fn param(name: &str) -> ParamValue {
    ParamValue::Ref(ParameterRef { param: name.to_string(), transform: None, required: false, default: None })
}

/// Builds an HTTP tool.
pub fn http_tool(id: &str, category: ToolCategory, method: HttpMethod, path: &str) -> ToolDefinition {
    ToolDefinition {
        id: id.into(),
        description: None,
        category,
        input_schema: None,
        execution: ToolExecution::Http(HttpExecutionConfig {
            method,
            path_template: path.to_string(),
            query_params: BTreeMap::new(),
            headers: BTreeMap::new(),
            body_template: None,
            body_encoding: integration_gate_core::BodyEncoding::Json,
            timeout_ms: None,
        }),
        output_transform: None,
        rate_limit: None,
        retry: None,
    }
}

/// Issue tracker provider with bearer auth.
pub fn tracker_provider() -> IntegrationProviderConfig {
    let mut create_issue = http_tool("create_issue", ToolCategory::Write, HttpMethod::Post, "/repos/{repo}/issues");
    if let ToolExecution::Http(config) = &mut create_issue.execution {
        config.body_template = Some(json!({"title": {"$param": "title", "required": true}}));
    }
    let mut list_issues = http_tool("list_issues", ToolCategory::Read, HttpMethod::Get, "/repos/{repo}/issues");
    if let ToolExecution::Http(config) = &mut list_issues.execution {
        config.query_params.insert("state".to_string(), param("state"));
    }
    IntegrationProviderConfig {
        id: ProviderId::new("tracker"),
        name: "Tracker".to_string(),
        base_url: "https://api.tracker.test/v1".to_string(),
        auth_method: AuthMethod::BearerToken {
            header_name: "Authorization".to_string(),
            prefix: "Bearer ".to_string(),
        },
        tools: vec![
            list_issues,
            create_issue,
            http_tool("delete_repo", ToolCategory::Dangerous, HttpMethod::Delete, "/repos/{repo}"),
            http_tool("manage_members", ToolCategory::Admin, HttpMethod::Put, "/orgs/{org}/members"),
            ToolDefinition {
                execution: ToolExecution::Graphql(json!({"query": "{ viewer { login } }"})),
                ..http_tool("viewer", ToolCategory::Read, HttpMethod::Post, "/graphql")
            },
        ],
        rate_limit: None,
    }
}

/// Builds a connection with sealed credentials.
pub fn tracker_connection(status: ConnectionStatus, key: &EncryptionKey) -> Connection {
    let credentials: Credentials = [("token", "secret-token")].into_iter().collect();
    Connection {
        id: ConnectionId::new("conn-1"),
        provider_id: ProviderId::new("tracker"),
        user_id: UserId::new("user-1"),
        status,
        credentials: Some(seal_credentials(key, &credentials).unwrap()),
        base_url_override: None,
        config_overrides: ConnectionOverrides::default(),
    }
}

/// Builds a request for a tool.
pub fn call(tool: &str, input: Value) -> ToolCallRequest {
    ToolCallRequest {
        user_id: UserId::new("user-1"),
        agent_id: Some("agent-1".into()),
        drive_id: Some("drive-1".into()),
        connection_id: ConnectionId::new("conn-1"),
        tool_name: tool.to_string(),
        input,
        grant: None,
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Fully wired executor with handles on every fake.
pub struct Harness {
    /// Executor under test.
    pub executor: Arc<ToolExecutor>,
    /// Registry holding the tracker provider and connection.
    pub registry: InMemoryConnectionRegistry,
    /// HTTP fake.
    pub http: Arc<RecordingHttpExecutor>,
    /// Codec fake.
    pub codec: Arc<CountingCodec>,
    /// Audit store.
    pub audit: InMemoryAuditStore,
    /// Telemetry fake.
    pub telemetry: Arc<RecordingTelemetry>,
    /// Clock.
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Returns the audit entries written so far.
    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit.load_chain(&ChainId::default(), None).unwrap()
    }
}

/// Builds a harness with an active connection and an unrestricted grant.
pub fn harness(http: RecordingHttpExecutor) -> Harness {
    harness_with(http, ConnectionStatus::Active, Some(ToolGrant::unrestricted()), ExecutorConfig::default())
}

/// Builds a harness with explicit status, grant, and config.
pub fn harness_with(
    http: RecordingHttpExecutor,
    status: ConnectionStatus,
    grant: Option<ToolGrant>,
    config: ExecutorConfig,
) -> Harness {
    let key = EncryptionKey::from_bytes([7_u8; 32]);
    let registry = InMemoryConnectionRegistry::new();
    registry.upsert_provider(tracker_provider()).unwrap();
    registry.upsert_connection(tracker_connection(status, &key)).unwrap();
    if let Some(grant) = grant {
        registry.upsert_grant(ConnectionId::new("conn-1"), Some("agent-1".into()), grant).unwrap();
    }
    let http = Arc::new(http);
    let codec = Arc::new(CountingCodec::new(key));
    let audit = InMemoryAuditStore::new();
    let telemetry = Arc::new(RecordingTelemetry::default());
    let clock = Arc::new(ManualClock::new(START_MS));
    let deps = ToolExecutorDeps {
        connections: Arc::new(registry.clone()),
        grants: Arc::new(registry.clone()),
        credentials: codec.clone(),
        http: http.clone(),
        counters: Arc::new(InMemoryCounterStore::default()),
        audit_store: Arc::new(audit.clone()),
        clock: clock.clone(),
        telemetry: telemetry.clone(),
    };
    Harness {
        executor: Arc::new(create_tool_executor(deps, config)),
        registry,
        http,
        codec,
        audit,
        telemetry,
        clock,
    }
}
