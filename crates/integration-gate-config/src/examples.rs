// crates/integration-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `integration-gate.toml`. Every value shown matches the
//! built-in default except the optional `[store]` and `allowed_hosts` entries.

/// Returns a canonical example `integration-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[rate_limit]
default_requests_per_minute = 30
min_requests_per_minute = 1
max_requests_per_minute = 1000
window_ms = 60000
max_entries = 65536

[policy]
missing_grant = "deny"

[http]
allow_http = false
allowed_hosts = ["api.github.com", "slack.com"]
max_response_bytes = 1048576
default_timeout_ms = 30000
max_timeout_ms = 120000
max_backoff_ms = 30000
user_agent = "integration-gate/0.1"

[audit]
chain_id = "integration_tool_calls"
quick_check_sample = 10
input_summary_max_keys = 32

[credentials]
key_env = "INTEGRATION_GATE_CREDENTIAL_KEY"

[store]
path = "integration-gate.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000
"#,
    )
}
