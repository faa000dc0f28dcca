// crates/integration-gate-cli/src/main.rs
// ============================================================================
// Module: Integration Gate CLI Entry Point
// Description: Operator commands for audit chains, credentials, and config.
// Purpose: Verify tamper evidence and seal credentials outside the gateway.
// Dependencies: clap, integration-gate-config, integration-gate-core, tracing
// ============================================================================

//! ## Overview
//! The Integration Gate CLI runs offline operator tasks against a configured
//! gateway: hash-chain verification of the durable audit log, sealing of
//! connection credentials with the configured key, and config validation.
//!
//! Results are JSON on stdout. Logs go to stderr. Exit code `2` signals a
//! broken or suspect audit chain; any other failure exits with `1`.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use integration_gate_config::GatewayConfig;
use integration_gate_config::config_toml_example;
use integration_gate_core::AuditEntryId;
use integration_gate_core::AuditStore;
use integration_gate_core::ChainId;
use integration_gate_core::Credentials;
use integration_gate_core::SystemClock;
use integration_gate_core::runtime::EncryptionKey;
use integration_gate_core::runtime::HashChainVerifier;
use integration_gate_core::runtime::VerifyOptions;
use integration_gate_core::runtime::seal_credentials;
use integration_gate_store_sqlite::SqliteAuditStore;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum credential input file size in bytes.
const MAX_CREDENTIAL_INPUT_BYTES: usize = 64 * 1024;
/// Exit code for a broken or suspect audit chain.
const EXIT_CHAIN_BROKEN: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Integration Gate operator CLI.
#[derive(Parser, Debug)]
#[command(name = "integration-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Path to `integration-gate.toml` (overrides `INTEGRATION_GATE_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Log output format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Log formats.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Audit chain verification.
    Audit {
        /// Selected audit subcommand.
        #[command(subcommand)]
        command: AuditCommand,
    },
    /// Credential sealing utilities.
    Credentials {
        /// Selected credentials subcommand.
        #[command(subcommand)]
        command: CredentialsCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Audit subcommands.
#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Verifies the full chain.
    Verify(AuditVerifyCommand),
    /// Samples the chain start and checks the latest link.
    QuickCheck(AuditQuickCheckCommand),
    /// Verifies one entry against its predecessor.
    VerifyEntry(AuditVerifyEntryCommand),
}

/// Shared audit chain selection.
#[derive(Args, Debug)]
struct ChainArgs {
    /// Chain to read (defaults to `audit.chain_id`).
    #[arg(long, value_name = "CHAIN")]
    chain: Option<String>,
}

/// Arguments for `audit verify`.
#[derive(Args, Debug)]
struct AuditVerifyCommand {
    /// Chain selection.
    #[command(flatten)]
    chain: ChainArgs,
    /// Maximum entries to verify, oldest first.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
    /// Stop at the first broken entry.
    #[arg(long)]
    stop_on_first_break: bool,
}

/// Arguments for `audit quick-check`.
#[derive(Args, Debug)]
struct AuditQuickCheckCommand {
    /// Chain selection.
    #[command(flatten)]
    chain: ChainArgs,
    /// Entries to sample (defaults to `audit.quick_check_sample`).
    #[arg(long, value_name = "N")]
    sample: Option<usize>,
}

/// Arguments for `audit verify-entry`.
#[derive(Args, Debug)]
struct AuditVerifyEntryCommand {
    /// Chain selection.
    #[command(flatten)]
    chain: ChainArgs,
    /// Entry identifier.
    #[arg(value_name = "ID")]
    entry_id: String,
}

/// Credentials subcommands.
#[derive(Subcommand, Debug)]
enum CredentialsCommand {
    /// Seals a JSON object of credential fields with the configured key.
    Seal {
        /// JSON file holding string credential fields.
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },
    /// Prints a fresh base64 credential key.
    GenerateKey,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Loads and validates the configuration.
    Check,
    /// Prints the canonical example configuration.
    Example,
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Summary printed by `config check`.
#[derive(Debug, Serialize)]
struct ConfigCheckOutput {
    /// Always true when printed.
    valid: bool,
    /// Audit chain written by the executor.
    chain_id: String,
    /// Behavior for absent grants.
    missing_grant: String,
    /// Default per-minute limit.
    default_requests_per_minute: u32,
    /// Whether cleartext HTTP is permitted.
    allow_http: bool,
    /// Allowlisted hosts, if any.
    allowed_hosts: Option<Vec<String>>,
    /// Durable store path, if configured.
    store_path: Option<String>,
    /// Environment variable holding the credential key.
    credential_key_env: String,
}

/// Output printed by `credentials seal`.
#[derive(Debug, Serialize)]
struct SealOutput {
    /// Base64 ciphertext for the connection record.
    ciphertext: String,
    /// Sealed field names.
    fields: Vec<String>,
}

/// Output printed by `credentials generate-key`.
#[derive(Debug, Serialize)]
struct GenerateKeyOutput {
    /// Base64 encoded 32-byte key.
    key: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_tracing(cli.log_format) {
        return emit_error(&err.to_string());
    }
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(target: "integration_gate::cli", error = %err, "command failed");
            emit_error(&err.to_string())
        }
    }
}

/// Executes the command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Audit {
            command,
        } => command_audit(config_path, command),
        Commands::Credentials {
            command,
        } => command_credentials(config_path, command),
        Commands::Config {
            command,
        } => command_config(config_path, &command),
    }
}

/// Installs the stderr tracing subscriber.
fn init_tracing(format: LogFormat) -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .map_err(|err| CliError::new(format!("invalid log filter: {err}")))?;
    let (json, pretty) = match format {
        LogFormat::Json => (Some(fmt::layer().json().with_writer(std::io::stderr)), None),
        LogFormat::Pretty => (None, Some(fmt::layer().with_target(true).with_writer(std::io::stderr))),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()
        .map_err(|err| CliError::new(format!("failed to initialize logging: {err}")))
}

// ============================================================================
// SECTION: Audit Commands
// ============================================================================

/// Executes `audit` subcommands.
fn command_audit(config_path: Option<&Path>, command: AuditCommand) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    match command {
        AuditCommand::Verify(command) => {
            let verifier = open_verifier(&config, &command.chain)?;
            let result = verifier
                .verify_hash_chain(VerifyOptions {
                    limit: command.limit,
                    stop_on_first_break: command.stop_on_first_break,
                })
                .map_err(|err| CliError::new(format!("audit verification failed: {err}")))?;
            tracing::info!(
                target: "integration_gate::cli",
                total = result.total_entries,
                verified = result.entries_verified,
                valid = result.is_valid,
                "audit chain verified"
            );
            write_json(&result)?;
            Ok(chain_exit_code(result.is_valid))
        }
        AuditCommand::QuickCheck(command) => {
            let verifier = open_verifier(&config, &command.chain)?;
            let sample = command.sample.unwrap_or(config.audit.quick_check_sample);
            let result = verifier
                .quick_integrity_check(sample)
                .map_err(|err| CliError::new(format!("audit quick check failed: {err}")))?;
            write_json(&result)?;
            Ok(chain_exit_code(result.is_likely_valid))
        }
        AuditCommand::VerifyEntry(command) => {
            let verifier = open_verifier(&config, &command.chain)?;
            let entry_id = AuditEntryId::new(command.entry_id);
            let result = verifier
                .verify_entry(&entry_id)
                .map_err(|err| CliError::new(format!("audit entry verification failed: {err}")))?
                .ok_or_else(|| {
                    CliError::new(format!("audit entry not found: {}", entry_id.as_str()))
                })?;
            write_json(&result)?;
            Ok(chain_exit_code(result.is_valid))
        }
    }
}

/// Opens the durable audit store and builds a verifier for a chain.
fn open_verifier(config: &GatewayConfig, chain: &ChainArgs) -> CliResult<HashChainVerifier> {
    let store_config = config.store_config().map_err(|err| CliError::new(err.to_string()))?;
    let store = SqliteAuditStore::new(store_config)
        .map_err(|err| CliError::new(format!("failed to open audit store: {err}")))?;
    let chain_id = chain.chain.as_ref().map_or_else(|| config.audit.chain_id(), |name| ChainId::new(name.clone()));
    let store: Arc<dyn AuditStore> = Arc::new(store);
    Ok(HashChainVerifier::new(store, chain_id, Arc::new(SystemClock)))
}

/// Maps a chain verdict to an exit code.
fn chain_exit_code(is_valid: bool) -> ExitCode {
    if is_valid { ExitCode::SUCCESS } else { ExitCode::from(EXIT_CHAIN_BROKEN) }
}

// ============================================================================
// SECTION: Credentials Commands
// ============================================================================

/// Executes `credentials` subcommands.
fn command_credentials(
    config_path: Option<&Path>,
    command: CredentialsCommand,
) -> CliResult<ExitCode> {
    match command {
        CredentialsCommand::Seal {
            input,
        } => {
            let config = load_config(config_path)?;
            let key = config.load_credential_key().map_err(|err| CliError::new(err.to_string()))?;
            let bytes = read_bytes_with_limit(&input, MAX_CREDENTIAL_INPUT_BYTES)
                .map_err(|err| read_limit_error(&input, err))?;
            let credentials = parse_credentials(&bytes)?;
            let ciphertext = seal_credentials(&key, &credentials)
                .map_err(|err| CliError::new(format!("failed to seal credentials: {err}")))?;
            write_json(&SealOutput {
                ciphertext,
                fields: credentials.fields().keys().cloned().collect(),
            })?;
            Ok(ExitCode::SUCCESS)
        }
        CredentialsCommand::GenerateKey => {
            write_json(&GenerateKeyOutput {
                key: EncryptionKey::generate().to_base64(),
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Parses credential fields from JSON input.
fn parse_credentials(bytes: &[u8]) -> CliResult<Credentials> {
    let credentials: Credentials = serde_json::from_slice(bytes).map_err(|err| {
        CliError::new(format!("credential input must be a JSON object of strings: {err}"))
    })?;
    if credentials.is_empty() {
        return Err(CliError::new("credential input has no fields".to_string()));
    }
    Ok(credentials)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes `config` subcommands.
fn command_config(config_path: Option<&Path>, command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check => {
            let config = load_config(config_path)?;
            write_json(&config_check_output(&config))?;
            Ok(ExitCode::SUCCESS)
        }
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Builds the `config check` summary.
fn config_check_output(config: &GatewayConfig) -> ConfigCheckOutput {
    let missing_grant = serde_json::to_value(config.policy.missing_grant)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    ConfigCheckOutput {
        valid: true,
        chain_id: config.audit.chain_id.clone(),
        missing_grant,
        default_requests_per_minute: config.rate_limit.default_requests_per_minute,
        allow_http: config.http.allow_http,
        allowed_hosts: config.http.allowed_hosts.as_ref().map(|hosts| hosts.iter().cloned().collect()),
        store_path: config.store.as_ref().map(|store| store.path.display().to_string()),
        credential_key_env: config.credentials.key_env.clone(),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads configuration with CLI path resolution.
fn load_config(path: Option<&Path>) -> CliResult<GatewayConfig> {
    GatewayConfig::load(path).map_err(|err| CliError::new(err.to_string()))
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Formats a bounded read failure.
fn read_limit_error(path: &Path, error: ReadLimitError) -> CliError {
    match error {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} exceeds size limit ({size} bytes > {limit} bytes)",
            path.display()
        )),
    }
}

/// Writes pretty JSON to stdout with a trailing newline.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    bytes.push(b'\n');
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes raw bytes to stdout.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)?;
    stdout.flush()
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write {stream}: {error}")
}

/// Emits an error message and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
