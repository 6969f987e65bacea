// crates/hanzi-ref-cli/src/main.rs
// ============================================================================
// Module: Hanzi Reference CLI Entry Point
// Description: Command dispatcher for dictionary lookups and config tooling.
// Purpose: Drive the reference store from the command line.
// Dependencies: clap, hanzi-ref-config, hanzi-ref-core, hanzi-ref-store-sqlite,
// serde_json, tracing, tracing-subscriber.
// ============================================================================

//! ## Overview
//! `hanzi-ref` opens the `SQLite` dictionary behind the reference store,
//! answers lookups as JSON envelope lines, and shuts the store down so the
//! response cache snapshot is persisted. Logs go to stderr and are filtered
//! by `HANZI_REF_LOG` or the `--verbose` count.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use hanzi_ref_config::HanziRefConfig;
use hanzi_ref_config::config_toml_example;
use hanzi_ref_core::LookupKind;
use hanzi_ref_core::ReferenceStore;
use hanzi_ref_core::ResponseEnvelope;
use hanzi_ref_core::normalize;
use hanzi_ref_store_sqlite::open_reference_store;
use thiserror::Error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "HANZI_REF_LOG";
/// Session identifier used when `--session-id` is omitted.
const DEFAULT_SESSION_ID: &str = "cli";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "hanzi-ref", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to hanzi-ref.toml or `HANZI_REF_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Override the dictionary database path.
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,
    /// Override whether the response cache is enabled.
    #[arg(long, value_name = "BOOL", global = true)]
    cache: Option<bool>,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Look up one or more terms and print JSON envelopes.
    Lookup(LookupCommand),
    /// Split a phonetic term into stem and tone.
    Normalize(NormalizeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `lookup` command.
#[derive(Args, Debug)]
struct LookupCommand {
    /// Lookup kind: zhuyin, pinyin, def, or char.
    #[arg(value_name = "KIND")]
    kind: LookupKind,
    /// Terms to look up, answered in order.
    #[arg(value_name = "TERM", required = true, num_args = 1 ..)]
    terms: Vec<String>,
    /// Session identifier echoed in every envelope.
    #[arg(long, value_name = "ID", default_value = DEFAULT_SESSION_ID)]
    session_id: String,
}

/// Arguments for the `normalize` command.
#[derive(Args, Debug)]
struct NormalizeCommand {
    /// Raw phonetic term such as `wo3`.
    #[arg(value_name = "TERM")]
    term: String,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the resolved configuration file.
    Validate,
    /// Print an example hanzi-ref.toml.
    Example,
}

/// Command-line overrides applied on top of the loaded config.
#[derive(Debug, Clone, Default)]
struct Overrides {
    /// Replacement dictionary path.
    db: Option<PathBuf>,
    /// Replacement cache toggle.
    cache: Option<bool>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a display message.
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

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments, installs logging, and dispatches.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let overrides = Overrides {
        db: cli.db,
        cache: cli.cache,
    };

    match cli.command {
        Commands::Lookup(command) => command_lookup(cli.config, &overrides, &command),
        Commands::Normalize(command) => command_normalize(&command),
        Commands::Config {
            command,
        } => command_config(cli.config, &overrides, &command),
    }
}

/// Installs the stderr tracing subscriber.
fn init_tracing(verbose: u8) {
    let filter = log_filter(verbose, std::env::var(LOG_ENV).ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolves the log filter; explicit verbosity wins over the environment.
fn log_filter(verbose: u8, env_directive: Option<&str>) -> EnvFilter {
    match verbose {
        0 => env_directive
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

// ============================================================================
// SECTION: Lookup Command
// ============================================================================

/// Executes the `lookup` command.
fn command_lookup(
    config_path: Option<PathBuf>,
    overrides: &Overrides,
    command: &LookupCommand,
) -> CliResult<ExitCode> {
    let config = resolve_config(config_path, overrides)?;
    let store = open_reference_store(&config.sqlite_config(), config.store_config())
        .map_err(|err| CliError::new(format!("failed to open reference store: {err}")))?;

    let outcome = write_lookups(&store, command);
    let shutdown = store.shutdown();
    outcome?;
    let report =
        shutdown.map_err(|err| CliError::new(format!("reference store shutdown failed: {err}")))?;
    info!(
        processed = report.processed,
        cache_entries = report.cache_entries,
        snapshot_entries = ?report.snapshot_entries,
        "lookup command finished"
    );
    Ok(ExitCode::SUCCESS)
}

/// Answers every term in order, writing one envelope line per term.
fn write_lookups(store: &ReferenceStore, command: &LookupCommand) -> CliResult<()> {
    for term in &command.terms {
        let line = render_lookup(store, command.kind, term, &command.session_id, unix_millis()?)?;
        write_stdout_line(&line)
            .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
    }
    Ok(())
}

/// Runs one lookup and serializes its envelope.
fn render_lookup(
    store: &ReferenceStore,
    kind: LookupKind,
    term: &str,
    session_id: &str,
    timestamp: i64,
) -> CliResult<String> {
    let lookup = store
        .lookup(kind.filter(term))
        .map_err(|err| CliError::new(format!("lookup {kind} {term:?} failed: {err}")))?;
    if let Some(failure) = &lookup.failure {
        warn!(kind = %kind, term, error = %failure, "lookup degraded to empty result");
    }
    let envelope = ResponseEnvelope::new(session_id, kind, lookup.results, timestamp);
    serde_json::to_string(&envelope)
        .map_err(|err| CliError::new(format!("failed to encode envelope: {err}")))
}

/// Returns the current Unix time in milliseconds.
fn unix_millis() -> CliResult<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| CliError::new(format!("system clock before unix epoch: {err}")))?;
    Ok(i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

// ============================================================================
// SECTION: Normalize Command
// ============================================================================

/// Executes the `normalize` command.
fn command_normalize(command: &NormalizeCommand) -> CliResult<ExitCode> {
    let term = normalize(&command.term);
    let line = serde_json::to_string(&term)
        .map_err(|err| CliError::new(format!("failed to encode term: {err}")))?;
    write_stdout_line(&line).map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(
    config_path: Option<PathBuf>,
    overrides: &Overrides,
    command: &ConfigCommand,
) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => {
            let config = resolve_config(config_path, overrides)?;
            write_stdout_line(&format!(
                "config ok: storage {} cache {}",
                config.storage.path.display(),
                if config.cache.enabled { "enabled" } else { "disabled" }
            ))
            .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
        }
        ConfigCommand::Example => {
            let example = config_toml_example();
            write_stdout_bytes(example.as_bytes())
                .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Loads the config and applies command-line overrides.
fn resolve_config(
    config_path: Option<PathBuf>,
    overrides: &Overrides,
) -> CliResult<HanziRefConfig> {
    let config = HanziRefConfig::load(config_path.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    apply_overrides(config, overrides)
}

/// Applies overrides and revalidates the result.
fn apply_overrides(mut config: HanziRefConfig, overrides: &Overrides) -> CliResult<HanziRefConfig> {
    if let Some(db) = &overrides.db {
        config.storage.path.clone_from(db);
    }
    if let Some(enabled) = overrides.cache {
        config.cache.enabled = enabled;
    }
    config.validate().map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    Ok(config)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
