// crates/repweight-cli/src/main.rs
// ============================================================================
// Module: Repweight CLI Entry Point
// Description: Command dispatcher for startup bootstrap and store inspection.
// Purpose: Migrate the schema, seed one account, and report representative weights.
// Dependencies: clap, repweight-config, repweight-core, repweight stores, tokio, tracing
// ============================================================================

//! ## Overview
//! `repweight` loads `repweight.toml`, opens the configured store, and runs
//! one of a few short-lived commands. The default command migrates the
//! schema, writes a seed account holding the maximum balance, and prints the
//! resulting weights as JSON on stdout. A failed migration aborts before any
//! account is written. Any failure is logged and exits with status 1.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod logging;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use repweight_config::ConfigError;
use repweight_config::DatabaseBackend;
use repweight_config::DatabaseConfig;
use repweight_config::LoggingConfig;
use repweight_config::RepweightConfig;
use repweight_config::SeedConfig;
use repweight_core::AccountRecord;
use repweight_core::AccountStore;
use repweight_core::AmountView;
use repweight_core::MigrationError;
use repweight_core::MigrationReport;
use repweight_core::PublicKey;
use repweight_core::SharedAccountStore;
use repweight_core::bootstrap;
use repweight_store_postgres::PostgresAccountStore;
use repweight_store_sqlite::SqliteAccountStore;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use tracing::info;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "repweight", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (defaults to `REPWEIGHT_CONFIG`, then repweight.toml).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand; `bootstrap` when omitted.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate the schema, seed an account, and print weights.
    Bootstrap(BootstrapCommand),
    /// Apply pending schema migrations.
    Migrate,
    /// Print every stored account.
    Accounts,
    /// Print the weight of every representative.
    Weights,
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Options for the `bootstrap` command.
#[derive(Args, Debug, Default)]
struct BootstrapCommand {
    /// Seed key as 64 hex characters (overrides `seed.public_key`).
    #[arg(long, value_name = "HEX")]
    seed_key: Option<PublicKey>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the configuration file and environment overrides.
    Validate,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
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
// SECTION: Output Types
// ============================================================================

/// JSON row for one representative weight.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct WeightOutput {
    /// Representative key as hex.
    representative: String,
    /// Decimal weight; a string because it may exceed any JSON number range.
    weight: String,
}

impl From<&AmountView> for WeightOutput {
    fn from(view: &AmountView) -> Self {
        Self {
            representative: view.public_key.to_hex(),
            weight: view.weight.to_string(),
        }
    }
}

/// JSON document printed by `bootstrap`.
#[derive(Debug, Serialize)]
struct BootstrapOutput {
    /// Seed account as persisted; absent when seeding is disabled.
    seeded: Option<AccountRecord>,
    /// Weights observed after seeding.
    weights: Vec<WeightOutput>,
}

/// JSON document printed by `migrate`.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct MigrateOutput {
    /// Versions applied by this run.
    applied: Vec<u32>,
    /// Highest applied version.
    current_version: Option<u32>,
}

impl From<MigrationReport> for MigrateOutput {
    fn from(report: MigrationReport) -> Self {
        Self {
            applied: report.applied,
            current_version: report.current_version,
        }
    }
}

/// JSON document printed by `config validate`.
#[derive(Debug, Serialize)]
struct ConfigOutput {
    /// Always true; invalid configs exit with an error instead.
    valid: bool,
    /// Credential-free database URL.
    database_url: String,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = RepweightConfig::load(cli.config.as_deref());
    let logging =
        config.as_ref().map_or_else(|_| LoggingConfig::default(), |config| config.logging.clone());
    if let Err(message) = logging::init_logging(&logging) {
        return emit_error(&message);
    }
    let command = cli.command.unwrap_or(Commands::Bootstrap(BootstrapCommand::default()));
    match run(command, config).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "repweight failed");
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run(
    command: Commands,
    config: Result<RepweightConfig, ConfigError>,
) -> CliResult<ExitCode> {
    let config =
        config.map_err(|err| CliError::new(format!("failed to load configuration: {err}")))?;
    let output = match command {
        Commands::Bootstrap(command) => to_json(&command_bootstrap(&config, command).await?)?,
        Commands::Migrate => to_json(&command_migrate(&config).await?)?,
        Commands::Accounts => to_json(&command_accounts(&config).await?)?,
        Commands::Weights => to_json(&command_weights(&config).await?)?,
        Commands::Config {
            command: ConfigCommand::Validate,
        } => to_json(&command_config_validate(&config))?,
    };
    write_stdout_line(&output)
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `bootstrap` command.
async fn command_bootstrap(
    config: &RepweightConfig,
    command: BootstrapCommand,
) -> CliResult<BootstrapOutput> {
    let backend = BackendStore::open(&config.database).await?;
    migrate_or_abort(&backend).await?;
    let store = backend.into_shared();
    let Some(seed_key) = resolve_seed_key(command.seed_key, &config.seed) else {
        info!("seeding disabled; aggregating existing accounts");
        let weights = store
            .find_all_weights()
            .await
            .map_err(|err| CliError::new(format!("weight aggregation failed: {err}")))?;
        return Ok(BootstrapOutput {
            seeded: None,
            weights: weights.iter().map(WeightOutput::from).collect(),
        });
    };
    let report = bootstrap(&store, seed_key)
        .await
        .map_err(|err| CliError::new(format!("bootstrap failed: {err}")))?;
    Ok(BootstrapOutput {
        seeded: Some(report.seeded),
        weights: report.weights.iter().map(WeightOutput::from).collect(),
    })
}

/// Executes the `migrate` command.
async fn command_migrate(config: &RepweightConfig) -> CliResult<MigrateOutput> {
    let backend = BackendStore::open(&config.database).await?;
    Ok(migrate_or_abort(&backend).await?.into())
}

/// Executes the `accounts` command.
async fn command_accounts(config: &RepweightConfig) -> CliResult<Vec<AccountRecord>> {
    let backend = BackendStore::open(&config.database).await?;
    migrate_or_abort(&backend).await?;
    let store = backend.into_shared();
    store.find_all().await.map_err(|err| CliError::new(format!("account listing failed: {err}")))
}

/// Executes the `weights` command.
async fn command_weights(config: &RepweightConfig) -> CliResult<Vec<WeightOutput>> {
    let backend = BackendStore::open(&config.database).await?;
    migrate_or_abort(&backend).await?;
    let store = backend.into_shared();
    let weights = store
        .find_all_weights()
        .await
        .map_err(|err| CliError::new(format!("weight aggregation failed: {err}")))?;
    Ok(weights.iter().map(WeightOutput::from).collect())
}

/// Executes the `config validate` command.
fn command_config_validate(config: &RepweightConfig) -> ConfigOutput {
    ConfigOutput {
        valid: true,
        database_url: config.database.url(),
    }
}

/// Picks the seed key: flag, then config, then random. `None` disables seeding.
fn resolve_seed_key(flag: Option<PublicKey>, seed: &SeedConfig) -> Option<PublicKey> {
    if !seed.enabled {
        return None;
    }
    Some(
        flag.or(seed.public_key)
            .unwrap_or_else(|| PublicKey::random(&mut rand::thread_rng())),
    )
}

/// Runs migrations and converts failures into a fatal CLI error.
async fn migrate_or_abort(backend: &BackendStore) -> CliResult<MigrationReport> {
    let report = backend
        .migrate()
        .await
        .map_err(|err| CliError::new(format!("schema migration failed: {err}")))?;
    info!(
        applied = report.applied.len(),
        current_version = ?report.current_version,
        "schema up to date"
    );
    Ok(report)
}

// ============================================================================
// SECTION: Backend Selection
// ============================================================================

/// Store opened for the configured backend.
enum BackendStore {
    /// `SQLite` file store.
    Sqlite(SqliteAccountStore),
    /// Pooled Postgres store.
    Postgres(PostgresAccountStore),
}

impl BackendStore {
    /// Opens the configured backend on the blocking pool.
    async fn open(config: &DatabaseConfig) -> CliResult<Self> {
        let url = config.url();
        info!(url = %url, "opening account store");
        let opened = match config.backend {
            DatabaseBackend::Sqlite => {
                let store_config = config.sqlite_store_config();
                tokio::task::spawn_blocking(move || {
                    SqliteAccountStore::open(&store_config)
                        .map(Self::Sqlite)
                        .map_err(|err| err.to_string())
                })
                .await
            }
            DatabaseBackend::Postgres => {
                let store_config = config.postgres_store_config();
                tokio::task::spawn_blocking(move || {
                    PostgresAccountStore::connect(&store_config)
                        .map(Self::Postgres)
                        .map_err(|err| err.to_string())
                })
                .await
            }
        };
        opened
            .map_err(|err| CliError::new(format!("store init join failed: {err}")))?
            .map_err(|err| CliError::new(format!("failed to open store at {url}: {err}")))
    }

    /// Applies pending schema migrations.
    async fn migrate(&self) -> Result<MigrationReport, MigrationError> {
        match self {
            Self::Sqlite(store) => store.migrate().await,
            Self::Postgres(store) => store.migrate().await,
        }
    }

    /// Wraps the backend as a shared store.
    fn into_shared(self) -> SharedAccountStore {
        match self {
            Self::Sqlite(store) => SharedAccountStore::from_store(store),
            Self::Postgres(store) => SharedAccountStore::from_store(store),
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Serializes a command result as one line of JSON.
fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message before logging is available and returns failure.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
