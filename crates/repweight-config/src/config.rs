// crates/repweight-config/src/config.rs
// ============================================================================
// Module: Repweight Configuration
// Description: Configuration loading and validation for Repweight.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: repweight-core, repweight-store-postgres, repweight-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is read from a TOML file, resolved from an explicit path,
//! the `REPWEIGHT_CONFIG` environment variable, or `repweight.toml` in the
//! working directory. Database connection fields may be overridden by
//! `REPWEIGHT_DB_*` environment variables. Every section has defaults, so an
//! empty file is a valid configuration. Validation fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use repweight_core::PublicKey;
use repweight_store_postgres::PostgresStoreConfig;
use repweight_store_sqlite::SqliteStoreConfig;
use repweight_store_sqlite::SqliteStoreMode;
use repweight_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "repweight.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "REPWEIGHT_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum pool size accepted for Postgres.
pub(crate) const MAX_POOL_SIZE: u32 = 256;
/// Maximum length of a logging filter directive.
pub(crate) const MAX_LOG_FILTER_LENGTH: usize = 512;

/// Environment variable overriding `database.driver`.
pub const ENV_DB_DRIVER: &str = "REPWEIGHT_DB_DRIVER";
/// Environment variable overriding `database.host`.
pub const ENV_DB_HOST: &str = "REPWEIGHT_DB_HOST";
/// Environment variable overriding `database.port`.
pub const ENV_DB_PORT: &str = "REPWEIGHT_DB_PORT";
/// Environment variable overriding `database.database`.
pub const ENV_DB_NAME: &str = "REPWEIGHT_DB_NAME";
/// Environment variable overriding `database.user`.
pub const ENV_DB_USER: &str = "REPWEIGHT_DB_USER";
/// Environment variable overriding `database.password`.
pub const ENV_DB_PASSWORD: &str = "REPWEIGHT_DB_PASSWORD";

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Repweight configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepweightConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Seed account settings.
    #[serde(default)]
    pub seed: SeedConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RepweightConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Environment overrides are applied before validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| env::var(name).ok())
    }

    /// Loads configuration reading environment variables through `lookup`.
    ///
    /// An explicit `path` or `REPWEIGHT_CONFIG` must name a readable file.
    /// When neither is given and `repweight.toml` is absent, defaults are
    /// used so that connection settings can come from the environment alone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (resolved, explicit) = resolve_path(path, &lookup)?;
        let mut config = if !explicit && !resolved.exists() {
            Self::default()
        } else {
            validate_path(&resolved)?;
            let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
            if bytes.len() > MAX_CONFIG_FILE_SIZE {
                return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
            }
            let content = std::str::from_utf8(&bytes)
                .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
            Self::from_toml(content)?
        };
        config.apply_env_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from TOML text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the text is not a valid config.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies `REPWEIGHT_DB_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when an override value is malformed.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.database.apply_env_overrides(lookup)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Database Config
// ============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    /// Pooled Postgres server.
    #[default]
    Postgres,
    /// Single-file `SQLite` database.
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the canonical URL scheme for the backend.
    #[must_use]
    pub const fn default_driver(self) -> &'static str {
        match self {
            Self::Postgres => "postgresql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Resolves a backend from a URL scheme.
    fn from_driver(driver: &str) -> Option<Self> {
        match driver {
            "postgresql" | "postgres" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

/// Database connection configuration.
///
/// # Invariants
/// - `driver`, when set, names the same backend as `backend`.
/// - Network fields apply to Postgres; `path` and pragma fields apply to `SQLite`.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: DatabaseBackend,
    /// Optional URL scheme; defaults to the backend's canonical scheme.
    #[serde(default)]
    pub driver: Option<String>,
    /// Server host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,
    /// Login role.
    #[serde(default = "default_user")]
    pub user: String,
    /// Optional login password.
    #[serde(default)]
    pub password: Option<String>,
    /// `SQLite` database file path.
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,
    /// Maximum Postgres pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Statement timeout in milliseconds.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    /// `SQLite` busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            driver: None,
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: None,
            path: default_sqlite_path(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("url", &self.url())
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl DatabaseConfig {
    /// Returns the effective URL scheme.
    #[must_use]
    pub fn driver(&self) -> &str {
        self.driver.as_deref().unwrap_or_else(|| self.backend.default_driver())
    }

    /// Returns the credential-free connection URL.
    ///
    /// Postgres renders as `driver://host:port/database`; `SQLite` renders as
    /// `sqlite://path`.
    #[must_use]
    pub fn url(&self) -> String {
        match self.backend {
            DatabaseBackend::Postgres => {
                format!("{}://{}:{}/{}", self.driver(), self.host, self.port, self.database)
            }
            DatabaseBackend::Sqlite => format!("{}://{}", self.driver(), self.path.display()),
        }
    }

    /// Builds the Postgres store configuration.
    #[must_use]
    pub fn postgres_store_config(&self) -> PostgresStoreConfig {
        PostgresStoreConfig {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            max_connections: self.max_connections,
            connect_timeout_ms: self.connect_timeout_ms,
            statement_timeout_ms: self.statement_timeout_ms,
        }
    }

    /// Builds the `SQLite` store configuration.
    #[must_use]
    pub fn sqlite_store_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }

    /// Applies `REPWEIGHT_DB_*` overrides read through `lookup`.
    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(driver) = lookup(ENV_DB_DRIVER) {
            let backend = DatabaseBackend::from_driver(&driver).ok_or_else(|| {
                ConfigError::Invalid(format!("{ENV_DB_DRIVER} names an unsupported driver"))
            })?;
            self.backend = backend;
            self.driver = Some(driver);
        }
        if let Some(host) = lookup(ENV_DB_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_DB_PORT) {
            self.port = port.trim().parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("{ENV_DB_PORT} must be a port number"))
            })?;
        }
        if let Some(database) = lookup(ENV_DB_NAME) {
            self.database = database;
        }
        if let Some(user) = lookup(ENV_DB_USER) {
            self.user = user;
        }
        if let Some(password) = lookup(ENV_DB_PASSWORD) {
            self.password = Some(password);
        }
        Ok(())
    }

    /// Validates connection settings for the selected backend.
    fn validate(&self) -> Result<(), ConfigError> {
        let driver = self.driver();
        match DatabaseBackend::from_driver(driver) {
            Some(backend) if backend == self.backend => {}
            Some(_) => {
                return Err(ConfigError::Invalid(format!(
                    "database.driver {driver} does not match database.backend"
                )));
            }
            None => {
                return Err(ConfigError::Invalid(format!(
                    "database.driver {driver} is not supported"
                )));
            }
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.statement_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.statement_timeout_ms must be greater than zero".to_string(),
            ));
        }
        match self.backend {
            DatabaseBackend::Postgres => self.validate_postgres(),
            DatabaseBackend::Sqlite => self.validate_sqlite(),
        }
    }

    /// Validates Postgres-only fields.
    fn validate_postgres(&self) -> Result<(), ConfigError> {
        validate_non_empty("database.host", &self.host)?;
        validate_non_empty("database.database", &self.database)?;
        validate_non_empty("database.user", &self.user)?;
        if self.port == 0 {
            return Err(ConfigError::Invalid("database.port must be greater than zero".to_string()));
        }
        if self.max_connections == 0 || self.max_connections > MAX_POOL_SIZE {
            return Err(ConfigError::Invalid(format!(
                "database.max_connections must be between 1 and {MAX_POOL_SIZE}"
            )));
        }
        Ok(())
    }

    /// Validates `SQLite`-only fields.
    fn validate_sqlite(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must be non-empty".to_string()));
        }
        validate_path(&self.path)?;
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns the default database host.
fn default_host() -> String {
    "localhost".to_string()
}

/// Returns the default Postgres port.
const fn default_port() -> u16 {
    5432
}

/// Returns the default database name.
fn default_database() -> String {
    "repweight".to_string()
}

/// Returns the default login role.
fn default_user() -> String {
    "repweight".to_string()
}

/// Returns the default `SQLite` database path.
fn default_sqlite_path() -> PathBuf {
    PathBuf::from("repweight.db")
}

/// Returns the default Postgres pool size.
const fn default_max_connections() -> u32 {
    16
}

/// Returns the default connect timeout.
const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Returns the default statement timeout.
const fn default_statement_timeout_ms() -> u64 {
    30_000
}

/// Returns the default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Seed Config
// ============================================================================

/// Seed account configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Whether startup writes the seed account.
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    /// Fixed seed key as 64 hex characters; random when unset.
    #[serde(default)]
    pub public_key: Option<PublicKey>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_seed_enabled(),
            public_key: None,
        }
    }
}

/// Returns the default seed toggle.
const fn default_seed_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Logging Config
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to emit ANSI colour codes.
    #[serde(default = "default_log_ansi")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: default_log_ansi(),
        }
    }
}

impl LoggingConfig {
    /// Validates the filter directive bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_non_empty("logging.level", &self.level)?;
        if self.level.len() > MAX_LOG_FILTER_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "logging.level exceeds {MAX_LOG_FILTER_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

/// Returns the default log filter.
fn default_log_level() -> String {
    "info".to_string()
}

/// Returns the default ANSI toggle.
const fn default_log_ansi() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path<F>(path: Option<&Path>, lookup: &F) -> Result<(PathBuf, bool), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Some(env_path) = lookup(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates a path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Rejects empty or whitespace-only values.
fn validate_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
