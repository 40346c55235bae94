// crates/repweight-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Account Store
// Description: Durable AccountStore backed by a single SQLite connection.
// Purpose: Persist accounts and aggregate weights without a database server.
// Dependencies: repweight-core, rusqlite, serde, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! This module implements [`AccountStore`] using `SQLite`. One connection is
//! shared behind a mutex and every statement runs on the blocking thread
//! pool. The schema is owned by versioned scripts applied through
//! [`SqliteAccountStore::migrate`]; opening a store never changes the schema.
//! Stored rows are untrusted: keys are re-validated on read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use repweight_core::AccountRecord;
use repweight_core::AccountStore;
use repweight_core::AmountView;
use repweight_core::AppliedMigration;
use repweight_core::Migration;
use repweight_core::MigrationError;
use repweight_core::MigrationReport;
use repweight_core::PublicKey;
use repweight_core::StoreError;
use repweight_core::Timestamp;
use repweight_core::decode_key;
use repweight_core::encode_key;
use repweight_core::plan_migrations;
use repweight_core::runtime::sum_weights;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Schema scripts shipped with this backend, ascending by version.
pub static MIGRATIONS: &[Migration] = &[
    Migration::new(1, "create account", include_str!("../migrations/V1__create_account.sql")),
    Migration::new(
        2,
        "index representative",
        include_str!("../migrations/V2__index_representative.sql"),
    ),
];

/// Engine message prefix for statements against a missing table.
const MISSING_TABLE_PREFIX: &str = "no such table";

/// History table holding one row per applied script.
const HISTORY_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_history (
    version INTEGER NOT NULL PRIMARY KEY,
    description TEXT NOT NULL,
    checksum TEXT NOT NULL,
    applied_at INTEGER NOT NULL
);";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
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
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
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

/// Configuration for the `SQLite` account store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
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
    /// Creates a config for `path` with default pragmas.
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

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw row payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Schema constraint rejected a row.
    #[error("sqlite store constraint violation: {0}")]
    Constraint(String),
    /// Stored row failed validation.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Invalid configuration or request.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        if error.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            return Self::Constraint(error.to_string());
        }
        match &error {
            rusqlite::Error::SqliteFailure(_, Some(message))
                if message.starts_with(MISSING_TABLE_PREFIX) =>
            {
                Self::Invalid(format!("schema not migrated: {message}"))
            }
            _ => Self::Db(error.to_string()),
        }
    }
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => {
                Self::Unavailable(message)
            }
            SqliteStoreError::Constraint(message) => Self::ConstraintViolation(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<SqliteStoreError> for MigrationError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed account store.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
/// - Statements never run on an async executor thread.
#[derive(Clone)]
pub struct SqliteAccountStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteAccountStore {
    /// Opens the database at `config.path`, creating the file if needed.
    ///
    /// This call blocks; async hosts should run it on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unsafe or the database
    /// cannot be opened.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        info!(path = %config.path.display(), "sqlite account store opened");
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Applies every pending schema script.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] when history is inconsistent with the
    /// bundled scripts or a script fails. Nothing is applied on failure.
    pub async fn migrate(&self) -> Result<MigrationReport, MigrationError> {
        self.run_blocking(migrate_connection).await
    }

    /// Returns the recorded schema history, ascending by version.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] when history cannot be read.
    pub async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        self.run_blocking(|connection| -> Result<Vec<AppliedMigration>, MigrationError> {
            connection.execute_batch(HISTORY_DDL).map_err(SqliteStoreError::from)?;
            read_history(connection)
        })
        .await
    }

    /// Runs `op` against the locked connection on the blocking pool.
    async fn run_blocking<T, E, F>(&self, op: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<SqliteStoreError> + Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
            op(&mut guard)
        })
        .await
        .map_err(|err| E::from(SqliteStoreError::Io(format!("blocking task failed: {err}"))))?
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn save(&self, record: AccountRecord) -> Result<AccountRecord, StoreError> {
        let saved = self
            .run_blocking(move |connection| -> Result<AccountRecord, SqliteStoreError> {
                let since = record.persisted_at().unwrap_or_else(Timestamp::now);
                let stored: i64 = connection.query_row(
                    "INSERT INTO account (public_key, balance, representative, persisted_at) \
                     VALUES (?1, ?2, ?3, ?4) ON CONFLICT (public_key) DO UPDATE SET balance = \
                     excluded.balance, representative = excluded.representative RETURNING \
                     persisted_at",
                    params![
                        encode_key(&record.public_key),
                        record.balance,
                        encode_key(&record.representative),
                        since.as_unix_millis()
                    ],
                    |row| row.get(0),
                )?;
                Ok(record.into_persisted(Timestamp::from_unix_millis(stored)))
            })
            .await?;
        debug!(public_key = %saved.public_key, balance = saved.balance, "account saved");
        Ok(saved)
    }

    async fn find_all(&self) -> Result<Vec<AccountRecord>, StoreError> {
        let records = self
            .run_blocking(|connection| -> Result<Vec<AccountRecord>, SqliteStoreError> {
                let mut statement = connection.prepare(
                    "SELECT public_key, balance, representative, persisted_at FROM account ORDER \
                     BY public_key",
                )?;
                let rows = statement.query_map([], |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?;
                let mut records = Vec::new();
                for row in rows {
                    let (public_key, balance, representative, persisted_at) = row?;
                    records.push(decode_account(
                        &public_key,
                        balance,
                        &representative,
                        persisted_at,
                    )?);
                }
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    async fn find_all_weights(&self) -> Result<Vec<AmountView>, StoreError> {
        let rows = self
            .run_blocking(|connection| -> Result<Vec<(PublicKey, i64)>, SqliteStoreError> {
                let mut statement =
                    connection.prepare("SELECT representative, balance FROM account")?;
                let rows = statement.query_map([], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    let (representative, balance) = row?;
                    let representative = decode_key(&representative)
                        .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
                    out.push((representative, balance));
                }
                Ok(out)
            })
            .await?;
        Ok(sum_weights(rows))
    }

    async fn readiness(&self) -> Result<(), StoreError> {
        self.run_blocking(|connection| -> Result<(), SqliteStoreError> {
            connection.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Migrations
// ============================================================================

/// Applies pending scripts inside one immediate transaction.
fn migrate_connection(connection: &mut Connection) -> Result<MigrationReport, MigrationError> {
    connection.execute_batch(HISTORY_DDL).map_err(SqliteStoreError::from)?;
    let tx = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(SqliteStoreError::from)?;
    let history = read_history(&tx)?;
    let pending = plan_migrations(MIGRATIONS, &history)?;
    let mut report = MigrationReport::default();
    for migration in pending {
        let failed = |err: rusqlite::Error| MigrationError::Failed {
            version: migration.version,
            message: err.to_string(),
        };
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO schema_history (version, description, checksum, applied_at) VALUES (?1, \
             ?2, ?3, ?4)",
            params![
                i64::from(migration.version),
                migration.description,
                migration.checksum(),
                Timestamp::now().as_unix_millis()
            ],
        )
        .map_err(failed)?;
        info!(
            version = migration.version,
            description = migration.description,
            "migration applied"
        );
        report.applied.push(migration.version);
    }
    tx.commit().map_err(SqliteStoreError::from)?;
    report.current_version = history
        .iter()
        .map(|record| record.version)
        .chain(report.applied.iter().copied())
        .max();
    Ok(report)
}

/// Reads schema history rows, ascending by version.
fn read_history(connection: &Connection) -> Result<Vec<AppliedMigration>, MigrationError> {
    let mut statement = connection
        .prepare(
            "SELECT version, description, checksum, applied_at FROM schema_history ORDER BY \
             version",
        )
        .map_err(SqliteStoreError::from)?;
    let rows = statement
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .map_err(SqliteStoreError::from)?;
    let mut history = Vec::new();
    for row in rows {
        let (version, description, checksum, applied_at) = row.map_err(SqliteStoreError::from)?;
        let version = u32::try_from(version).map_err(|_| {
            MigrationError::InvalidPlan(format!("history version out of range: {version}"))
        })?;
        history.push(AppliedMigration {
            version,
            description,
            checksum,
            applied_at: Timestamp::from_unix_millis(applied_at),
        });
    }
    Ok(history)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rebuilds an account from raw column values.
fn decode_account(
    public_key: &[u8],
    balance: i64,
    representative: &[u8],
    persisted_at: i64,
) -> Result<AccountRecord, SqliteStoreError> {
    let public_key =
        decode_key(public_key).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
    let representative =
        decode_key(representative).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
    Ok(AccountRecord::new(public_key, balance, representative)
        .into_persisted(Timestamp::from_unix_millis(persisted_at)))
}

/// Ensures the parent directory for the store path exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
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
    if path.is_dir() {
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
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
