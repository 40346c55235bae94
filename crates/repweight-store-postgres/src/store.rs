// crates/repweight-store-postgres/src/store.rs
// ============================================================================
// Module: Postgres Account Store
// Description: Pooled AccountStore backed by Postgres.
// Purpose: Provide durable shared storage for server deployments.
// Dependencies: repweight-core, postgres, r2d2, r2d2_postgres, num-bigint, tokio
// ============================================================================

//! ## Overview
//! This module implements [`AccountStore`] on a bounded `r2d2` pool of
//! synchronous `postgres` clients. Every query runs on the blocking thread
//! pool. Weights are summed by the server as `NUMERIC` and shipped as text so
//! totals past the `i64` range stay exact. Schema changes go through
//! [`PostgresAccountStore::migrate`], serialized across processes by an
//! exclusive lock on the history table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigInt;
use postgres::GenericClient;
use postgres::NoTls;
use postgres::error::SqlState;
use r2d2::Pool;
use r2d2::PooledConnection;
use r2d2_postgres::PostgresConnectionManager;
use repweight_core::AccountRecord;
use repweight_core::AccountStore;
use repweight_core::AmountView;
use repweight_core::AppliedMigration;
use repweight_core::Migration;
use repweight_core::MigrationError;
use repweight_core::MigrationReport;
use repweight_core::StoreError;
use repweight_core::Timestamp;
use repweight_core::decode_key;
use repweight_core::encode_key;
use repweight_core::plan_migrations;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema scripts shipped with this backend, ascending by version.
pub static MIGRATIONS: &[Migration] = &[
    Migration::new(1, "create account", include_str!("../migrations/V1__create_account.sql")),
    Migration::new(
        2,
        "index representative",
        include_str!("../migrations/V2__index_representative.sql"),
    ),
];

/// History table holding one row per applied script.
const HISTORY_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_history (
    version BIGINT NOT NULL PRIMARY KEY,
    description TEXT NOT NULL,
    checksum TEXT NOT NULL,
    applied_at BIGINT NOT NULL
);";

/// Pooled client type.
type PooledClient = PooledConnection<PostgresConnectionManager<NoTls>>;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Postgres store configuration.
///
/// # Invariants
/// - Timeouts are milliseconds and must be greater than zero.
/// - `password` never appears in `Debug` output or in [`Self::url`].
#[derive(Clone, Deserialize)]
pub struct PostgresStoreConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Optional login password.
    #[serde(default)]
    pub password: Option<String>,
    /// Maximum pool size.
    pub max_connections: u32,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Statement timeout in milliseconds.
    pub statement_timeout_ms: u64,
}

impl Default for PostgresStoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "repweight".to_string(),
            user: "repweight".to_string(),
            password: None,
            max_connections: 16,
            connect_timeout_ms: 5_000,
            statement_timeout_ms: 30_000,
        }
    }
}

impl fmt::Debug for PostgresStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresStoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .finish()
    }
}

impl PostgresStoreConfig {
    /// Returns the credential-free connection URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("postgresql://{}:{}/{}", self.host, self.port, self.database)
    }

    /// Validates pool and timeout limits.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError::Invalid`] when a field is empty or zero.
    pub fn validate(&self) -> Result<(), PostgresStoreError> {
        if self.host.trim().is_empty() {
            return Err(PostgresStoreError::Invalid("host must not be empty".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(PostgresStoreError::Invalid("database must not be empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(PostgresStoreError::Invalid("user must not be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(PostgresStoreError::Invalid(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(PostgresStoreError::Invalid(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.statement_timeout_ms == 0 {
            return Err(PostgresStoreError::Invalid(
                "statement_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the client configuration.
    fn client_config(&self) -> postgres::Config {
        let mut pg_config = postgres::Config::new();
        pg_config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .options(&format!("-c statement_timeout={}", self.statement_timeout_ms));
        if let Some(password) = &self.password {
            pg_config.password(password);
        }
        pg_config
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Postgres store errors.
///
/// # Invariants
/// - Messages never embed connection credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostgresStoreError {
    /// Postgres error.
    #[error("postgres store error: {0}")]
    Postgres(String),
    /// Connection pool error.
    #[error("postgres store pool error: {0}")]
    Pool(String),
    /// Schema constraint rejected a row.
    #[error("postgres store constraint violation: {0}")]
    Constraint(String),
    /// Stored row failed validation.
    #[error("postgres store corruption: {0}")]
    Corrupt(String),
    /// Invalid configuration or request.
    #[error("postgres store invalid data: {0}")]
    Invalid(String),
}

impl From<postgres::Error> for PostgresStoreError {
    fn from(error: postgres::Error) -> Self {
        match error.code() {
            Some(code) if is_constraint_violation(code) => Self::Constraint(error.to_string()),
            _ => Self::Postgres(error.to_string()),
        }
    }
}

impl From<PostgresStoreError> for StoreError {
    fn from(error: PostgresStoreError) -> Self {
        match error {
            PostgresStoreError::Postgres(message) | PostgresStoreError::Pool(message) => {
                Self::Unavailable(message)
            }
            PostgresStoreError::Constraint(message) => Self::ConstraintViolation(message),
            PostgresStoreError::Corrupt(message) => Self::Corrupt(message),
            PostgresStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

impl From<PostgresStoreError> for MigrationError {
    fn from(error: PostgresStoreError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

/// Returns true for SQLSTATE codes raised by schema constraints.
fn is_constraint_violation(code: &SqlState) -> bool {
    *code == SqlState::CHECK_VIOLATION
        || *code == SqlState::UNIQUE_VIOLATION
        || *code == SqlState::NOT_NULL_VIOLATION
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Postgres-backed account store.
///
/// # Invariants
/// - The pool is only used from blocking threads.
/// - The pool is dropped off the async executor.
pub struct PostgresAccountStore {
    /// Connection pool for Postgres access.
    pool: Option<Pool<PostgresConnectionManager<NoTls>>>,
}

impl Drop for PostgresAccountStore {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let _ = std::thread::spawn(move || drop(pool));
        }
    }
}

impl PostgresAccountStore {
    /// Builds the pool and verifies the server is reachable.
    ///
    /// This call blocks; async hosts must run it on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] when the config is invalid or no
    /// connection can be established within the connect timeout.
    pub fn connect(config: &PostgresStoreConfig) -> Result<Self, PostgresStoreError> {
        config.validate()?;
        let manager = PostgresConnectionManager::new(config.client_config(), NoTls);
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build(manager)
            .map_err(|err| PostgresStoreError::Pool(err.to_string()))?;
        info!(endpoint = %config.url(), "postgres account store connected");
        Ok(Self {
            pool: Some(pool),
        })
    }

    /// Applies every pending schema script.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] when history is inconsistent with the
    /// bundled scripts or a script fails. Nothing is applied on failure.
    pub async fn migrate(&self) -> Result<MigrationReport, MigrationError> {
        self.run_blocking(migrate_client).await
    }

    /// Returns the recorded schema history, ascending by version.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] when history cannot be read.
    pub async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>, MigrationError> {
        self.run_blocking(|client| -> Result<Vec<AppliedMigration>, MigrationError> {
            client.batch_execute(HISTORY_DDL).map_err(PostgresStoreError::from)?;
            read_history(&mut **client)
        })
        .await
    }

    /// Runs `op` with a pooled client on the blocking pool.
    async fn run_blocking<T, E, F>(&self, op: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<PostgresStoreError> + Send + 'static,
        F: FnOnce(&mut PooledClient) -> Result<T, E> + Send + 'static,
    {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| PostgresStoreError::Pool("postgres store closed".to_string()))?
            .clone();
        tokio::task::spawn_blocking(move || {
            let mut client = pool.get().map_err(|err| PostgresStoreError::Pool(err.to_string()))?;
            op(&mut client)
        })
        .await
        .map_err(|err| E::from(PostgresStoreError::Pool(format!("blocking task failed: {err}"))))?
    }
}

#[async_trait]
impl AccountStore for PostgresAccountStore {
    async fn save(&self, record: AccountRecord) -> Result<AccountRecord, StoreError> {
        let saved = self
            .run_blocking(move |client| -> Result<AccountRecord, PostgresStoreError> {
                let since = record.persisted_at().unwrap_or_else(Timestamp::now);
                let public_key = encode_key(&record.public_key);
                let representative = encode_key(&record.representative);
                let row = client.query_one(
                    "INSERT INTO account (public_key, balance, representative, persisted_at) \
                     VALUES ($1, $2, $3, $4) ON CONFLICT (public_key) DO UPDATE SET balance = \
                     EXCLUDED.balance, representative = EXCLUDED.representative RETURNING \
                     persisted_at",
                    &[&public_key, &record.balance, &representative, &since.as_unix_millis()],
                )?;
                let stored: i64 = row.try_get(0)?;
                Ok(record.into_persisted(Timestamp::from_unix_millis(stored)))
            })
            .await?;
        debug!(public_key = %saved.public_key, balance = saved.balance, "account saved");
        Ok(saved)
    }

    async fn find_all(&self) -> Result<Vec<AccountRecord>, StoreError> {
        let records = self
            .run_blocking(|client| -> Result<Vec<AccountRecord>, PostgresStoreError> {
                let rows = client.query(
                    "SELECT public_key, balance, representative, persisted_at FROM account ORDER \
                     BY public_key",
                    &[],
                )?;
                let mut records = Vec::with_capacity(rows.len());
                for row in rows {
                    let public_key: Vec<u8> = row.try_get(0)?;
                    let balance: i64 = row.try_get(1)?;
                    let representative: Vec<u8> = row.try_get(2)?;
                    let persisted_at: i64 = row.try_get(3)?;
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
        let weights = self
            .run_blocking(|client| -> Result<Vec<AmountView>, PostgresStoreError> {
                let rows = client.query(
                    "SELECT representative, SUM(balance)::TEXT FROM account GROUP BY \
                     representative ORDER BY representative",
                    &[],
                )?;
                let mut weights = Vec::with_capacity(rows.len());
                for row in rows {
                    let representative: Vec<u8> = row.try_get(0)?;
                    let total: String = row.try_get(1)?;
                    weights.push(decode_weight(&representative, &total)?);
                }
                Ok(weights)
            })
            .await?;
        Ok(weights)
    }

    async fn readiness(&self) -> Result<(), StoreError> {
        self.run_blocking(|client| -> Result<(), PostgresStoreError> {
            client.batch_execute("SELECT 1")?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Migrations
// ============================================================================

/// Applies pending scripts inside one transaction holding the history lock.
fn migrate_client(client: &mut PooledClient) -> Result<MigrationReport, MigrationError> {
    client.batch_execute(HISTORY_DDL).map_err(PostgresStoreError::from)?;
    let mut tx = client.transaction().map_err(PostgresStoreError::from)?;
    tx.batch_execute("LOCK TABLE schema_history IN EXCLUSIVE MODE")
        .map_err(PostgresStoreError::from)?;
    let history = read_history(&mut tx)?;
    let pending = plan_migrations(MIGRATIONS, &history)?;
    let mut report = MigrationReport::default();
    for migration in pending {
        let failed = |err: postgres::Error| MigrationError::Failed {
            version: migration.version,
            message: err.to_string(),
        };
        tx.batch_execute(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO schema_history (version, description, checksum, applied_at) VALUES ($1, \
             $2, $3, $4)",
            &[
                &i64::from(migration.version),
                &migration.description,
                &migration.checksum(),
                &Timestamp::now().as_unix_millis(),
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
    tx.commit().map_err(PostgresStoreError::from)?;
    report.current_version = history
        .iter()
        .map(|record| record.version)
        .chain(report.applied.iter().copied())
        .max();
    Ok(report)
}

/// Reads schema history rows, ascending by version.
fn read_history<C>(client: &mut C) -> Result<Vec<AppliedMigration>, MigrationError>
where
    C: GenericClient,
{
    let rows = client
        .query(
            "SELECT version, description, checksum, applied_at FROM schema_history ORDER BY \
             version",
            &[],
        )
        .map_err(PostgresStoreError::from)?;
    let mut history = Vec::with_capacity(rows.len());
    for row in rows {
        let version: i64 = row.try_get(0).map_err(PostgresStoreError::from)?;
        let version = u32::try_from(version).map_err(|_| {
            MigrationError::InvalidPlan(format!("history version out of range: {version}"))
        })?;
        history.push(AppliedMigration {
            version,
            description: row.try_get(1).map_err(PostgresStoreError::from)?,
            checksum: row.try_get(2).map_err(PostgresStoreError::from)?,
            applied_at: Timestamp::from_unix_millis(
                row.try_get(3).map_err(PostgresStoreError::from)?,
            ),
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
) -> Result<AccountRecord, PostgresStoreError> {
    let public_key =
        decode_key(public_key).map_err(|err| PostgresStoreError::Corrupt(err.to_string()))?;
    let representative =
        decode_key(representative).map_err(|err| PostgresStoreError::Corrupt(err.to_string()))?;
    Ok(AccountRecord::new(public_key, balance, representative)
        .into_persisted(Timestamp::from_unix_millis(persisted_at)))
}

/// Rebuilds a weight from its key column and decimal text total.
fn decode_weight(representative: &[u8], total: &str) -> Result<AmountView, PostgresStoreError> {
    let public_key =
        decode_key(representative).map_err(|err| PostgresStoreError::Corrupt(err.to_string()))?;
    let weight = total.parse::<BigInt>().map_err(|err| {
        PostgresStoreError::Corrupt(format!("weight for {public_key} is not an integer: {err}"))
    })?;
    Ok(AmountView {
        public_key,
        weight,
    })
}
