// system-tests/tests/helpers/infra.rs
// ============================================================================
// Module: System Test Infrastructure
// Description: Postgres fixtures for store system-tests.
// Purpose: Provide an isolated, migrated-on-demand database per test.
// Dependencies: testcontainers, postgres, repweight-store-postgres
// ============================================================================

//! ## Overview
//! [`TestDatabase`] provisions a throwaway Postgres container and releases it
//! when the fixture goes out of scope. When `REPWEIGHT_SYSTEM_PG_URL` names an
//! external server, that server is used instead: fixtures then take a
//! process-wide lock and drop the Repweight tables on start so suites never
//! see each other's rows.

use std::env;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use postgres::NoTls;
use repweight_store_postgres::PostgresAccountStore;
use repweight_store_postgres::PostgresStoreConfig;
use system_tests::CONNECT_ATTEMPTS;
use system_tests::CONNECT_RETRY_DELAY_MS;
use system_tests::CONTAINER_CREDENTIAL;
use system_tests::POSTGRES_IMAGE;
use system_tests::POSTGRES_TAG;
use system_tests::SYSTEM_PG_URL_ENV;
use testcontainers::ContainerAsync;
use testcontainers::GenericImage;
use testcontainers::ImageExt;
use testcontainers::core::IntoContainerPort;
use testcontainers::core::WaitFor;
use testcontainers::runners::AsyncRunner;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

/// Postgres server scoped to one test.
pub struct TestDatabase {
    /// Connection settings for the server.
    config: PostgresStoreConfig,
    /// Serializes tests sharing an external server.
    _guard: Option<OwnedMutexGuard<()>>,
    /// Container owned by the fixture, if any.
    _container: Option<ContainerAsync<GenericImage>>,
}

impl TestDatabase {
    /// Starts a container or claims the external server.
    pub async fn start() -> Result<Self, String> {
        if let Ok(url) = env::var(SYSTEM_PG_URL_ENV) {
            let guard = external_lock().lock_owned().await;
            let fixture = Self {
                config: external_config(&url)?,
                _guard: Some(guard),
                _container: None,
            };
            fixture.wait_until_ready().await?;
            fixture
                .raw(|client| {
                    client.batch_execute(
                        "DROP TABLE IF EXISTS account; DROP TABLE IF EXISTS schema_history;",
                    )
                })
                .await?
                .map_err(|err| format!("failed to reset external database: {err}"))?;
            return Ok(fixture);
        }

        ensure_docker_available()?;
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", CONTAINER_CREDENTIAL)
            .with_env_var("POSTGRES_PASSWORD", CONTAINER_CREDENTIAL)
            .with_env_var("POSTGRES_DB", CONTAINER_CREDENTIAL)
            .start()
            .await
            .map_err(|err| format!("failed to start postgres container: {err}"))?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .map_err(|err| format!("failed to resolve postgres port: {err}"))?;
        let fixture = Self {
            config: PostgresStoreConfig {
                host: "127.0.0.1".to_string(),
                port,
                database: CONTAINER_CREDENTIAL.to_string(),
                user: CONTAINER_CREDENTIAL.to_string(),
                password: Some(CONTAINER_CREDENTIAL.to_string()),
                max_connections: 4,
                connect_timeout_ms: 2_000,
                statement_timeout_ms: 10_000,
            },
            _guard: None,
            _container: Some(container),
        };
        fixture.wait_until_ready().await?;
        Ok(fixture)
    }

    /// Store settings pointing at this server.
    pub fn config(&self) -> PostgresStoreConfig {
        self.config.clone()
    }

    /// Credential-free URL for diagnostics.
    pub fn url(&self) -> String {
        self.config.url()
    }

    /// Opens a pooled store against the server.
    pub async fn connect_store(&self) -> Result<PostgresAccountStore, String> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || PostgresAccountStore::connect(&config))
            .await
            .map_err(|err| format!("connect join failed: {err}"))?
            .map_err(|err| format!("failed to connect to {}: {err}", self.url()))
    }

    /// Runs `op` on a dedicated client outside the store under test.
    pub async fn raw<T, F>(&self, op: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&mut postgres::Client) -> T + Send + 'static,
    {
        let pg_config = client_config(&self.config);
        tokio::task::spawn_blocking(move || {
            let mut client =
                pg_config.connect(NoTls).map_err(|err| format!("raw connect failed: {err}"))?;
            Ok(op(&mut client))
        })
        .await
        .map_err(|err| format!("raw client join failed: {err}"))?
    }

    /// Polls the server until it accepts queries.
    async fn wait_until_ready(&self) -> Result<(), String> {
        let mut last_error = String::new();
        for _ in 0 .. CONNECT_ATTEMPTS {
            match self.raw(|client| client.batch_execute("SELECT 1")).await {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(err)) => last_error = err.to_string(),
                Err(err) => last_error = err,
            }
            tokio::time::sleep(Duration::from_millis(CONNECT_RETRY_DELAY_MS)).await;
        }
        Err(format!("postgres at {} never became ready: {last_error}", self.url()))
    }
}

/// Process-wide lock for the external server.
fn external_lock() -> Arc<Mutex<()>> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    Arc::clone(LOCK.get_or_init(|| Arc::new(Mutex::new(()))))
}

/// Parses the external server URL into store settings.
fn external_config(url: &str) -> Result<PostgresStoreConfig, String> {
    let parsed: postgres::Config =
        url.parse().map_err(|err| format!("invalid {SYSTEM_PG_URL_ENV}: {err}"))?;
    let host = match parsed.get_hosts().first() {
        Some(postgres::config::Host::Tcp(host)) => host.clone(),
        _ => return Err(format!("{SYSTEM_PG_URL_ENV} must name a TCP host")),
    };
    let password = parsed
        .get_password()
        .map(|bytes| String::from_utf8(bytes.to_vec()))
        .transpose()
        .map_err(|_| format!("{SYSTEM_PG_URL_ENV} password must be utf-8"))?;
    Ok(PostgresStoreConfig {
        host,
        port: parsed.get_ports().first().copied().unwrap_or(5432),
        database: parsed.get_dbname().unwrap_or(CONTAINER_CREDENTIAL).to_string(),
        user: parsed.get_user().unwrap_or(CONTAINER_CREDENTIAL).to_string(),
        password,
        max_connections: 4,
        connect_timeout_ms: 2_000,
        statement_timeout_ms: 10_000,
    })
}

/// Builds a raw client configuration from store settings.
fn client_config(config: &PostgresStoreConfig) -> postgres::Config {
    let mut pg_config = postgres::Config::new();
    pg_config
        .host(&config.host)
        .port(config.port)
        .dbname(&config.database)
        .user(&config.user)
        .connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    if let Some(password) = &config.password {
        pg_config.password(password);
    }
    pg_config
}

/// Fails early when no Docker daemon answers.
fn ensure_docker_available() -> Result<(), String> {
    let output = std::process::Command::new("docker")
        .arg("info")
        .output()
        .map_err(|err| format!("docker info failed: {err}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("docker info failed: {stderr}"));
    }
    Ok(())
}
