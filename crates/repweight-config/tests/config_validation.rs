//! Config defaults, overrides, and validation tests for repweight-config.
// crates/repweight-config/tests/config_validation.rs
// =============================================================================
// Module: Config Defaults and Validation Tests
// Description: Validate default behavior, env overrides, and invariants.
// Purpose: Ensure minimal config is valid and invalid combinations fail closed.
// =============================================================================

use repweight_config::DatabaseBackend;
use repweight_core::PublicKey;

mod common;

type TestResult = Result<(), String>;

#[test]
fn default_config_validates() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    if config.database.backend != DatabaseBackend::Postgres {
        return Err("default backend should be postgres".to_string());
    }
    if !config.seed.enabled {
        return Err("seeding should be enabled by default".to_string());
    }
    Ok(())
}

#[test]
fn default_url_is_credential_free() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.database.password = Some("secret".to_string());
    let url = config.database.url();
    if url != "postgresql://localhost:5432/repweight" {
        return Err(format!("unexpected url {url}"));
    }
    Ok(())
}

#[test]
fn env_overrides_replace_connection_fields() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    let lookup = common::env_lookup(&[
        ("REPWEIGHT_DB_DRIVER", "postgres"),
        ("REPWEIGHT_DB_HOST", "db.internal"),
        ("REPWEIGHT_DB_PORT", "6543"),
        ("REPWEIGHT_DB_NAME", "weights"),
        ("REPWEIGHT_DB_USER", "svc"),
        ("REPWEIGHT_DB_PASSWORD", "pw"),
    ]);
    config.apply_env_overrides(lookup).map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let url = config.database.url();
    if url != "postgres://db.internal:6543/weights" {
        return Err(format!("unexpected url {url}"));
    }
    let store = config.database.postgres_store_config();
    if store.user != "svc" || store.password.as_deref() != Some("pw") || store.port != 6543 {
        return Err("postgres store config did not pick up overrides".to_string());
    }
    Ok(())
}

#[test]
fn env_driver_switches_backend() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config
        .apply_env_overrides(common::env_lookup(&[("REPWEIGHT_DB_DRIVER", "sqlite")]))
        .map_err(|err| err.to_string())?;
    if config.database.backend != DatabaseBackend::Sqlite {
        return Err("driver override should select sqlite".to_string());
    }
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn env_port_must_be_numeric() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    common::assert_invalid(
        config.apply_env_overrides(common::env_lookup(&[("REPWEIGHT_DB_PORT", "abc")])),
        "REPWEIGHT_DB_PORT must be a port number",
    )
}

#[test]
fn env_unknown_driver_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    common::assert_invalid(
        config.apply_env_overrides(common::env_lookup(&[("REPWEIGHT_DB_DRIVER", "mysql")])),
        "unsupported driver",
    )
}

#[test]
fn driver_must_match_backend() -> TestResult {
    let config = common::config_from_toml(
        r#"
        [database]
        backend = "sqlite"
        driver = "postgresql"
        "#,
    )
    .map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "does not match database.backend")
}

#[test]
fn zero_port_is_rejected_for_postgres() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.database.port = 0;
    common::assert_invalid(config.validate(), "database.port must be greater than zero")
}

#[test]
fn zero_port_is_ignored_for_sqlite() -> TestResult {
    let config = common::config_from_toml(
        r#"
        [database]
        backend = "sqlite"
        port = 0
        path = "data/repweight.db"
        "#,
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let url = config.database.url();
    if url != "sqlite://data/repweight.db" {
        return Err(format!("unexpected url {url}"));
    }
    Ok(())
}

#[test]
fn oversized_pool_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.database.max_connections = 1_000;
    common::assert_invalid(config.validate(), "database.max_connections")
}

#[test]
fn zero_statement_timeout_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.database.statement_timeout_ms = 0;
    common::assert_invalid(config.validate(), "database.statement_timeout_ms")
}

#[test]
fn empty_log_level_is_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.logging.level = " ".to_string();
    common::assert_invalid(config.validate(), "logging.level must be non-empty")
}

#[test]
fn seed_key_parses_from_hex() -> TestResult {
    let hex = "ab".repeat(32);
    let config = common::config_from_toml(&format!("[seed]\npublic_key = \"{hex}\"\n"))
        .map_err(|err| err.to_string())?;
    if config.seed.public_key != Some(PublicKey::from_bytes([0xab; 32])) {
        return Err("seed key did not parse".to_string());
    }
    Ok(())
}

#[test]
fn short_seed_key_is_a_parse_error() -> TestResult {
    let hex = "ab".repeat(31);
    match common::config_from_toml(&format!("[seed]\npublic_key = \"{hex}\"\n")) {
        Err(repweight_config::ConfigError::Parse(_)) => Ok(()),
        Err(other) => Err(format!("unexpected error {other}")),
        Ok(_) => Err("short seed key should fail".to_string()),
    }
}

#[test]
fn sqlite_store_config_carries_pragmas() -> TestResult {
    let config = common::config_from_toml(
        r#"
        [database]
        backend = "sqlite"
        path = "store.db"
        busy_timeout_ms = 250
        journal_mode = "delete"
        sync_mode = "normal"
        "#,
    )
    .map_err(|err| err.to_string())?;
    let store = config.database.sqlite_store_config();
    if store.busy_timeout_ms != 250
        || store.journal_mode != repweight_store_sqlite::SqliteStoreMode::Delete
        || store.sync_mode != repweight_store_sqlite::SqliteSyncMode::Normal
    {
        return Err("sqlite store config did not carry pragmas".to_string());
    }
    Ok(())
}
