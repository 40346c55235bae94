//! Config file loading tests for repweight-config.
// crates/repweight-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Tests
// Description: Validate file resolution, size limits, and encoding checks.
// Purpose: Ensure config files are read fail-closed.
// =============================================================================

use std::fs;

use repweight_config::ConfigError;
use repweight_config::DatabaseBackend;
use repweight_config::RepweightConfig;
use tempfile::TempDir;

type TestResult = Result<(), String>;

#[test]
fn load_reads_explicit_path() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("repweight.toml");
    fs::write(
        &path,
        "[database]\nbackend = \"sqlite\"\npath = \"store.db\"\n\n[logging]\nlevel = \"debug\"\n",
    )
    .map_err(|err| err.to_string())?;
    let config = RepweightConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.database.backend != DatabaseBackend::Sqlite || config.logging.level != "debug" {
        return Err("loaded config did not match file".to_string());
    }
    Ok(())
}

#[test]
fn load_missing_file_is_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match RepweightConfig::load(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("unexpected error {other}")),
        Ok(_) => Err("missing file should fail".to_string()),
    }
}

#[test]
fn load_without_any_file_uses_defaults_and_environment() -> TestResult {
    let lookup = |name: &str| match name {
        "REPWEIGHT_DB_HOST" => Some("db.internal".to_string()),
        "REPWEIGHT_DB_PASSWORD" => Some("secret".to_string()),
        _ => None,
    };
    let config = RepweightConfig::load_with_env(None, lookup).map_err(|err| err.to_string())?;
    if config.database.backend != DatabaseBackend::Postgres
        || config.database.host != "db.internal"
        || config.database.password.as_deref() != Some("secret")
    {
        return Err("environment overrides were not applied to defaults".to_string());
    }
    Ok(())
}

#[test]
fn config_env_path_must_name_existing_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let missing = dir.path().join("absent.toml").to_string_lossy().into_owned();
    let lookup = move |name: &str| (name == "REPWEIGHT_CONFIG").then(|| missing.clone());
    match RepweightConfig::load_with_env(None, lookup) {
        Err(ConfigError::Io(_)) => Ok(()),
        Err(other) => Err(format!("unexpected error {other}")),
        Ok(_) => Err("missing REPWEIGHT_CONFIG file should fail".to_string()),
    }
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("big.toml");
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    match RepweightConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("size limit") => Ok(()),
        Err(other) => Err(format!("unexpected error {other}")),
        Ok(_) => Err("oversized file should fail".to_string()),
    }
}

#[test]
fn load_rejects_non_utf8() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("binary.toml");
    fs::write(&path, [0xff_u8, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    match RepweightConfig::load(Some(&path)) {
        Err(ConfigError::Invalid(message)) if message.contains("utf-8") => Ok(()),
        Err(other) => Err(format!("unexpected error {other}")),
        Ok(_) => Err("non utf-8 file should fail".to_string()),
    }
}

#[test]
fn load_rejects_malformed_toml() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[database\nhost = ").map_err(|err| err.to_string())?;
    match RepweightConfig::load(Some(&path)) {
        Err(ConfigError::Parse(_)) => Ok(()),
        Err(other) => Err(format!("unexpected error {other}")),
        Ok(_) => Err("malformed file should fail".to_string()),
    }
}
