// crates/repweight-store-postgres/tests/postgres_store.rs
// ============================================================================
// Module: Postgres Store Tests
// Description: Tests for Postgres store configuration and connection failure.
// Purpose: Validate error handling without a live database.
// ============================================================================

//! Postgres store tests that need no server.

#![allow(
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

use repweight_core::MigrationError;
use repweight_core::StoreError;
use repweight_store_postgres::MIGRATIONS;
use repweight_store_postgres::PostgresAccountStore;
use repweight_store_postgres::PostgresStoreConfig;
use repweight_store_postgres::PostgresStoreError;

#[test]
fn postgres_store_default_config_is_valid_shape() {
    let config = PostgresStoreConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.max_connections > 0);
    assert!(config.connect_timeout_ms > 0);
    assert!(config.statement_timeout_ms > 0);
    assert!(config.validate().is_ok());
}

#[test]
fn postgres_store_unreachable_server_fails() {
    let config = PostgresStoreConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        max_connections: 1,
        connect_timeout_ms: 250,
        ..PostgresStoreConfig::default()
    };
    let result = PostgresAccountStore::connect(&config);
    assert!(matches!(result, Err(PostgresStoreError::Pool(_))));
}

#[test]
fn postgres_store_invalid_config_fails_before_connecting() {
    let config = PostgresStoreConfig {
        host: String::new(),
        ..PostgresStoreConfig::default()
    };
    let result = PostgresAccountStore::connect(&config);
    assert!(matches!(result, Err(PostgresStoreError::Invalid(_))));
}

#[test]
fn postgres_store_errors_map_to_store_errors() {
    let unavailable = StoreError::from(PostgresStoreError::Pool("down".to_string()));
    assert_eq!(unavailable, StoreError::Unavailable("down".to_string()));
    let constraint = StoreError::from(PostgresStoreError::Constraint("check".to_string()));
    assert_eq!(constraint, StoreError::ConstraintViolation("check".to_string()));
    let migration = MigrationError::from(PostgresStoreError::Pool("down".to_string()));
    assert!(matches!(migration, MigrationError::Unavailable(_)));
}

#[test]
fn postgres_store_config_deserializes_with_optional_password() {
    let json = r#"{
        "host": "db",
        "port": 5433,
        "database": "weights",
        "user": "svc",
        "max_connections": 4,
        "connect_timeout_ms": 1000,
        "statement_timeout_ms": 2000
    }"#;
    let config: PostgresStoreConfig = serde_json::from_str(json).expect("deserialize");
    assert_eq!(config.password, None);
    assert_eq!(config.url(), "postgresql://db:5433/weights");
}

#[test]
fn postgres_store_scripts_are_versioned_from_one() {
    let versions: Vec<u32> = MIGRATIONS.iter().map(|migration| migration.version).collect();
    assert_eq!(versions, vec![1, 2]);
}
