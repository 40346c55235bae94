// crates/repweight-store-postgres/src/lib.rs
// ============================================================================
// Postgres-backed account persistence for Repweight.
// ============================================================================

//! Postgres storage backend.
//!
//! This crate implements the Repweight account store on a pooled Postgres
//! connection with versioned schema migrations.

/// Postgres-backed account store.
pub mod store;

pub use store::MIGRATIONS;
pub use store::PostgresAccountStore;
pub use store::PostgresStoreConfig;
pub use store::PostgresStoreError;
