// crates/repweight-store-sqlite/src/lib.rs
// ============================================================================
// Module: Repweight SQLite Store
// Description: SQLite-backed account persistence.
// Purpose: Durable single-file storage for local and embedded deployments.
// ============================================================================

//! ## Overview
//! `SQLite` implementation of the Repweight [`AccountStore`] interface with
//! versioned schema migrations.
//!
//! [`AccountStore`]: repweight_core::AccountStore

pub mod store;

pub use store::MIGRATIONS;
pub use store::SqliteAccountStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
