// crates/repweight-core/src/runtime/mod.rs
// ============================================================================
// Module: Repweight Runtime
// Description: Runtime helpers built on the core types and store interface.
// Purpose: Host the startup routine, migration planner, and reference stores.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime helpers are shared by every backend and host binary.

pub mod bootstrap;
pub mod migration;
pub mod store;

pub use bootstrap::BootstrapReport;
pub use bootstrap::SEED_BALANCE;
pub use bootstrap::bootstrap;
pub use migration::AppliedMigration;
pub use migration::Migration;
pub use migration::MigrationError;
pub use migration::MigrationReport;
pub use migration::plan_migrations;
pub use store::InMemoryAccountStore;
pub use store::SharedAccountStore;
pub use store::sum_weights;
