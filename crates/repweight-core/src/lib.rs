// crates/repweight-core/src/lib.rs
// ============================================================================
// Module: Repweight Core Library
// Description: Public API surface for the Repweight core.
// Purpose: Expose account types, the store interface, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Repweight core defines the account model keyed by 32-byte public keys, the
//! storage interface that backends implement, the migration planner shared by
//! every relational backend, and the startup routine that seeds one account
//! and aggregates representative weights. It is backend-agnostic: concrete
//! databases live in the `repweight-store-*` crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::AccountStore;
pub use interfaces::StoreError;
pub use runtime::AppliedMigration;
pub use runtime::BootstrapReport;
pub use runtime::InMemoryAccountStore;
pub use runtime::Migration;
pub use runtime::MigrationError;
pub use runtime::MigrationReport;
pub use runtime::SharedAccountStore;
pub use runtime::bootstrap;
pub use runtime::plan_migrations;
