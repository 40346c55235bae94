// crates/repweight-core/src/interfaces/mod.rs
// ============================================================================
// Module: Repweight Interfaces
// Description: Backend-agnostic storage interface for accounts.
// Purpose: Define the contract every account store backend implements.
// Dependencies: crate::core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! [`AccountStore`] is the only seam between Repweight and a database. All
//! operations are asynchronous; backends built on blocking drivers must move
//! their work off the async executor. Stored data is untrusted: backends
//! re-validate keys on read and report malformed rows as
//! [`StoreError::Corrupt`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::core::AccountRecord;
use crate::core::AmountView;

// ============================================================================
// SECTION: Account Store
// ============================================================================

/// Account store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed connection credentials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backing storage could not be reached.
    #[error("account store unavailable: {0}")]
    Unavailable(String),
    /// Storage schema rejected the row.
    #[error("account store constraint violation: {0}")]
    ConstraintViolation(String),
    /// Stored data failed validation on read.
    #[error("account store corruption: {0}")]
    Corrupt(String),
    /// Request was rejected before reaching storage.
    #[error("account store invalid request: {0}")]
    Invalid(String),
}

/// Persistent account storage.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Upserts an account by key and returns it in the persisted state.
    ///
    /// Transient records are stamped with the current time; an existing row
    /// keeps its original persistence time and has its balance and
    /// representative replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when storage cannot be reached and
    /// [`StoreError::ConstraintViolation`] when the schema rejects the row.
    async fn save(&self, record: AccountRecord) -> Result<AccountRecord, StoreError>;

    /// Returns every stored account.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails or a row is malformed.
    async fn find_all(&self) -> Result<Vec<AccountRecord>, StoreError>;

    /// Returns the summed balance for every distinct representative.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or a row is malformed.
    async fn find_all_weights(&self) -> Result<Vec<AmountView>, StoreError>;

    /// Reports store readiness for startup and health probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store cannot serve requests.
    async fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
