// crates/repweight-core/src/core/account.rs
// ============================================================================
// Module: Repweight Accounts
// Description: Account records, persistence state, and weight views.
// Purpose: Model the aggregate persisted by every store backend.
// Dependencies: num-bigint, serde
// ============================================================================

//! ## Overview
//! An [`AccountRecord`] holds a balance and names a representative key. A
//! record is either transient (never written) or persisted since a given
//! timestamp; the store decides which when it writes. [`AmountView`] is the
//! result row of the representative weight aggregation and uses an
//! arbitrary-precision integer so sums of many `i64` balances cannot overflow.

// ============================================================================
// SECTION: Imports
// ============================================================================

use num_bigint::BigInt;
use serde::Deserialize;
use serde::Serialize;

use crate::core::key::PublicKey;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Persistence State
// ============================================================================

/// Persistence lifecycle of an account record.
///
/// # Invariants
/// - `Transient` records have never been acknowledged by a store.
/// - `Persisted` carries the timestamp of the first successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PersistenceState {
    /// Not yet written to storage.
    Transient,
    /// Written to storage.
    Persisted {
        /// First write time.
        since: Timestamp,
    },
}

// ============================================================================
// SECTION: Account Record
// ============================================================================

/// Account keyed by its public key.
///
/// # Invariants
/// - `public_key` is the storage identity.
/// - `balance` carries no range restriction.
/// - `representative` may equal `public_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Account identity.
    pub public_key: PublicKey,
    /// Account balance.
    pub balance: i64,
    /// Key receiving this account's weight.
    pub representative: PublicKey,
    /// Persistence lifecycle.
    pub state: PersistenceState,
}

impl AccountRecord {
    /// Creates a transient account record.
    #[must_use]
    pub const fn new(public_key: PublicKey, balance: i64, representative: PublicKey) -> Self {
        Self {
            public_key,
            balance,
            representative,
            state: PersistenceState::Transient,
        }
    }

    /// Creates a transient account that represents itself.
    #[must_use]
    pub const fn self_represented(public_key: PublicKey, balance: i64) -> Self {
        Self::new(public_key, balance, public_key)
    }

    /// Returns true when the record has not been written to storage.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self.state, PersistenceState::Transient)
    }

    /// Returns the first write time for persisted records.
    #[must_use]
    pub const fn persisted_at(&self) -> Option<Timestamp> {
        match self.state {
            PersistenceState::Transient => None,
            PersistenceState::Persisted {
                since,
            } => Some(since),
        }
    }

    /// Returns the record marked as persisted since `since`.
    #[must_use]
    pub fn into_persisted(self, since: Timestamp) -> Self {
        Self {
            state: PersistenceState::Persisted {
                since,
            },
            ..self
        }
    }
}

// ============================================================================
// SECTION: Weight View
// ============================================================================

/// Aggregated weight of one representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountView {
    /// Representative key.
    pub public_key: PublicKey,
    /// Exact sum of balances naming `public_key` as representative.
    pub weight: BigInt,
}
