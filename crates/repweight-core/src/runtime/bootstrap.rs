// crates/repweight-core/src/runtime/bootstrap.rs
// ============================================================================
// Module: Repweight Bootstrap
// Description: Startup routine that seeds one account and aggregates weights.
// Purpose: Exercise the store end to end once schema migration has succeeded.
// Dependencies: crate::core, crate::interfaces, tracing
// ============================================================================

//! ## Overview
//! [`bootstrap`] writes a self-represented account carrying the maximum
//! balance and then runs the weight aggregation once. Hosts must migrate the
//! schema before calling it; a failed migration must never reach this point.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tracing::debug;
use tracing::info;

use crate::core::AccountRecord;
use crate::core::AmountView;
use crate::core::PublicKey;
use crate::interfaces::AccountStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Bootstrap
// ============================================================================

/// Balance assigned to the seed account.
pub const SEED_BALANCE: i64 = i64::MAX;

/// Result of a bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Seed account as persisted.
    pub seeded: AccountRecord,
    /// Weights observed after seeding.
    pub weights: Vec<AmountView>,
}

/// Seeds a self-represented account for `seed_key` and aggregates weights.
///
/// # Errors
///
/// Returns [`StoreError`] when the seed write or the aggregation fails.
pub async fn bootstrap<S>(store: &S, seed_key: PublicKey) -> Result<BootstrapReport, StoreError>
where
    S: AccountStore + ?Sized,
{
    let seeded = store.save(AccountRecord::self_represented(seed_key, SEED_BALANCE)).await?;
    info!(public_key = %seeded.public_key, balance = seeded.balance, "seed account saved");
    let weights = store.find_all_weights().await?;
    for view in &weights {
        debug!(representative = %view.public_key, weight = %view.weight, "representative weight");
    }
    info!(representatives = weights.len(), "weight aggregation complete");
    Ok(BootstrapReport {
        seeded,
        weights,
    })
}
