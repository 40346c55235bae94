// crates/repweight-core/src/runtime/store.rs
// ============================================================================
// Module: Repweight In-Memory Store
// Description: In-memory account store and shared store wrapper.
// Purpose: Provide a deterministic store without external deps plus weight folding.
// Dependencies: crate::core, crate::interfaces, num-bigint
// ============================================================================

//! ## Overview
//! This module provides a simple in-memory implementation of [`AccountStore`]
//! for tests and local demos, the [`SharedAccountStore`] wrapper used by hosts
//! that pick a backend at runtime, and [`sum_weights`], the exact per
//! representative fold shared by backends that cannot sum in SQL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use num_bigint::BigInt;

use crate::core::AccountRecord;
use crate::core::AmountView;
use crate::core::PublicKey;
use crate::core::Timestamp;
use crate::interfaces::AccountStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Weight Folding
// ============================================================================

/// Sums balances per representative with arbitrary precision.
///
/// Output is ordered by representative key.
pub fn sum_weights<I>(rows: I) -> Vec<AmountView>
where
    I: IntoIterator<Item = (PublicKey, i64)>,
{
    let mut totals: BTreeMap<PublicKey, BigInt> = BTreeMap::new();
    for (representative, balance) in rows {
        *totals.entry(representative).or_default() += balance;
    }
    totals
        .into_iter()
        .map(|(public_key, weight)| AmountView {
            public_key,
            weight,
        })
        .collect()
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory account store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountStore {
    /// Account map protected by a mutex.
    accounts: Arc<Mutex<BTreeMap<PublicKey, AccountRecord>>>,
}

impl InMemoryAccountStore {
    /// Creates a new in-memory account store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn save(&self, record: AccountRecord) -> Result<AccountRecord, StoreError> {
        let mut guard = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account store mutex poisoned".to_string()))?;
        let since = guard
            .get(&record.public_key)
            .and_then(AccountRecord::persisted_at)
            .or_else(|| record.persisted_at())
            .unwrap_or_else(Timestamp::now);
        let stored = record.into_persisted(since);
        guard.insert(stored.public_key, stored.clone());
        drop(guard);
        Ok(stored)
    }

    async fn find_all(&self) -> Result<Vec<AccountRecord>, StoreError> {
        let guard = self
            .accounts
            .lock()
            .map_err(|_| StoreError::Unavailable("account store mutex poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }

    async fn find_all_weights(&self) -> Result<Vec<AmountView>, StoreError> {
        let rows: Vec<(PublicKey, i64)> = {
            let guard = self.accounts.lock().map_err(|_| {
                StoreError::Unavailable("account store mutex poisoned".to_string())
            })?;
            guard.values().map(|record| (record.representative, record.balance)).collect()
        };
        Ok(sum_weights(rows))
    }
}

// ============================================================================
// SECTION: Shared Store Wrapper
// ============================================================================

/// Shared account store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedAccountStore {
    /// Inner store implementation.
    inner: Arc<dyn AccountStore>,
}

impl SharedAccountStore {
    /// Wraps an account store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl AccountStore + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            inner: store,
        }
    }
}

#[async_trait]
impl AccountStore for SharedAccountStore {
    async fn save(&self, record: AccountRecord) -> Result<AccountRecord, StoreError> {
        self.inner.save(record).await
    }

    async fn find_all(&self) -> Result<Vec<AccountRecord>, StoreError> {
        self.inner.find_all().await
    }

    async fn find_all_weights(&self) -> Result<Vec<AmountView>, StoreError> {
        self.inner.find_all_weights().await
    }

    async fn readiness(&self) -> Result<(), StoreError> {
        self.inner.readiness().await
    }
}
