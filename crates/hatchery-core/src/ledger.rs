// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stock ledger and per-product serialization.
//!
//! Database guards make individual debits and credits safe, but admission
//! must process a product's pending queue in order without interleaving with
//! other passes over the same product. [`ProductLocks`] provides a lazily
//! created async mutex per product ID for that.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::CoreError;
use crate::persistence::{DebitOutcome, Persistence, ProductRecord};

/// Lazily created per-product async mutexes.
///
/// Cheap to clone; all clones share the same lock table.
#[derive(Clone, Default)]
pub struct ProductLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ProductLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a product, waiting if another pass holds it.
    pub async fn acquire(&self, product_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(product_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

/// Stock ledger over the persistence layer.
///
/// All stock movement goes through here. Debits are conditional and
/// all-or-nothing; credits happen only when a debit is being undone.
#[derive(Clone)]
pub struct StockLedger {
    persistence: Arc<dyn Persistence>,
}

impl StockLedger {
    /// Create a ledger backed by the given persistence.
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    /// Look up a product.
    pub async fn product(&self, product_id: &str) -> Result<Option<ProductRecord>, CoreError> {
        self.persistence.get_product(product_id).await
    }

    /// Attempt to debit `quantity` units. Never leaves stock negative.
    pub async fn try_debit(
        &self,
        product_id: &str,
        quantity: i32,
    ) -> Result<DebitOutcome, CoreError> {
        self.persistence.try_debit_stock(product_id, quantity).await
    }

    /// Credit `quantity` units back, undoing a prior debit.
    pub async fn credit(&self, product_id: &str, quantity: i32) -> Result<(), CoreError> {
        self.persistence.credit_stock(product_id, quantity).await
    }
}
