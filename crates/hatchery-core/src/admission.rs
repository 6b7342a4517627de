// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Admission controller.
//!
//! The central reservation state machine. Runs in two modes: synchronously on
//! reservation creation, and periodically from the scheduler over every
//! product that has pending rows.
//!
//! A processing pass walks one product's pending queue in
//! first-come-first-served order. A reservation younger than the hold
//! interval stops the pass for that product: admitting anything behind it
//! would let a later reservation overtake an earlier one.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::ledger::ProductLocks;
use crate::persistence::{DebitOutcome, ReservationRecord, ReservationStatus};
use crate::store::ReservationStore;

/// Rejection reason for creation against a product with zero stock.
pub const REASON_OUT_OF_STOCK: &str = "Product out of stock";
/// Rejection reason when admission finds stock short of the quantity.
pub const REASON_INSUFFICIENT_STOCK: &str = "Insufficient stock - product out of stock";

/// Outcome of creating a single reservation.
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    /// The new reservation's ID.
    pub reservation_id: String,
    /// Status after the inline admission pass (pending or rejected).
    pub status: ReservationStatus,
    /// Rejection reason, when rejected.
    pub reason: Option<String>,
}

/// One item of a bulk creation request.
#[derive(Debug, Clone)]
pub struct BulkItem {
    /// Product to reserve.
    pub product_id: String,
    /// Units to reserve.
    pub quantity: i32,
}

/// Per-item result of a bulk creation.
#[derive(Debug, Clone)]
pub struct BulkItemOutcome {
    /// The product the item referred to.
    pub product_id: String,
    /// The reservation ID, when a row was created.
    pub reservation_id: Option<String>,
    /// Final status after the initial pass.
    pub status: ReservationStatus,
    /// Rejection reason, when rejected.
    pub reason: Option<String>,
}

/// Counters from one processing pass or sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Reservations transitioned to approved.
    pub approved: usize,
    /// Reservations transitioned to rejected.
    pub rejected: usize,
    /// Reservations left pending (still inside the hold interval).
    pub held: usize,
}

impl PassStats {
    fn absorb(&mut self, other: PassStats) {
        self.approved += other.approved;
        self.rejected += other.rejected;
        self.held += other.held;
    }
}

/// First-come-first-served admission over pending reservations.
#[derive(Clone)]
pub struct AdmissionController {
    store: ReservationStore,
    locks: ProductLocks,
    clock: Arc<dyn Clock>,
    hold_interval: Duration,
}

impl AdmissionController {
    /// Create a controller with the given hold interval.
    pub fn new(
        store: ReservationStore,
        locks: ProductLocks,
        clock: Arc<dyn Clock>,
        hold_interval: Duration,
    ) -> Self {
        Self { store, locks, clock, hold_interval }
    }

    /// Create a reservation and run the inline admission pass.
    ///
    /// A product with zero stock rejects immediately. Otherwise the row is
    /// inserted pending; because its age is near zero the inline pass leaves
    /// it pending until a later scheduler tick, once the hold interval has
    /// elapsed.
    pub async fn create(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i32,
    ) -> Result<CreateOutcome, CoreError> {
        if user_id.is_empty() {
            return Err(CoreError::Validation {
                field: "user_id",
                message: "must not be empty".to_string(),
            });
        }
        if quantity <= 0 {
            return Err(CoreError::Validation {
                field: "quantity",
                message: "must be positive".to_string(),
            });
        }

        let product = self
            .store
            .product(product_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            })?;

        let _guard = self.locks.acquire(product_id).await;
        let now = self.clock.now();

        let mut reservation = ReservationRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            status: ReservationStatus::Pending.as_str().to_string(),
            reserved_at: now,
            approved_at: None,
            completed_at: None,
            rejected_at: None,
            rejected_reason: None,
        };

        if product.stock_amount == 0 {
            reservation.status = ReservationStatus::Rejected.as_str().to_string();
            reservation.rejected_at = Some(now);
            reservation.rejected_reason = Some(REASON_OUT_OF_STOCK.to_string());
            self.store.insert(&reservation).await?;
            info!(reservation_id = %reservation.id, product_id, "reservation rejected at creation");
            return Ok(CreateOutcome {
                reservation_id: reservation.id,
                status: ReservationStatus::Rejected,
                reason: Some(REASON_OUT_OF_STOCK.to_string()),
            });
        }

        self.store.insert(&reservation).await?;
        self.pass_locked(product_id).await?;

        let current = self.store.get_required(&reservation.id).await?;
        let status = current.parsed_status()?;
        info!(reservation_id = %reservation.id, product_id, %status, "reservation created");
        Ok(CreateOutcome {
            reservation_id: reservation.id,
            status,
            reason: current.rejected_reason,
        })
    }

    /// Create one reservation per cart item, reporting per-item results.
    ///
    /// A missing product rejects that item without creating a row; it never
    /// fails the rest of the cart.
    pub async fn create_bulk(
        &self,
        user_id: &str,
        items: &[BulkItem],
    ) -> Result<Vec<BulkItemOutcome>, CoreError> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            match self.create(user_id, &item.product_id, item.quantity).await {
                Ok(outcome) => results.push(BulkItemOutcome {
                    product_id: item.product_id.clone(),
                    reservation_id: Some(outcome.reservation_id),
                    status: outcome.status,
                    reason: outcome.reason,
                }),
                Err(CoreError::NotFound { .. }) => results.push(BulkItemOutcome {
                    product_id: item.product_id.clone(),
                    reservation_id: None,
                    status: ReservationStatus::Rejected,
                    reason: Some("Product not found".to_string()),
                }),
                Err(CoreError::Validation { field, message }) => results.push(BulkItemOutcome {
                    product_id: item.product_id.clone(),
                    reservation_id: None,
                    status: ReservationStatus::Rejected,
                    reason: Some(format!("{}: {}", field, message)),
                }),
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Run a processing pass for one product, taking its lock.
    pub async fn process_product(&self, product_id: &str) -> Result<PassStats, CoreError> {
        let _guard = self.locks.acquire(product_id).await;
        self.pass_locked(product_id).await
    }

    /// Sweep every product that currently has pending reservations.
    ///
    /// A failure on one product is logged and does not halt the others; the
    /// next scheduler tick retries.
    pub async fn process_all_pending(&self) -> Result<PassStats, CoreError> {
        let mut stats = PassStats::default();
        for product_id in self.store.products_with_pending().await? {
            match self.process_product(&product_id).await {
                Ok(pass) => stats.absorb(pass),
                Err(e) => {
                    warn!(product_id = %product_id, error = %e, "admission pass failed");
                }
            }
        }
        Ok(stats)
    }

    /// Approve one pending reservation out of band, waiving the hold
    /// interval for the whole product queue.
    ///
    /// Admission stays first-come-first-served: the queue ahead of the
    /// target is processed first, so an operator approval can never jump an
    /// earlier reservation. Errors with `InsufficientStock` when the target
    /// ends up rejected, `InvalidTransition` when it was not pending.
    pub async fn approve_manual(&self, reservation_id: &str) -> Result<(), CoreError> {
        let reservation = self.store.get_required(reservation_id).await?;
        let status = reservation.parsed_status()?;
        if status != ReservationStatus::Pending {
            return Err(CoreError::InvalidTransition {
                reservation_id: reservation_id.to_string(),
                expected: ReservationStatus::Pending.to_string(),
                actual: reservation.status,
            });
        }

        let _guard = self.locks.acquire(&reservation.product_id).await;
        self.pass_over_queue(&reservation.product_id, true, Some(reservation_id)).await?;

        let current = self.store.get_required(reservation_id).await?;
        match current.parsed_status()? {
            ReservationStatus::Approved => Ok(()),
            ReservationStatus::Rejected => Err(CoreError::InsufficientStock {
                product_id: reservation.product_id,
            }),
            _ => Err(CoreError::InvalidTransition {
                reservation_id: reservation_id.to_string(),
                expected: ReservationStatus::Approved.to_string(),
                actual: current.status,
            }),
        }
    }

    async fn pass_locked(&self, product_id: &str) -> Result<PassStats, CoreError> {
        self.pass_over_queue(product_id, false, None).await
    }

    // Caller must hold the product lock.
    async fn pass_over_queue(
        &self,
        product_id: &str,
        waive_hold: bool,
        stop_after: Option<&str>,
    ) -> Result<PassStats, CoreError> {
        let now = self.clock.now();
        let pending = self.store.pending_for_product(product_id).await?;
        let mut stats = PassStats::default();

        for reservation in &pending {
            let age = (now - reservation.reserved_at).to_std().unwrap_or_default();
            if !waive_hold && age < self.hold_interval {
                stats.held += pending.len() - stats.approved - stats.rejected;
                break;
            }

            match self.store.approve_with_debit(reservation, now).await? {
                DebitOutcome::Applied => {
                    stats.approved += 1;
                    info!(reservation_id = %reservation.id, product_id, "reservation approved");
                }
                DebitOutcome::Insufficient => {
                    self.store
                        .reject_pending(reservation, now, REASON_INSUFFICIENT_STOCK)
                        .await?;
                    stats.rejected += 1;
                    info!(reservation_id = %reservation.id, product_id, "reservation rejected");
                }
            }

            if stop_after.is_some_and(|id| id == reservation.id) {
                break;
            }
        }

        Ok(stats)
    }
}
