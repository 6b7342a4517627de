// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reservation store.
//!
//! Wraps the persistence layer with the reservation transition operations and
//! broadcasts an invalidation signal on every change so read caches can drop
//! stale entries. The signal is advisory; correctness never depends on it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::CoreError;
use crate::persistence::{
    DebitOutcome, Persistence, ProductRecord, ReservationRecord, ReservationStatus, SalesRecord,
};

/// Invalidation signal emitted when a reservation changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationChange {
    /// The reservation that changed.
    pub reservation_id: String,
    /// The product it reserves.
    pub product_id: String,
    /// The status after the change, `None` when the row was deleted.
    pub status: Option<ReservationStatus>,
}

/// Persistent reservation records and status transitions.
#[derive(Clone)]
pub struct ReservationStore {
    persistence: Arc<dyn Persistence>,
    changes: broadcast::Sender<ReservationChange>,
}

impl ReservationStore {
    /// Create a store backed by the given persistence.
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self { persistence, changes }
    }

    /// Subscribe to invalidation signals. Slow subscribers may observe
    /// [`broadcast::error::RecvError::Lagged`] and should drop their whole
    /// cache when they do.
    pub fn subscribe(&self) -> broadcast::Receiver<ReservationChange> {
        self.changes.subscribe()
    }

    fn notify(&self, reservation_id: &str, product_id: &str, status: Option<ReservationStatus>) {
        // No receivers is fine; the signal is opaque to correctness.
        let _ = self.changes.send(ReservationChange {
            reservation_id: reservation_id.to_string(),
            product_id: product_id.to_string(),
            status,
        });
        debug!(reservation_id, product_id, ?status, "reservation changed");
    }

    /// Insert a new reservation row and announce it.
    pub async fn insert(&self, reservation: &ReservationRecord) -> Result<(), CoreError> {
        self.persistence.insert_reservation(reservation).await?;
        let status = reservation.parsed_status().ok();
        self.notify(&reservation.id, &reservation.product_id, status);
        Ok(())
    }

    /// Look up a product. Admission reads stock through the same handle it
    /// transitions reservations with.
    pub async fn product(&self, product_id: &str) -> Result<Option<ProductRecord>, CoreError> {
        self.persistence.get_product(product_id).await
    }

    /// Get a reservation by ID.
    pub async fn get(&self, reservation_id: &str) -> Result<Option<ReservationRecord>, CoreError> {
        self.persistence.get_reservation(reservation_id).await
    }

    /// Get a reservation by ID, erroring when it does not exist.
    pub async fn get_required(&self, reservation_id: &str) -> Result<ReservationRecord, CoreError> {
        self.get(reservation_id).await?.ok_or_else(|| CoreError::NotFound {
            entity: "reservation",
            id: reservation_id.to_string(),
        })
    }

    /// Pending reservations for a product in first-come-first-served order.
    pub async fn pending_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        self.persistence.pending_for_product(product_id).await
    }

    /// Product IDs with at least one pending reservation.
    pub async fn products_with_pending(&self) -> Result<Vec<String>, CoreError> {
        self.persistence.products_with_pending().await
    }

    /// Approved reservations reserved before `cutoff`, across all products.
    pub async fn approved_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        self.persistence.approved_older_than(cutoff).await
    }

    /// Approve a pending reservation, debiting stock in the same transaction.
    pub async fn approve_with_debit(
        &self,
        reservation: &ReservationRecord,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, CoreError> {
        let outcome = self
            .persistence
            .approve_with_debit(&reservation.id, &reservation.product_id, reservation.quantity, now)
            .await?;
        if outcome == DebitOutcome::Applied {
            self.notify(&reservation.id, &reservation.product_id, Some(ReservationStatus::Approved));
        }
        Ok(outcome)
    }

    /// Reject a pending reservation with a reason.
    pub async fn reject_pending(
        &self,
        reservation: &ReservationRecord,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), CoreError> {
        self.persistence.reject_pending(&reservation.id, now, reason).await?;
        self.notify(&reservation.id, &reservation.product_id, Some(ReservationStatus::Rejected));
        Ok(())
    }

    /// Reject an approved reservation and restore its stock. Returns `false`
    /// when the reservation already left the approved state.
    pub async fn reap_with_credit(
        &self,
        reservation: &ReservationRecord,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, CoreError> {
        let reaped = self
            .persistence
            .reap_with_credit(&reservation.id, &reservation.product_id, reservation.quantity, now, reason)
            .await?;
        if reaped {
            self.notify(&reservation.id, &reservation.product_id, Some(ReservationStatus::Rejected));
        }
        Ok(reaped)
    }

    /// Complete an approved reservation, writing its sales record in the same
    /// transaction. Errors with `InvalidTransition` when it is not approved.
    pub async fn complete(
        &self,
        reservation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SalesRecord, CoreError> {
        let reservation = self.get_required(reservation_id).await?;
        match self.persistence.complete_with_sale(reservation_id, now).await? {
            Some(sale) => {
                self.notify(reservation_id, &reservation.product_id, Some(ReservationStatus::Completed));
                Ok(sale)
            }
            None => {
                let current = self.get_required(reservation_id).await?;
                Err(CoreError::InvalidTransition {
                    reservation_id: reservation_id.to_string(),
                    expected: ReservationStatus::Approved.to_string(),
                    actual: current.status,
                })
            }
        }
    }

    /// Reservations for a user, newest first.
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<ReservationRecord>, CoreError> {
        self.persistence.reservations_for_user(user_id).await
    }

    /// Reservations with a given status, newest first.
    pub async fn by_status(
        &self,
        status: ReservationStatus,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        self.persistence.reservations_by_status(status).await
    }

    /// Delete a reservation. Approved reservations hold a stock debit and
    /// must be completed or rejected first.
    pub async fn delete(&self, reservation_id: &str) -> Result<(), CoreError> {
        let reservation = self.get_required(reservation_id).await?;
        if self.persistence.delete_reservation(reservation_id).await? {
            self.notify(reservation_id, &reservation.product_id, None);
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                reservation_id: reservation_id.to_string(),
                expected: "pending, completed or rejected".to_string(),
                actual: ReservationStatus::Approved.to_string(),
            })
        }
    }
}
