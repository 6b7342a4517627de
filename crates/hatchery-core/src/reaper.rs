// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pickup reaper.
//!
//! Approved reservations hold a stock debit while the shelf waits for the
//! buyer. When a pickup never happens, the reaper rejects the reservation
//! and credits the stock back in one transaction, taking the product lock so
//! it serializes with admission. A reservation completed concurrently is
//! observed in its terminal state and skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::ledger::ProductLocks;
use crate::store::ReservationStore;

/// Rejection reason written by the reaper.
pub const REASON_NOT_PICKED_UP: &str = "Not picked up on time";

/// Result of one reaper sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Reservations rejected and credited back.
    pub reaped: usize,
    /// Reservations that reached a terminal state concurrently.
    pub skipped: usize,
    /// The age cutoff the sweep used.
    pub cutoff: DateTime<Utc>,
}

/// Auto-cancels approved reservations whose pickup window has passed.
#[derive(Clone)]
pub struct PickupReaper {
    store: ReservationStore,
    locks: ProductLocks,
    clock: Arc<dyn Clock>,
    pickup_timeout: Duration,
}

impl PickupReaper {
    /// Create a reaper with the configured pickup timeout.
    pub fn new(
        store: ReservationStore,
        locks: ProductLocks,
        clock: Arc<dyn Clock>,
        pickup_timeout: Duration,
    ) -> Self {
        Self { store, locks, clock, pickup_timeout }
    }

    /// Sweep with the configured pickup timeout.
    pub async fn sweep(&self) -> Result<SweepOutcome, CoreError> {
        self.sweep_with_horizon(self.pickup_timeout).await
    }

    /// Sweep with an explicit horizon: every approved reservation reserved
    /// more than `horizon` ago is reaped.
    pub async fn sweep_with_horizon(&self, horizon: Duration) -> Result<SweepOutcome, CoreError> {
        let now = self.clock.now();
        let cutoff = subtract(now, horizon);
        let overdue = self.store.approved_older_than(cutoff).await?;

        let mut outcome = SweepOutcome { reaped: 0, skipped: 0, cutoff };
        for reservation in overdue {
            let _guard = self.locks.acquire(&reservation.product_id).await;
            match self.store.reap_with_credit(&reservation, now, REASON_NOT_PICKED_UP).await {
                Ok(true) => {
                    outcome.reaped += 1;
                    info!(
                        reservation_id = %reservation.id,
                        product_id = %reservation.product_id,
                        quantity = reservation.quantity,
                        "overdue reservation reaped"
                    );
                }
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    // Leave the reservation for the next tick.
                    warn!(reservation_id = %reservation.id, error = %e, "reap failed");
                }
            }
        }

        Ok(outcome)
    }
}

fn subtract(now: DateTime<Utc>, horizon: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(horizon)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtract_saturates_on_huge_horizons() {
        let now = Utc::now();
        assert_eq!(subtract(now, Duration::MAX), DateTime::<Utc>::MIN_UTC);
        assert_eq!(subtract(now, Duration::from_secs(60)), now - chrono::Duration::seconds(60));
    }
}
