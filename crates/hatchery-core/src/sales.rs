// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sales recorder and report queries.
//!
//! A sale exists exactly when a reservation reached `completed`. The record
//! is written in the same transaction as the status transition and captures
//! the product's name and price at completion time; later catalog edits do
//! not rewrite history.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::persistence::{Persistence, SalesExportRow, SalesRecord, SalesSummary};
use crate::store::ReservationStore;

/// Records sales on pickup confirmation and serves report queries.
#[derive(Clone)]
pub struct SalesRecorder {
    store: ReservationStore,
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
}

impl SalesRecorder {
    /// Create a recorder over the given store.
    pub fn new(
        store: ReservationStore,
        persistence: Arc<dyn Persistence>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, persistence, clock }
    }

    /// Confirm a pickup: transition `approved -> completed` and write the
    /// sales record atomically. Any other current status fails with
    /// `InvalidTransition`.
    pub async fn confirm_pickup(&self, reservation_id: &str) -> Result<SalesRecord, CoreError> {
        self.store.complete(reservation_id, self.clock.now()).await
    }

    /// Sales for one calendar date.
    pub async fn report_for_date(&self, date: NaiveDate) -> Result<Vec<SalesRecord>, CoreError> {
        self.persistence.sales_for_date(date).await
    }

    /// Sales in an inclusive date range.
    pub async fn report_for_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SalesRecord>, CoreError> {
        if from > to {
            return Err(CoreError::Validation {
                field: "date_range",
                message: "start date is after end date".to_string(),
            });
        }
        self.persistence.sales_in_range(from, to).await
    }

    /// Aggregate totals over all sales.
    pub async fn summary(&self) -> Result<SalesSummary, CoreError> {
        self.persistence.sales_summary().await
    }

    /// Export rows for one date, with reservation timestamps joined in.
    pub async fn export_rows(&self, date: NaiveDate) -> Result<Vec<SalesExportRow>, CoreError> {
        self.persistence.sales_export_rows(date).await
    }
}
