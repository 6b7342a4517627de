// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared test fixtures: in-memory persistence, manual clock, seeded catalog.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use hatchery_core::admission::AdmissionController;
use hatchery_core::clock::{Clock, ManualClock};
use hatchery_core::config::Config;
use hatchery_core::email::RecordingEmailSink;
use hatchery_core::ledger::ProductLocks;
use hatchery_core::persistence::{
    IncubateeRecord, Persistence, ProductRecord, SqlitePersistence,
};
use hatchery_core::reaper::PickupReaper;
use hatchery_core::sales::SalesRecorder;
use hatchery_core::store::ReservationStore;

/// A fixed, minute-aligned starting instant so sub-slot arithmetic in
/// notifier tests is predictable.
pub fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).single().expect("valid instant")
}

pub struct TestContext {
    pub persistence: Arc<dyn Persistence>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingEmailSink>,
    pub store: ReservationStore,
    pub locks: ProductLocks,
    pub admission: AdmissionController,
    pub reaper: PickupReaper,
    pub sales: SalesRecorder,
    pub config: Config,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let persistence: Arc<dyn Persistence> = Arc::new(
            SqlitePersistence::in_memory()
                .await
                .expect("Failed to create in-memory persistence"),
        );
        let clock = Arc::new(ManualClock::new(start_instant()));
        let sink = Arc::new(RecordingEmailSink::new());
        let locks = ProductLocks::new();
        let store = ReservationStore::new(persistence.clone());

        let admission = AdmissionController::new(
            store.clone(),
            locks.clone(),
            clock.clone(),
            config.hold_interval,
        );
        let reaper = PickupReaper::new(
            store.clone(),
            locks.clone(),
            clock.clone(),
            config.pickup_timeout,
        );
        let sales = SalesRecorder::new(store.clone(), persistence.clone(), clock.clone());

        Self { persistence, clock, sink, store, locks, admission, reaper, sales, config }
    }

    /// Insert an approved incubatee, returning its ID.
    pub async fn seed_incubatee(&self, name: &str, email: &str) -> String {
        self.seed_incubatee_with_approval(name, email, true).await
    }

    pub async fn seed_incubatee_with_approval(
        &self,
        name: &str,
        email: &str,
        approved: bool,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.persistence
            .insert_incubatee(&IncubateeRecord {
                id: id.clone(),
                name: name.to_string(),
                contact_email: email.to_string(),
                approved,
                created_at: self.clock.now(),
            })
            .await
            .expect("Failed to insert incubatee");
        id
    }

    /// Insert a product for an incubatee, returning its ID.
    pub async fn seed_product(
        &self,
        incubatee_id: &str,
        name: &str,
        stock: i32,
        price: f64,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.persistence
            .insert_product(&ProductRecord {
                id: id.clone(),
                incubatee_id: incubatee_id.to_string(),
                name: name.to_string(),
                stock_amount: stock,
                price,
                pricing_unit: "piece".to_string(),
                expires_on: None,
                created_at: self.clock.now(),
            })
            .await
            .expect("Failed to insert product");
        id
    }

    /// Seed a default incubatee plus one product, returning (incubatee, product).
    pub async fn seed_catalog(&self, stock: i32) -> (String, String) {
        let incubatee = self.seed_incubatee("Sunrise Farm", "farm@example.com").await;
        let product = self.seed_product(&incubatee, "Eggs", stock, 2.5).await;
        (incubatee, product)
    }

    /// Current stock for a product.
    pub async fn stock(&self, product_id: &str) -> i32 {
        self.persistence
            .get_product(product_id)
            .await
            .expect("Failed to load product")
            .expect("Product missing")
            .stock_amount
    }

    /// Current status string for a reservation.
    pub async fn status(&self, reservation_id: &str) -> String {
        self.store
            .get(reservation_id)
            .await
            .expect("Failed to load reservation")
            .expect("Reservation missing")
            .status
    }

    /// Advance the manual clock.
    pub fn advance(&self, duration: Duration) {
        self.clock
            .advance(chrono::Duration::from_std(duration).expect("duration fits"));
    }
}
