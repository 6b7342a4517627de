// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable engine runtime.
//!
//! Wires the reservation components together and runs the background jobs
//! (admission sweep, pickup reaper, notification dispatcher, email log
//! cleanup) on the scheduler. Embed it in an existing tokio application:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hatchery_core::config::Config;
//! use hatchery_core::email::RecordingEmailSink;
//! use hatchery_core::persistence::SqlitePersistence;
//! use hatchery_core::runtime::EngineRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let persistence = Arc::new(SqlitePersistence::from_path(".data/hatchery.db").await?);
//!     let runtime = EngineRuntime::builder()
//!         .persistence(persistence)
//!         .email_sink(Arc::new(RecordingEmailSink::new()))
//!         .config(Config::default())
//!         .build()?
//!         .start()
//!         .await;
//!
//!     // ... serve requests using runtime.admission(), runtime.sales(), ...
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::admission::AdmissionController;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::email::EmailSink;
use crate::ledger::{ProductLocks, StockLedger};
use crate::log_cleanup::EmailLogCleanupWorker;
use crate::notifier::NotificationDispatcher;
use crate::persistence::Persistence;
use crate::reaper::PickupReaper;
use crate::sales::SalesRecorder;
use crate::scheduler::{Job, Scheduler};
use crate::store::ReservationStore;

/// Builder for an [`EngineRuntime`].
pub struct EngineRuntimeBuilder {
    persistence: Option<Arc<dyn Persistence>>,
    email_sink: Option<Arc<dyn EmailSink>>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl std::fmt::Debug for EngineRuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRuntimeBuilder")
            .field("persistence", &self.persistence.as_ref().map(|_| "..."))
            .field("email_sink", &self.email_sink.as_ref().map(|_| "..."))
            .field("config", &self.config)
            .finish()
    }
}

impl Default for EngineRuntimeBuilder {
    fn default() -> Self {
        Self {
            persistence: None,
            email_sink: None,
            clock: Arc::new(SystemClock),
            config: Config::default(),
        }
    }
}

impl EngineRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the persistence layer (required).
    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the outbound email sink (required).
    pub fn email_sink(mut self, sink: Arc<dyn EmailSink>) -> Self {
        self.email_sink = Some(sink);
        self
    }

    /// Replace the clock. Tests inject a manual clock here.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the engine configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<EngineRuntimeConfig> {
        let persistence = self
            .persistence
            .ok_or_else(|| anyhow::anyhow!("persistence is required"))?;
        let email_sink = self
            .email_sink
            .ok_or_else(|| anyhow::anyhow!("email sink is required"))?;

        Ok(EngineRuntimeConfig { persistence, email_sink, clock: self.clock, config: self.config })
    }
}

/// Built but not yet started runtime.
pub struct EngineRuntimeConfig {
    persistence: Arc<dyn Persistence>,
    email_sink: Arc<dyn EmailSink>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl EngineRuntimeConfig {
    /// Start the background jobs and return the running engine.
    pub async fn start(self) -> EngineRuntime {
        let locks = ProductLocks::new();
        let ledger = StockLedger::new(self.persistence.clone());
        let store = ReservationStore::new(self.persistence.clone());

        let admission = Arc::new(AdmissionController::new(
            store.clone(),
            locks.clone(),
            self.clock.clone(),
            self.config.hold_interval,
        ));
        let reaper = Arc::new(PickupReaper::new(
            store.clone(),
            locks.clone(),
            self.clock.clone(),
            self.config.pickup_timeout,
        ));
        let sales = Arc::new(SalesRecorder::new(
            store.clone(),
            self.persistence.clone(),
            self.clock.clone(),
        ));
        let notifier = Arc::new(NotificationDispatcher::new(
            self.persistence.clone(),
            self.email_sink.clone(),
            self.clock.clone(),
            &self.config,
        ));
        let cleanup = Arc::new(EmailLogCleanupWorker::new(
            self.persistence.clone(),
            self.clock.clone(),
            self.config.retention_days,
        ));

        let scheduler = Scheduler::default();
        scheduler
            .register(
                "admission-sweep",
                self.config.admission_poll_interval,
                Arc::new(AdmissionSweepJob(admission.clone())),
            )
            .await;
        scheduler
            .register(
                "pickup-reaper",
                self.config.reaper_poll_interval,
                Arc::new(ReaperJob(reaper.clone())),
            )
            .await;
        // The dispatcher decides inside the tick whether a sub-slot fires, so
        // it runs on a one-minute cadence.
        scheduler
            .register(
                "low-stock-notifier",
                std::time::Duration::from_secs(60),
                Arc::new(NotifierJob(notifier.clone())),
            )
            .await;
        scheduler
            .register(
                "email-log-cleanup",
                std::time::Duration::from_secs(3600),
                Arc::new(CleanupJob(cleanup.clone())),
            )
            .await;

        info!("engine runtime started");
        EngineRuntime {
            persistence: self.persistence,
            clock: self.clock,
            store,
            ledger,
            admission,
            reaper,
            sales,
            notifier,
            scheduler,
        }
    }
}

/// Running engine: component handles plus the job scheduler.
pub struct EngineRuntime {
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    store: ReservationStore,
    ledger: StockLedger,
    admission: Arc<AdmissionController>,
    reaper: Arc<PickupReaper>,
    sales: Arc<SalesRecorder>,
    notifier: Arc<NotificationDispatcher>,
    scheduler: Scheduler,
}

impl EngineRuntime {
    /// Create a builder.
    pub fn builder() -> EngineRuntimeBuilder {
        EngineRuntimeBuilder::new()
    }

    /// The persistence layer.
    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    /// The engine clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The reservation store.
    pub fn store(&self) -> &ReservationStore {
        &self.store
    }

    /// The stock ledger.
    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    /// The admission controller.
    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    /// The pickup reaper.
    pub fn reaper(&self) -> &Arc<PickupReaper> {
        &self.reaper
    }

    /// The sales recorder.
    pub fn sales(&self) -> &Arc<SalesRecorder> {
        &self.sales
    }

    /// The notification dispatcher.
    pub fn notifier(&self) -> &Arc<NotificationDispatcher> {
        &self.notifier
    }

    /// Stop all background jobs gracefully.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("engine runtime stopped");
    }
}

struct AdmissionSweepJob(Arc<AdmissionController>);

#[async_trait::async_trait]
impl Job for AdmissionSweepJob {
    async fn tick(&self) -> Result<()> {
        self.0.process_all_pending().await?;
        Ok(())
    }
}

struct ReaperJob(Arc<PickupReaper>);

#[async_trait::async_trait]
impl Job for ReaperJob {
    async fn tick(&self) -> Result<()> {
        self.0.sweep().await?;
        Ok(())
    }
}

struct NotifierJob(Arc<NotificationDispatcher>);

#[async_trait::async_trait]
impl Job for NotifierJob {
    async fn tick(&self) -> Result<()> {
        self.0.tick().await?;
        Ok(())
    }

    fn enabled(&self) -> bool {
        self.0.enabled()
    }
}

struct CleanupJob(Arc<EmailLogCleanupWorker>);

#[async_trait::async_trait]
impl Job for CleanupJob {
    async fn tick(&self) -> Result<()> {
        self.0.purge().await?;
        Ok(())
    }
}
