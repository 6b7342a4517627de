// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background job scheduler.
//!
//! Each registered job runs on its own task in a sleep-tick loop. Ticks of
//! one job never overlap: the loop awaits the tick before sleeping again, so
//! a slow tick simply delays the next one. Errors are logged and the loop
//! continues.
//!
//! Shutdown is cooperative. [`Scheduler::shutdown`] signals every job, waits
//! up to the grace period for the loops to finish their in-flight tick, then
//! aborts whatever is left.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A unit of periodic background work.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// Run one tick.
    async fn tick(&self) -> anyhow::Result<()>;

    /// Disabled jobs are registered but never spawned.
    fn enabled(&self) -> bool {
        true
    }
}

struct RunningJob {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

/// Named registry of periodic jobs.
pub struct Scheduler {
    jobs: Mutex<HashMap<String, RunningJob>>,
    grace_period: Duration,
}

impl Scheduler {
    /// Create a scheduler with the given shutdown grace period.
    pub fn new(grace_period: Duration) -> Self {
        Self { jobs: Mutex::new(HashMap::new()), grace_period }
    }

    /// Register a job under a name and start its loop.
    ///
    /// Registering the same name again stops the old loop first, so the call
    /// is idempotent. A disabled job is recorded as a no-op.
    pub async fn register(&self, name: &str, interval: Duration, job: Arc<dyn Job>) {
        if !job.enabled() {
            info!(job = name, "job disabled, not scheduling");
            return;
        }

        let shutdown = Arc::new(Notify::new());
        let loop_shutdown = shutdown.clone();
        let job_name = name.to_string();

        let handle = tokio::spawn(async move {
            info!(job = %job_name, interval_secs = interval.as_secs(), "job started");
            loop {
                tokio::select! {
                    biased;
                    _ = loop_shutdown.notified() => {
                        info!(job = %job_name, "job shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = job.tick().await {
                            error!(job = %job_name, error = %e, "job tick failed");
                        }
                    }
                }
            }
        });

        let mut jobs = self.jobs.lock().await;
        if let Some(previous) = jobs.insert(name.to_string(), RunningJob { shutdown, handle }) {
            warn!(job = name, "replacing already registered job");
            previous.shutdown.notify_one();
            previous.handle.abort();
        }
    }

    /// Names of currently registered jobs.
    pub async fn job_names(&self) -> Vec<String> {
        let jobs = self.jobs.lock().await;
        let mut names: Vec<String> = jobs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Signal every job and wait up to the grace period for loops to exit.
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        for running in jobs.values() {
            running.shutdown.notify_one();
        }

        for (name, running) in jobs.drain() {
            let mut handle = running.handle;
            if tokio::time::timeout(self.grace_period, &mut handle).await.is_err() {
                warn!(job = %name, "job did not stop within grace period, aborting");
                handle.abort();
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
