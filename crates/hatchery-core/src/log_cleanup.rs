// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background worker for purging old email log records.
//!
//! Cooldown decisions only look back `cooldown` from now, so log rows older
//! than the retention period carry no information and are deleted.

use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::persistence::Persistence;

/// Deletes email log entries older than the retention period.
pub struct EmailLogCleanupWorker {
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    retention_days: u32,
}

impl EmailLogCleanupWorker {
    /// Create a cleanup worker with the configured retention.
    pub fn new(persistence: Arc<dyn Persistence>, clock: Arc<dyn Clock>, retention_days: u32) -> Self {
        Self { persistence, clock, retention_days }
    }

    /// Run one purge pass. Returns the number of deleted rows.
    pub async fn purge(&self) -> Result<u64, CoreError> {
        let cutoff = self.clock.now() - chrono::Duration::days(i64::from(self.retention_days));
        let deleted = self.persistence.purge_email_logs_before(cutoff).await?;
        if deleted > 0 {
            info!(deleted, retention_days = self.retention_days, "purged email logs");
        }
        Ok(deleted)
    }
}
