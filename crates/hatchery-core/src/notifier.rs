// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Low-stock notification dispatcher.
//!
//! A periodic scan over low-stock products whose incubatee is approved. The
//! outer interval is divided into two dispatch sub-slots; the first also
//! sends an admin digest classifying products as critical or low. Per-pair
//! cooldowns derive from the durable email log, never from memory, so they
//! hold across restarts.
//!
//! Every dispatch decision appends an email log row: `sent`, `failed`
//! (with the transport reason, retried no earlier than the next tick), or
//! `skipped` (within cooldown). Candidates are processed by product ID
//! ascending so consecutive logs are reproducible.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::email::EmailSink;
use crate::error::CoreError;
use crate::persistence::{EmailKind, EmailStatus, LowStockCandidate, NewEmailLog, Persistence};

/// Skip reason recorded when a pair is still inside its cooldown.
pub const REASON_WITHIN_COOLDOWN: &str = "within cooldown";

/// Which sub-slot of the outer interval fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubSlot {
    /// First offset: per-incubatee alerts plus the admin digest.
    First,
    /// Second offset: per-incubatee alerts only.
    Second,
}

/// Counters from one dispatcher tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The sub-slot that fired, if any.
    pub slot: Option<SubSlot>,
    /// Alerts handed to the sink and accepted.
    pub sent: usize,
    /// Pairs skipped inside their cooldown.
    pub skipped: usize,
    /// Sends the transport refused.
    pub failed: usize,
    /// Whether the admin digest went out.
    pub digest_sent: bool,
}

/// Periodic low-stock scanner and email dispatcher.
pub struct NotificationDispatcher {
    persistence: Arc<dyn Persistence>,
    sink: Arc<dyn EmailSink>,
    clock: Arc<dyn Clock>,
    threshold: i32,
    critical_threshold: i32,
    cooldown: Duration,
    outer_interval_minutes: u32,
    sub_slot_offsets: (u32, u32),
    demo_mode: bool,
    demo_per_batch_cap: usize,
    enabled: bool,
    admin_email: String,
}

impl NotificationDispatcher {
    /// Create a dispatcher from the engine configuration.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        sink: Arc<dyn EmailSink>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            persistence,
            sink,
            clock,
            threshold: config.low_stock_threshold,
            critical_threshold: config.critical_stock_threshold,
            cooldown: Duration::from_std(config.cooldown).unwrap_or_else(|_| Duration::hours(24)),
            outer_interval_minutes: config.outer_interval_minutes.max(1),
            sub_slot_offsets: config.sub_slot_offsets,
            demo_mode: config.demo_mode,
            demo_per_batch_cap: config.demo_per_batch_cap,
            enabled: config.auto_notifications,
            admin_email: config.admin_email.clone(),
        }
    }

    /// Whether automatic notifications are enabled at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Run one tick. Outside both sub-slots this is a no-op.
    pub async fn tick(&self) -> Result<TickReport, CoreError> {
        if !self.enabled {
            return Ok(TickReport::default());
        }

        let now = self.clock.now();
        let minute_in_cycle = (now.timestamp().div_euclid(60))
            .rem_euclid(i64::from(self.outer_interval_minutes)) as u32;

        let slot = if minute_in_cycle == self.sub_slot_offsets.0 {
            SubSlot::First
        } else if minute_in_cycle == self.sub_slot_offsets.1 {
            SubSlot::Second
        } else {
            debug!(minute_in_cycle, "outside dispatch sub-slots");
            return Ok(TickReport::default());
        };

        self.dispatch(slot, now).await
    }

    async fn dispatch(&self, slot: SubSlot, now: DateTime<Utc>) -> Result<TickReport, CoreError> {
        let candidates = self.persistence.low_stock_candidates(self.threshold).await?;
        let mut report = TickReport { slot: Some(slot), ..TickReport::default() };

        for candidate in &candidates {
            match self.last_sent(candidate).await? {
                Some(last) if now - last < self.cooldown => {
                    self.log_skipped(candidate, now, last).await?;
                    report.skipped += 1;
                    continue;
                }
                _ => {}
            }

            if self.demo_mode && report.sent + report.failed >= self.demo_per_batch_cap {
                // Deferred pairs are picked up by a later sub-slot; they are
                // not logged, so their cooldown is untouched.
                break;
            }

            match self.send_alert(candidate, now).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!(
                        product_id = %candidate.product_id,
                        recipient = %candidate.contact_email,
                        error = %e,
                        "low-stock alert failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if slot == SubSlot::First && !candidates.is_empty() {
            report.digest_sent = self.send_digest(&candidates, now).await?;
        }

        info!(
            ?slot,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            digest = report.digest_sent,
            "notification dispatch finished"
        );
        Ok(report)
    }

    async fn last_sent(
        &self,
        candidate: &LowStockCandidate,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.persistence
            .last_low_stock_sent(&candidate.incubatee_id, &candidate.product_id)
            .await
    }

    async fn log_skipped(
        &self,
        candidate: &LowStockCandidate,
        now: DateTime<Utc>,
        last: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.persistence
            .insert_email_log(&NewEmailLog {
                kind: EmailKind::LowStock,
                recipient: candidate.contact_email.clone(),
                subject: alert_subject(candidate),
                product_id: Some(candidate.product_id.clone()),
                incubatee_id: Some(candidate.incubatee_id.clone()),
                stock_at_send: Some(candidate.stock_amount),
                status: EmailStatus::Skipped,
                reason: Some(REASON_WITHIN_COOLDOWN.to_string()),
                sent_at: now,
                next_scheduled: Some(last + self.cooldown),
                interval_minutes: Some(self.outer_interval_minutes as i32),
            })
            .await?;
        Ok(())
    }

    async fn send_alert(
        &self,
        candidate: &LowStockCandidate,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let subject = alert_subject(candidate);
        let (html, text) = alert_body(candidate, self.threshold);

        let result = self
            .sink
            .send(&candidate.contact_email, &subject, &html, &text)
            .await;

        let (status, reason, next_scheduled) = match &result {
            Ok(()) => (EmailStatus::Sent, None, Some(now + self.cooldown)),
            Err(e) => (EmailStatus::Failed, Some(e.to_string()), None),
        };

        self.persistence
            .insert_email_log(&NewEmailLog {
                kind: EmailKind::LowStock,
                recipient: candidate.contact_email.clone(),
                subject,
                product_id: Some(candidate.product_id.clone()),
                incubatee_id: Some(candidate.incubatee_id.clone()),
                stock_at_send: Some(candidate.stock_amount),
                status,
                reason,
                sent_at: now,
                next_scheduled,
                interval_minutes: Some(self.outer_interval_minutes as i32),
            })
            .await?;

        result
    }

    async fn send_digest(
        &self,
        candidates: &[LowStockCandidate],
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let subject = format!("Low stock digest: {} product(s)", candidates.len());
        let (html, text) = digest_body(candidates, self.critical_threshold);

        let result = self.sink.send(&self.admin_email, &subject, &html, &text).await;
        let (status, reason) = match &result {
            Ok(()) => (EmailStatus::Sent, None),
            Err(e) => {
                warn!(error = %e, "admin digest failed");
                (EmailStatus::Failed, Some(e.to_string()))
            }
        };

        self.persistence
            .insert_email_log(&NewEmailLog {
                kind: EmailKind::AdminSummary,
                recipient: self.admin_email.clone(),
                subject,
                product_id: None,
                incubatee_id: None,
                stock_at_send: None,
                status,
                reason,
                sent_at: now,
                next_scheduled: None,
                interval_minutes: Some(self.outer_interval_minutes as i32),
            })
            .await?;

        Ok(result.is_ok())
    }
}

fn alert_subject(candidate: &LowStockCandidate) -> String {
    format!("Low stock: {}", candidate.product_name)
}

fn alert_body(candidate: &LowStockCandidate, threshold: i32) -> (String, String) {
    let html = format!(
        "<html><body>\
         <p>Hello {name},</p>\
         <p>Your product <strong>{product}</strong> is running low: \
         <strong>{stock}</strong> unit(s) left (threshold {threshold}).</p>\
         <p>Please restock to keep it available for reservation.</p>\
         </body></html>",
        name = candidate.incubatee_name,
        product = candidate.product_name,
        stock = candidate.stock_amount,
        threshold = threshold,
    );
    let text = format!(
        "Hello {},\n\nYour product \"{}\" is running low: {} unit(s) left (threshold {}).\n\
         Please restock to keep it available for reservation.\n",
        candidate.incubatee_name, candidate.product_name, candidate.stock_amount, threshold,
    );
    (html, text)
}

fn digest_body(candidates: &[LowStockCandidate], critical_threshold: i32) -> (String, String) {
    let mut html_rows = String::new();
    let mut text_rows = String::new();
    for c in candidates {
        let class = if c.stock_amount <= critical_threshold { "CRITICAL" } else { "LOW" };
        html_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            class, c.product_name, c.incubatee_name, c.stock_amount,
        ));
        text_rows.push_str(&format!(
            "[{}] {} ({}) - {} unit(s)\n",
            class, c.product_name, c.incubatee_name, c.stock_amount,
        ));
    }

    let html = format!(
        "<html><body><p>Low stock overview:</p>\
         <table border=\"1\">\
         <tr><th>Level</th><th>Product</th><th>Incubatee</th><th>Stock</th></tr>\
         {html_rows}</table></body></html>",
    );
    let text = format!("Low stock overview:\n\n{text_rows}");
    (html, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(stock: i32) -> LowStockCandidate {
        LowStockCandidate {
            product_id: "p-1".to_string(),
            product_name: "Eggs".to_string(),
            stock_amount: stock,
            incubatee_id: "i-1".to_string(),
            incubatee_name: "Sunrise Farm".to_string(),
            contact_email: "farm@example.com".to_string(),
        }
    }

    #[test]
    fn test_digest_classifies_critical_and_low() {
        let (_, text) = digest_body(&[candidate(2), candidate(8)], 3);
        assert!(text.contains("[CRITICAL] Eggs (Sunrise Farm) - 2 unit(s)"));
        assert!(text.contains("[LOW] Eggs (Sunrise Farm) - 8 unit(s)"));
    }

    #[test]
    fn test_alert_body_names_product_and_stock() {
        let (html, text) = alert_body(&candidate(4), 10);
        assert!(html.contains("<strong>Eggs</strong>"));
        assert!(text.contains("4 unit(s) left (threshold 10)"));
    }
}
