// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Notification dispatcher scenarios: sub-slots, durable cooldowns, demo
//! caps, deterministic ordering, failure logging, and log retention.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::TestContext;
use hatchery_core::config::Config;
use hatchery_core::log_cleanup::EmailLogCleanupWorker;
use hatchery_core::notifier::{NotificationDispatcher, REASON_WITHIN_COOLDOWN, SubSlot};

fn dispatcher(ctx: &TestContext, config: &Config) -> NotificationDispatcher {
    NotificationDispatcher::new(ctx.persistence.clone(), ctx.sink.clone(), ctx.clock.clone(), config)
}

/// Advance the clock to the next occurrence of a sub-slot offset. The test
/// context starts minute-aligned at cycle minute zero.
fn advance_to_offset(ctx: &TestContext, minutes: u64) {
    ctx.advance(Duration::from_secs(minutes * 60));
}

#[tokio::test]
async fn test_cooldown_lifecycle() {
    let ctx = TestContext::new().await;
    let (incubatee, product) = ctx.seed_catalog(4).await;
    let dispatcher = dispatcher(&ctx, &ctx.config);

    // First sub-slot: one alert and the admin digest.
    advance_to_offset(&ctx, 1);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.slot, Some(SubSlot::First));
    assert_eq!(report.sent, 1);
    assert!(report.digest_sent);

    let sent = ctx.sink.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "farm@example.com");
    assert_eq!(sent[0].subject, "Low stock: Eggs");
    assert_eq!(sent[1].to, ctx.config.admin_email);

    // Five minutes later the pair is inside its cooldown: a skipped row.
    advance_to_offset(&ctx, 5);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.skipped, 1);

    let logs = ctx.persistence.email_logs_for_pair(&incubatee, &product).await.unwrap();
    assert_eq!(logs[0].status, "skipped");
    assert_eq!(logs[0].reason.as_deref(), Some(REASON_WITHIN_COOLDOWN));
    let cooldown = chrono::Duration::from_std(ctx.config.cooldown).unwrap();
    assert_eq!(logs[0].next_scheduled, Some(logs[1].sent_at + cooldown));

    // Past the cooldown: a fresh send.
    ctx.advance(Duration::from_secs(24 * 3600));
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.sent, 1);

    let logs = ctx.persistence.email_logs_for_pair(&incubatee, &product).await.unwrap();
    let sent_logs: Vec<_> = logs.iter().filter(|l| l.status == "sent").collect();
    assert_eq!(sent_logs.len(), 2);
    // Consecutive sent entries respect the cooldown.
    assert!(sent_logs[0].sent_at - sent_logs[1].sent_at >= cooldown);
}

#[tokio::test]
async fn test_second_sub_slot_sends_without_digest() {
    let ctx = TestContext::new().await;
    ctx.seed_catalog(4).await;
    let dispatcher = dispatcher(&ctx, &ctx.config);

    advance_to_offset(&ctx, 4);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.slot, Some(SubSlot::Second));
    assert_eq!(report.sent, 1);
    assert!(!report.digest_sent);

    let sent = ctx.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "farm@example.com");
}

#[tokio::test]
async fn test_off_slot_tick_is_a_no_op() {
    let ctx = TestContext::new().await;
    ctx.seed_catalog(4).await;
    let dispatcher = dispatcher(&ctx, &ctx.config);

    // Cycle minute zero is neither offset.
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.slot, None);
    assert!(ctx.sink.sent().is_empty());

    advance_to_offset(&ctx, 2);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.slot, None);
    assert!(ctx.sink.sent().is_empty());
}

#[tokio::test]
async fn test_disabled_dispatcher_never_sends() {
    let ctx = TestContext::new().await;
    ctx.seed_catalog(4).await;
    let config = Config { auto_notifications: false, ..ctx.config.clone() };
    let dispatcher = dispatcher(&ctx, &config);

    assert!(!dispatcher.enabled());
    advance_to_offset(&ctx, 1);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.slot, None);
    assert!(ctx.sink.sent().is_empty());
}

#[tokio::test]
async fn test_well_stocked_products_are_ignored() {
    let ctx = TestContext::new().await;
    ctx.seed_catalog(50).await;
    let dispatcher = dispatcher(&ctx, &ctx.config);

    advance_to_offset(&ctx, 1);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.sent, 0);
    assert!(!report.digest_sent);
    assert!(ctx.sink.sent().is_empty());
}

#[tokio::test]
async fn test_unapproved_incubatee_gets_no_alerts() {
    let ctx = TestContext::new().await;
    let incubatee = ctx
        .seed_incubatee_with_approval("Side Project", "side@example.com", false)
        .await;
    ctx.seed_product(&incubatee, "Jam", 1, 3.0).await;
    let dispatcher = dispatcher(&ctx, &ctx.config);

    advance_to_offset(&ctx, 1);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.sent, 0);
    assert!(ctx.sink.sent().is_empty());
}

#[tokio::test]
async fn test_dispatch_order_is_by_product_id() {
    let ctx = TestContext::new().await;
    let a = ctx.seed_incubatee("Farm A", "a@example.com").await;
    let b = ctx.seed_incubatee("Farm B", "b@example.com").await;
    let product_a = ctx.seed_product(&a, "Apples", 2, 1.0).await;
    let product_b = ctx.seed_product(&b, "Beets", 3, 1.0).await;
    let dispatcher = dispatcher(&ctx, &ctx.config);

    advance_to_offset(&ctx, 4);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.sent, 2);

    let mut expected = vec![(product_a, "a@example.com"), (product_b, "b@example.com")];
    expected.sort_by(|x, y| x.0.cmp(&y.0));
    let sent = ctx.sink.sent();
    assert_eq!(sent[0].to, expected[0].1);
    assert_eq!(sent[1].to, expected[1].1);
}

#[tokio::test]
async fn test_demo_cap_defers_without_logging() {
    let ctx = TestContext::new().await;
    let mut pairs = Vec::new();
    for i in 0..3 {
        let incubatee = ctx
            .seed_incubatee(&format!("Farm {i}"), &format!("farm{i}@example.com"))
            .await;
        let product = ctx.seed_product(&incubatee, &format!("Crop {i}"), 2, 1.0).await;
        pairs.push((incubatee, product));
    }
    let config = Config { demo_mode: true, demo_per_batch_cap: 2, ..ctx.config.clone() };
    let dispatcher = dispatcher(&ctx, &config);

    advance_to_offset(&ctx, 4);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.sent, 2);
    assert_eq!(ctx.sink.sent().len(), 2);

    // Exactly one pair has no log at all: deferral leaves its cooldown
    // untouched so a later sub-slot picks it up.
    let mut unlogged = 0;
    for (incubatee, product) in &pairs {
        if ctx.persistence.email_logs_for_pair(incubatee, product).await.unwrap().is_empty() {
            unlogged += 1;
        }
    }
    assert_eq!(unlogged, 1);

    // The deferred pair goes out on the next slot.
    ctx.advance(Duration::from_secs(2 * 60));
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.skipped, 2);
}

#[tokio::test]
async fn test_failed_send_is_logged_and_retried_next_slot() {
    let ctx = TestContext::new().await;
    let (incubatee, product) = ctx.seed_catalog(4).await;
    let dispatcher = dispatcher(&ctx, &ctx.config);

    ctx.sink.fail_next_to("farm@example.com");
    advance_to_offset(&ctx, 1);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.sent, 0);

    let logs = ctx.persistence.email_logs_for_pair(&incubatee, &product).await.unwrap();
    let failed: Vec<_> = logs.iter().filter(|l| l.status == "failed").collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].reason.is_some());

    // A failed send starts no cooldown; the next sub-slot retries.
    advance_to_offset(&ctx, 3);
    let report = dispatcher.tick().await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn test_log_cleanup_respects_retention() {
    let ctx = TestContext::new().await;
    let (incubatee, product) = ctx.seed_catalog(4).await;
    let dispatcher = dispatcher(&ctx, &ctx.config);

    advance_to_offset(&ctx, 1);
    dispatcher.tick().await.unwrap();
    let logs = ctx.persistence.email_logs_for_pair(&incubatee, &product).await.unwrap();
    assert_eq!(logs.len(), 1);

    let cleanup = EmailLogCleanupWorker::new(
        ctx.persistence.clone(),
        ctx.clock.clone(),
        ctx.config.retention_days,
    );

    // Inside the retention window: nothing purged.
    ctx.advance(Duration::from_secs(24 * 3600));
    assert_eq!(cleanup.purge().await.unwrap(), 0);

    // Past it: the old rows go, including the admin digest entry.
    ctx.advance(Duration::from_secs(7 * 24 * 3600));
    assert_eq!(cleanup.purge().await.unwrap(), 2);
    let logs = ctx.persistence.email_logs_for_pair(&incubatee, &product).await.unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn test_runtime_wires_a_disabled_notifier() {
    use hatchery_core::email::RecordingEmailSink;
    use hatchery_core::persistence::SqlitePersistence;
    use hatchery_core::runtime::EngineRuntime;

    let persistence = Arc::new(SqlitePersistence::in_memory().await.unwrap());
    let config = Config { auto_notifications: false, ..Config::default() };
    let runtime = EngineRuntime::builder()
        .persistence(persistence)
        .email_sink(Arc::new(RecordingEmailSink::new()))
        .config(config)
        .build()
        .unwrap()
        .start()
        .await;

    assert!(!runtime.notifier().enabled());
    runtime.shutdown().await;
}
