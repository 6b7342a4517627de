// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pickup reaper scenarios: overdue auto-cancellation, stock restoration,
//! idempotent skips, explicit horizons.

mod common;

use std::time::Duration;

use common::TestContext;
use hatchery_core::reaper::REASON_NOT_PICKED_UP;

/// Create and approve a reservation for `quantity` units, returning its ID.
async fn approved_reservation(ctx: &TestContext, product: &str, quantity: i32) -> String {
    let outcome = ctx.admission.create("user-1", product, quantity).await.unwrap();
    ctx.advance(ctx.config.hold_interval + Duration::from_secs(1));
    ctx.admission.process_product(product).await.unwrap();
    assert_eq!(ctx.status(&outcome.reservation_id).await, "approved");
    outcome.reservation_id
}

#[tokio::test]
async fn test_overdue_approval_is_reaped_and_credited() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;

    let reservation_id = approved_reservation(&ctx, &product, 2).await;
    assert_eq!(ctx.stock(&product).await, 3);

    // One second short of the timeout: nothing to reap. The cutoff is on
    // reservation age, which already includes the hold interval.
    ctx.advance(ctx.config.pickup_timeout - ctx.config.hold_interval - Duration::from_secs(2));
    let outcome = ctx.reaper.sweep().await.unwrap();
    assert_eq!(outcome.reaped, 0);

    ctx.advance(Duration::from_secs(3));
    let outcome = ctx.reaper.sweep().await.unwrap();
    assert_eq!(outcome.reaped, 1);

    let record = ctx.store.get(&reservation_id).await.unwrap().unwrap();
    assert_eq!(record.status, "rejected");
    assert_eq!(record.rejected_reason.as_deref(), Some(REASON_NOT_PICKED_UP));
    assert_eq!(ctx.stock(&product).await, 5);
}

#[tokio::test]
async fn test_completed_reservation_is_skipped() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;

    let reservation_id = approved_reservation(&ctx, &product, 2).await;
    ctx.sales.confirm_pickup(&reservation_id).await.unwrap();

    ctx.advance(ctx.config.pickup_timeout + Duration::from_secs(1));
    let outcome = ctx.reaper.sweep().await.unwrap();
    assert_eq!(outcome.reaped, 0);

    // The completed reservation kept its debit; stock stays at 3.
    assert_eq!(ctx.status(&reservation_id).await, "completed");
    assert_eq!(ctx.stock(&product).await, 3);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;

    approved_reservation(&ctx, &product, 2).await;
    ctx.advance(ctx.config.pickup_timeout + Duration::from_secs(1));

    assert_eq!(ctx.reaper.sweep().await.unwrap().reaped, 1);
    assert_eq!(ctx.reaper.sweep().await.unwrap().reaped, 0);
    assert_eq!(ctx.stock(&product).await, 5);
}

#[tokio::test]
async fn test_explicit_horizon_overrides_configured_timeout() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;

    approved_reservation(&ctx, &product, 1).await;
    ctx.advance(Duration::from_secs(10 * 60));

    // Ten minutes old: far from the configured 24 h timeout, but a tight
    // explicit horizon reaps it.
    assert_eq!(ctx.reaper.sweep().await.unwrap().reaped, 0);
    let outcome = ctx.reaper.sweep_with_horizon(Duration::from_secs(60)).await.unwrap();
    assert_eq!(outcome.reaped, 1);
    assert_eq!(ctx.stock(&product).await, 5);
}

#[tokio::test]
async fn test_reaper_spans_products() {
    let ctx = TestContext::new().await;
    let (incubatee, eggs) = ctx.seed_catalog(5).await;
    let milk = ctx.seed_product(&incubatee, "Milk", 4, 1.5).await;

    approved_reservation(&ctx, &eggs, 2).await;
    approved_reservation(&ctx, &milk, 3).await;

    ctx.advance(ctx.config.pickup_timeout + Duration::from_secs(1));
    let outcome = ctx.reaper.sweep().await.unwrap();
    assert_eq!(outcome.reaped, 2);
    assert_eq!(ctx.stock(&eggs).await, 5);
    assert_eq!(ctx.stock(&milk).await, 4);
}
