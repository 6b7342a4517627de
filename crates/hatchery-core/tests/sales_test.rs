// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sales recorder scenarios: at-most-once completion, price capture,
//! reports, and the delete guard around approved reservations.

mod common;

use std::time::Duration;

use common::TestContext;
use hatchery_core::clock::Clock;
use hatchery_core::error::CoreError;
use hatchery_core::persistence::ReservationStatus;

async fn approved_reservation(ctx: &TestContext, product: &str, quantity: i32) -> String {
    let outcome = ctx.admission.create("user-1", product, quantity).await.unwrap();
    ctx.advance(ctx.config.hold_interval + Duration::from_secs(1));
    ctx.admission.process_product(product).await.unwrap();
    outcome.reservation_id
}

#[tokio::test]
async fn test_completion_writes_exactly_one_sale() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;
    let reservation_id = approved_reservation(&ctx, &product, 2).await;

    let sale = ctx.sales.confirm_pickup(&reservation_id).await.unwrap();
    assert_eq!(sale.quantity, 2);
    assert_eq!(sale.unit_price, 2.5);
    assert_eq!(sale.total_price, 5.0);
    assert_eq!(sale.product_name, "Eggs");
    assert_eq!(sale.sale_date, ctx.clock.now().date_naive());

    // The second confirmation finds the terminal state.
    let err = ctx.sales.confirm_pickup(&reservation_id).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));

    let sales = ctx.sales.report_for_date(ctx.clock.now().date_naive()).await.unwrap();
    assert_eq!(sales.len(), 1);
    // Completion never touches the ledger; the debit from admission stands.
    assert_eq!(ctx.stock(&product).await, 3);
}

#[tokio::test]
async fn test_simultaneous_completions_settle_once() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;
    let reservation_id = approved_reservation(&ctx, &product, 2).await;

    let (first, second) = tokio::join!(
        ctx.sales.confirm_pickup(&reservation_id),
        ctx.sales.confirm_pickup(&reservation_id),
    );

    // Exactly one confirmation wins; the loser sees the terminal state.
    let (winner, loser) = match (&first, &second) {
        (Ok(_), Err(_)) => (first.unwrap(), second.unwrap_err()),
        (Err(_), Ok(_)) => (second.unwrap(), first.unwrap_err()),
        _ => panic!("expected exactly one completion to succeed: {first:?} / {second:?}"),
    };
    assert_eq!(winner.total_price, 5.0);
    assert!(matches!(loser, CoreError::InvalidTransition { .. }));

    let sales = ctx.sales.report_for_date(ctx.clock.now().date_naive()).await.unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(ctx.stock(&product).await, 3);
}

#[tokio::test]
async fn test_completing_pending_or_rejected_fails() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;

    let pending = ctx.admission.create("user-1", &product, 1).await.unwrap();
    let err = ctx.sales.confirm_pickup(&pending.reservation_id).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));

    let err = ctx.sales.confirm_pickup("missing").await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_price_is_captured_at_completion_time() {
    let ctx = TestContext::new().await;
    let incubatee = ctx.seed_incubatee("Sunrise Farm", "farm@example.com").await;
    let product = ctx.seed_product(&incubatee, "Eggs", 5, 2.5).await;
    let reservation_id = approved_reservation(&ctx, &product, 2).await;

    // The price changes between approval and pickup.
    ctx.persistence.update_product_price(&product, 4.0).await.unwrap();

    let sale = ctx.sales.confirm_pickup(&reservation_id).await.unwrap();
    assert_eq!(sale.unit_price, 4.0);
    assert_eq!(sale.total_price, 8.0);
}

#[tokio::test]
async fn test_summary_and_range_reports() {
    let ctx = TestContext::new().await;
    let (incubatee, eggs) = ctx.seed_catalog(10).await;
    let milk = ctx.seed_product(&incubatee, "Milk", 10, 1.5).await;

    let r1 = approved_reservation(&ctx, &eggs, 2).await;
    let r2 = approved_reservation(&ctx, &milk, 4).await;

    let day_one = ctx.clock.now().date_naive();
    ctx.sales.confirm_pickup(&r1).await.unwrap();

    ctx.advance(Duration::from_secs(24 * 3600));
    let day_two = ctx.clock.now().date_naive();
    ctx.sales.confirm_pickup(&r2).await.unwrap();

    let summary = ctx.sales.summary().await.unwrap();
    assert_eq!(summary.total_sales, 2);
    assert_eq!(summary.total_quantity, 6);
    assert_eq!(summary.total_revenue, 2.0 * 2.5 + 4.0 * 1.5);

    assert_eq!(ctx.sales.report_for_date(day_one).await.unwrap().len(), 1);
    assert_eq!(ctx.sales.report_for_date(day_two).await.unwrap().len(), 1);
    assert_eq!(ctx.sales.report_for_range(day_one, day_two).await.unwrap().len(), 2);

    let err = ctx.sales.report_for_range(day_two, day_one).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { field: "date_range", .. }));
}

#[tokio::test]
async fn test_export_rows_match_sales_for_date() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(10).await;
    let reservation_id = approved_reservation(&ctx, &product, 3).await;
    ctx.sales.confirm_pickup(&reservation_id).await.unwrap();

    let date = ctx.clock.now().date_naive();
    let sales = ctx.sales.report_for_date(date).await.unwrap();
    let rows = ctx.sales.export_rows(date).await.unwrap();

    assert_eq!(rows.len(), sales.len());
    assert_eq!(rows[0].reservation_id, reservation_id);
    assert_eq!(rows[0].status.as_deref(), Some("completed"));
    assert!(rows[0].reserved_at.is_some());
    assert!(rows[0].completed_at.is_some());
}

#[tokio::test]
async fn test_delete_guard_and_terminal_deletes() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;
    let reservation_id = approved_reservation(&ctx, &product, 2).await;

    // Approved holds a debit: delete is refused.
    let err = ctx.store.delete(&reservation_id).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidTransition { .. }));

    ctx.sales.confirm_pickup(&reservation_id).await.unwrap();
    ctx.store.delete(&reservation_id).await.unwrap();
    assert!(ctx.store.get(&reservation_id).await.unwrap().is_none());

    // The sale outlives the deleted reservation.
    let date = ctx.clock.now().date_naive();
    assert_eq!(ctx.sales.report_for_date(date).await.unwrap().len(), 1);
    let rows = ctx.sales.export_rows(date).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].status.is_none());
}

#[tokio::test]
async fn test_user_and_status_projections() {
    let ctx = TestContext::new().await;
    let (_, product) = ctx.seed_catalog(5).await;

    ctx.admission.create("alice", &product, 1).await.unwrap();
    ctx.advance(Duration::from_secs(1));
    ctx.admission.create("alice", &product, 1).await.unwrap();
    ctx.advance(Duration::from_secs(1));
    ctx.admission.create("bob", &product, 1).await.unwrap();

    let alice = ctx.store.for_user("alice").await.unwrap();
    assert_eq!(alice.len(), 2);
    // Newest first.
    assert!(alice[0].reserved_at >= alice[1].reserved_at);

    let pending = ctx.store.by_status(ReservationStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 3);
}
