// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP API for the reservation engine.
//!
//! Exposes the reservation lifecycle over JSON: creating reservations,
//! manual status changes, queue inspection, overdue sweeps and sales
//! reporting. All state lives in [`hatchery_core::runtime::EngineRuntime`];
//! handlers are thin translations between HTTP and the engine.

pub mod error;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, reservations, sales};
use crate::state::AppState;

/// Build the API router.
///
/// # Routes
///
/// ## Reservations
/// - `POST /reservations` - Create a reservation
/// - `POST /reservations/bulk` - Create several reservations in one call
/// - `PUT /reservations/{id}/status` - Approve or complete a reservation
/// - `POST /reservations/process-pending` - Run an admission pass now
/// - `POST /reservations/check-overdue` - Run a pickup sweep with a custom horizon
/// - `GET /reservations/user/{user_id}` - Reservations for a user
/// - `GET /reservations/product/{product_id}/queue` - Pending queue for a product
/// - `GET /reservations/status/{status}` - Reservations in a given status
/// - `GET /reservations/{id}` - Single reservation
/// - `DELETE /reservations/{id}` - Delete a non-approved reservation
///
/// ## Sales
/// - `GET /reservations/sales-report` - Daily sales report
/// - `GET /reservations/sales-report/export` - Daily report as CSV
/// - `GET /reservations/sales-summary` - All-time summary
/// - `GET /reservations/sales-by-date-range` - Sales between two dates
///
/// ## Operations
/// - `GET /health` - Liveness and database check
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/reservations", post(reservations::create))
        .route("/reservations/bulk", post(reservations::create_bulk))
        .route("/reservations/{id}/status", put(reservations::change_status))
        .route("/reservations/process-pending", post(reservations::process_pending))
        .route("/reservations/check-overdue", post(reservations::check_overdue))
        .route("/reservations/user/{user_id}", get(reservations::for_user))
        .route("/reservations/product/{product_id}/queue", get(reservations::product_queue))
        .route("/reservations/status/{status}", get(reservations::by_status))
        .route("/reservations/sales-report", get(sales::report))
        .route("/reservations/sales-report/export", get(sales::export))
        .route("/reservations/sales-summary", get(sales::summary))
        .route("/reservations/sales-by-date-range", get(sales::by_range))
        .route("/reservations/{id}", get(reservations::get).delete(reservations::delete))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
