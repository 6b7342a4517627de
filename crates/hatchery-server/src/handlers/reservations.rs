// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reservation lifecycle handlers: creation, status transitions, admission
//! and reaper triggers, read projections, deletion.

use std::time::Duration;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use hatchery_core::admission::BulkItem;
use hatchery_core::persistence::{ReservationRecord, ReservationStatus};

use crate::error::ApiError;
use crate::state::AppState;

/// JSON projection of a reservation row.
#[derive(Debug, Serialize)]
pub struct ReservationView {
    id: String,
    user_id: String,
    product_id: String,
    quantity: i32,
    status: String,
    reserved_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected_reason: Option<String>,
}

impl From<ReservationRecord> for ReservationView {
    fn from(r: ReservationRecord) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            product_id: r.product_id,
            quantity: r.quantity,
            status: r.status,
            reserved_at: r.reserved_at,
            approved_at: r.approved_at,
            completed_at: r.completed_at,
            rejected_at: r.rejected_at,
            rejected_reason: r.rejected_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    user_id: String,
    product_id: String,
    quantity: i32,
}

/// `POST /reservations`
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let outcome = state
        .engine
        .admission()
        .create(&req.user_id, &req.product_id, req.quantity)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "reservation_id": outcome.reservation_id,
            "status": outcome.status,
            "reason": outcome.reason,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    user_id: String,
    items: Vec<BulkRequestItem>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequestItem {
    product_id: String,
    quantity: i32,
}

/// `POST /reservations/bulk`
pub async fn create_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::bad_request("items must not be empty"));
    }

    let items: Vec<BulkItem> = req
        .items
        .into_iter()
        .map(|i| BulkItem { product_id: i.product_id, quantity: i.quantity })
        .collect();

    let results = state.engine.admission().create_bulk(&req.user_id, &items).await?;
    let results: Vec<serde_json::Value> = results
        .into_iter()
        .map(|r| {
            json!({
                "product_id": r.product_id,
                "reservation_id": r.reservation_id,
                "status": r.status,
                "reason": r.reason,
            })
        })
        .collect();

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "results": results }))))
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    status: String,
}

/// `PUT /reservations/{id}/status`
///
/// `completed` confirms a pickup and returns the sales record ID; `approved`
/// routes through the admission queue so an operator approval cannot skip an
/// earlier reservation or debit stock twice.
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match req.status.as_str() {
        "completed" => {
            let sale = state.engine.sales().confirm_pickup(&id).await?;
            Ok(Json(json!({
                "success": true,
                "sales_id": sale.id,
                "total_price": sale.total_price,
            })))
        }
        "approved" => {
            state.engine.admission().approve_manual(&id).await?;
            Ok(Json(json!({ "success": true, "status": ReservationStatus::Approved })))
        }
        other => Err(ApiError::bad_request(format!(
            "unsupported status change '{other}', expected 'completed' or 'approved'"
        ))),
    }
}

/// `POST /reservations/process-pending`
pub async fn process_pending(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.engine.admission().process_all_pending().await?;
    Ok(Json(json!({
        "success": true,
        "approved": stats.approved,
        "rejected": stats.rejected,
        "held": stats.held,
    })))
}

#[derive(Debug, Deserialize)]
pub struct CheckOverdueRequest {
    timeout_ms: u64,
}

/// `POST /reservations/check-overdue`
///
/// The millisecond horizon is a compatibility surface for demo tooling;
/// production relies on the background reaper and its configured timeout.
pub async fn check_overdue(
    State(state): State<AppState>,
    Json(req): Json<CheckOverdueRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state
        .engine
        .reaper()
        .sweep_with_horizon(Duration::from_millis(req.timeout_ms))
        .await?;

    Ok(Json(json!({
        "success": true,
        "reaped": outcome.reaped,
        "skipped": outcome.skipped,
        "cutoff": outcome.cutoff,
    })))
}

/// `GET /reservations/user/{id}`
pub async fn for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reservations: Vec<ReservationView> = state
        .engine
        .store()
        .for_user(&user_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(json!({ "success": true, "reservations": reservations })))
}

/// `GET /reservations/product/{id}/queue`
pub async fn product_queue(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let queue: Vec<ReservationView> = state
        .engine
        .store()
        .pending_for_product(&product_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(json!({ "success": true, "queue": queue })))
}

/// `GET /reservations/status/{status}`
pub async fn by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status: ReservationStatus = status
        .parse()
        .map_err(|_| ApiError::bad_request(format!("unknown status '{status}'")))?;

    let reservations: Vec<ReservationView> = state
        .engine
        .store()
        .by_status(status)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(json!({ "success": true, "reservations": reservations })))
}

/// `GET /reservations/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reservation = state.engine.store().get_required(&id).await?;
    let view: ReservationView = reservation.into();
    Ok(Json(json!({ "success": true, "reservation": view })))
}

/// `DELETE /reservations/{id}`
///
/// Approved reservations hold a stock debit and are refused; resolve them
/// through completion or rejection first.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.store().delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}
