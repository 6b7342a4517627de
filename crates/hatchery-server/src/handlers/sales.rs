// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sales report handlers: daily reports, summaries, ranges, CSV export.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use hatchery_core::persistence::SalesRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// JSON projection of a sales record.
#[derive(Debug, Serialize)]
pub struct SaleView {
    id: i64,
    reservation_id: String,
    user_id: String,
    product_name: String,
    quantity: i32,
    unit_price: f64,
    total_price: f64,
    sale_date: NaiveDate,
}

impl From<SalesRecord> for SaleView {
    fn from(s: SalesRecord) -> Self {
        Self {
            id: s.id,
            reservation_id: s.reservation_id,
            user_id: s.user_id,
            product_name: s.product_name,
            quantity: s.quantity,
            unit_price: s.unit_price,
            total_price: s.total_price,
            sale_date: s.sale_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    date: Option<NaiveDate>,
}

fn report_payload(date: NaiveDate, sales: Vec<SalesRecord>) -> serde_json::Value {
    let total_revenue: f64 = sales.iter().map(|s| s.total_price).sum();
    let total_quantity: i64 = sales.iter().map(|s| i64::from(s.quantity)).sum();
    let sales: Vec<SaleView> = sales.into_iter().map(Into::into).collect();
    json!({
        "success": true,
        "date": date,
        "total_sales": sales.len(),
        "total_quantity": total_quantity,
        "total_revenue": total_revenue,
        "sales": sales,
    })
}

/// `GET /reservations/sales-report?date=YYYY-MM-DD` (defaults to today)
pub async fn report(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = query.date.unwrap_or_else(|| state.engine.clock().now().date_naive());
    let sales = state.engine.sales().report_for_date(date).await?;
    Ok(Json(report_payload(date, sales)))
}

/// `GET /reservations/sales-summary`
pub async fn summary(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = state.engine.sales().summary().await?;
    Ok(Json(json!({ "success": true, "summary": summary })))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    from: NaiveDate,
    to: NaiveDate,
}

/// `GET /reservations/sales-by-date-range?from=...&to=...`
pub async fn by_range(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sales = state.engine.sales().report_for_range(query.from, query.to).await?;
    let total_revenue: f64 = sales.iter().map(|s| s.total_price).sum();
    let sales: Vec<SaleView> = sales.into_iter().map(Into::into).collect();
    Ok(Json(json!({
        "success": true,
        "from": query.from,
        "to": query.to,
        "total_sales": sales.len(),
        "total_revenue": total_revenue,
        "sales": sales,
    })))
}

/// `GET /reservations/sales-report/export?date=YYYY-MM-DD` (CSV)
pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let date = query.date.unwrap_or_else(|| state.engine.clock().now().date_naive());
    let rows = state.engine.sales().export_rows(date).await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "Sales ID",
            "Reservation ID",
            "User ID",
            "Product Name",
            "Quantity",
            "Unit Price",
            "Total Price",
            "Sale Date",
            "Reserved Date",
            "Completed Time",
            "Status",
        ])
        .map_err(|e| ApiError::internal(format!("csv error: {e}")))?;

    for row in rows {
        writer
            .write_record([
                row.id.to_string(),
                row.reservation_id,
                row.user_id,
                row.product_name,
                row.quantity.to_string(),
                format!("{:.2}", row.unit_price),
                format!("{:.2}", row.total_price),
                row.sale_date.to_string(),
                row.reserved_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                row.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
                row.status.unwrap_or_default(),
            ])
            .map_err(|e| ApiError::internal(format!("csv error: {e}")))?;
    }

    let csv_bytes = writer
        .into_inner()
        .map_err(|e| ApiError::internal(format!("csv error: {e}")))?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"sales-report-{date}.csv\""),
        ),
    ];
    Ok((headers, csv_bytes).into_response())
}
