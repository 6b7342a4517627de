// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for hatchery-core.
//!
//! This module defines the persistence abstraction and backend
//! implementations. The composite operations (`approve_with_debit`,
//! `reap_with_credit`, `complete_with_sale`) each run in a single database
//! transaction so that stock conservation and at-most-once sales hold across
//! every failure path.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Reservation lifecycle status.
///
/// Transitions are monotone: `pending -> {approved, rejected}`,
/// `approved -> {completed, rejected}`; terminal states never leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Created, waiting out the hold interval.
    Pending,
    /// Admitted; stock debited; awaiting pickup.
    Approved,
    /// Picked up and confirmed; a sales record exists.
    Completed,
    /// Rejected at creation, admission, or by the pickup reaper. Terminal.
    Rejected,
}

impl ReservationStatus {
    /// Database representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(CoreError::Validation {
                field: "status",
                message: format!("unknown reservation status '{}'", other),
            }),
        }
    }
}

/// Email log entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    /// Per-incubatee low-stock alert.
    LowStock,
    /// Admin digest summarizing all low-stock products.
    AdminSummary,
}

impl EmailKind {
    /// Database representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowStock => "low_stock",
            Self::AdminSummary => "admin_summary",
        }
    }
}

/// Outcome of an email dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailStatus {
    /// The transport accepted the message.
    Sent,
    /// The transport failed; retried on the next scheduler tick at earliest.
    Failed,
    /// Suppressed by the cooldown gate.
    Skipped,
}

impl EmailStatus {
    /// Database representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Outcome of a conditional stock debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// Stock covered the quantity and was decremented.
    Applied,
    /// Stock could not cover the quantity; nothing was written.
    Insufficient,
}

// ============================================================================
// Record Types
// ============================================================================

/// Incubatee (product supplier) record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncubateeRecord {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Address that receives low-stock alerts.
    pub contact_email: String,
    /// Only approved incubatees receive notifications.
    pub approved: bool,
    /// When the incubatee was registered.
    pub created_at: DateTime<Utc>,
}

/// Product record. `stock_amount` is mutated only by the stock ledger.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRecord {
    /// Unique identifier.
    pub id: String,
    /// Owning incubatee.
    pub incubatee_id: String,
    /// Display name, denormalized into sales records on completion.
    pub name: String,
    /// Units on hand. Never negative.
    pub stock_amount: i32,
    /// Unit price. Sales capture the price at completion time.
    pub price: f64,
    /// Pricing unit label ("piece", "kg", ...).
    pub pricing_unit: String,
    /// Optional expiration date.
    pub expires_on: Option<NaiveDate>,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
}

/// Reservation record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReservationRecord {
    /// Unique identifier.
    pub id: String,
    /// Reserving user.
    pub user_id: String,
    /// Reserved product.
    pub product_id: String,
    /// Units reserved. Positive.
    pub quantity: i32,
    /// Current status (pending, approved, completed, rejected).
    pub status: String,
    /// When the reservation was created. Admission is FCFS by this timestamp.
    pub reserved_at: DateTime<Utc>,
    /// When admission debited stock.
    pub approved_at: Option<DateTime<Utc>>,
    /// When the pickup was confirmed.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the reservation was rejected.
    pub rejected_at: Option<DateTime<Utc>>,
    /// Free-text rejection reason.
    pub rejected_reason: Option<String>,
}

impl ReservationRecord {
    /// Parsed status. Errors if the stored value is unknown.
    pub fn parsed_status(&self) -> Result<ReservationStatus, CoreError> {
        self.status.parse()
    }
}

/// Immutable sales record, created exactly once per completed reservation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalesRecord {
    /// Database primary key.
    pub id: i64,
    /// The reservation this sale settles.
    pub reservation_id: String,
    /// The buying user.
    pub user_id: String,
    /// Product name at completion time.
    pub product_name: String,
    /// Units sold.
    pub quantity: i32,
    /// Unit price at completion time.
    pub unit_price: f64,
    /// `unit_price * quantity`.
    pub total_price: f64,
    /// Calendar date of the sale.
    pub sale_date: NaiveDate,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// A sales export row with reservation timestamps joined in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalesExportRow {
    /// Sales record primary key.
    pub id: i64,
    /// Settled reservation.
    pub reservation_id: String,
    /// Buying user.
    pub user_id: String,
    /// Product name at completion time.
    pub product_name: String,
    /// Units sold.
    pub quantity: i32,
    /// Unit price at completion time.
    pub unit_price: f64,
    /// Total price.
    pub total_price: f64,
    /// Calendar date of the sale.
    pub sale_date: NaiveDate,
    /// When the reservation was created, if it still exists.
    pub reserved_at: Option<DateTime<Utc>>,
    /// When the pickup was confirmed, if the reservation still exists.
    pub completed_at: Option<DateTime<Utc>>,
    /// Reservation status, if the reservation still exists.
    pub status: Option<String>,
}

/// Aggregate totals over sales records.
#[derive(Debug, Clone, Default, sqlx::FromRow, Serialize)]
pub struct SalesSummary {
    /// Number of sales records.
    pub total_sales: i64,
    /// Units sold across all records.
    pub total_quantity: i64,
    /// Revenue across all records.
    pub total_revenue: f64,
}

/// Durable email dispatch log entry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmailLogRecord {
    /// Database primary key.
    pub id: i64,
    /// Entry kind (low_stock, admin_summary).
    pub kind: String,
    /// Recipient address.
    pub recipient: String,
    /// Message subject.
    pub subject: String,
    /// Product the alert concerns, if any.
    pub product_id: Option<String>,
    /// Incubatee the alert concerns, if any.
    pub incubatee_id: Option<String>,
    /// Stock level captured at send time.
    pub stock_at_send: Option<i32>,
    /// Dispatch outcome (sent, failed, skipped).
    pub status: String,
    /// Failure or skip reason.
    pub reason: Option<String>,
    /// When the dispatch was attempted (or skipped).
    pub sent_at: DateTime<Utc>,
    /// Earliest time the next send for this pair is permitted.
    pub next_scheduled: Option<DateTime<Utc>>,
    /// Outer scan interval at the time of the entry, in minutes.
    pub interval_minutes: Option<i32>,
}

/// New email log entry to append.
#[derive(Debug, Clone)]
pub struct NewEmailLog {
    /// Entry kind.
    pub kind: EmailKind,
    /// Recipient address.
    pub recipient: String,
    /// Message subject.
    pub subject: String,
    /// Product the alert concerns, if any.
    pub product_id: Option<String>,
    /// Incubatee the alert concerns, if any.
    pub incubatee_id: Option<String>,
    /// Stock level captured at send time.
    pub stock_at_send: Option<i32>,
    /// Dispatch outcome.
    pub status: EmailStatus,
    /// Failure or skip reason.
    pub reason: Option<String>,
    /// When the dispatch was attempted (or skipped).
    pub sent_at: DateTime<Utc>,
    /// Earliest time the next send for this pair is permitted.
    pub next_scheduled: Option<DateTime<Utc>>,
    /// Outer scan interval in minutes.
    pub interval_minutes: Option<i32>,
}

/// Low-stock product joined with its approved incubatee's contact info.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LowStockCandidate {
    /// Product identifier.
    pub product_id: String,
    /// Product name.
    pub product_name: String,
    /// Current stock level.
    pub stock_amount: i32,
    /// Owning incubatee.
    pub incubatee_id: String,
    /// Incubatee display name.
    pub incubatee_name: String,
    /// Alert recipient.
    pub contact_email: String,
}

// ============================================================================
// Persistence Trait
// ============================================================================

/// Persistence interface used by the engine components.
#[async_trait]
pub trait Persistence: Send + Sync {
    // ------------------------------------------------------------------
    // Catalog (incubatees and products)
    // ------------------------------------------------------------------

    /// Insert an incubatee.
    async fn insert_incubatee(&self, incubatee: &IncubateeRecord) -> Result<(), CoreError>;

    /// Insert a product.
    async fn insert_product(&self, product: &ProductRecord) -> Result<(), CoreError>;

    /// Get a product by ID.
    async fn get_product(&self, product_id: &str) -> Result<Option<ProductRecord>, CoreError>;

    /// Atomically decrement `stock_amount` by `quantity` iff it covers it.
    ///
    /// No partial debits: either the full quantity is debited or nothing is
    /// written.
    async fn try_debit_stock(
        &self,
        product_id: &str,
        quantity: i32,
    ) -> Result<DebitOutcome, CoreError>;

    /// Unconditionally add `quantity` to `stock_amount`.
    ///
    /// Callable only during reaper restoration or explicit admin flows.
    async fn credit_stock(&self, product_id: &str, quantity: i32) -> Result<(), CoreError>;

    /// Change a product's unit price. Existing sales records keep the price
    /// they captured at completion time.
    async fn update_product_price(&self, product_id: &str, price: f64) -> Result<(), CoreError>;

    /// Products at or below `threshold` whose incubatee is approved,
    /// ordered by product ID ascending for reproducible dispatch logs.
    async fn low_stock_candidates(
        &self,
        threshold: i32,
    ) -> Result<Vec<LowStockCandidate>, CoreError>;

    // ------------------------------------------------------------------
    // Reservations
    // ------------------------------------------------------------------

    /// Insert a reservation row.
    async fn insert_reservation(&self, reservation: &ReservationRecord) -> Result<(), CoreError>;

    /// Get a reservation by ID.
    async fn get_reservation(
        &self,
        reservation_id: &str,
    ) -> Result<Option<ReservationRecord>, CoreError>;

    /// Pending reservations for a product in FCFS order
    /// (`reserved_at` ascending, ID as tie-break).
    async fn pending_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<ReservationRecord>, CoreError>;

    /// IDs of products that currently have pending reservations.
    async fn products_with_pending(&self) -> Result<Vec<String>, CoreError>;

    /// Approved reservations with `reserved_at` strictly before `cutoff`,
    /// across all products.
    async fn approved_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ReservationRecord>, CoreError>;

    /// Debit stock and approve a pending reservation in one transaction.
    ///
    /// Returns [`DebitOutcome::Insufficient`] without writing anything when
    /// stock cannot cover the quantity. Errors with `InvalidTransition` if
    /// the reservation is no longer pending.
    async fn approve_with_debit(
        &self,
        reservation_id: &str,
        product_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, CoreError>;

    /// Reject a pending reservation. Errors with `InvalidTransition` if it
    /// is not pending.
    async fn reject_pending(
        &self,
        reservation_id: &str,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), CoreError>;

    /// Reject an approved reservation and credit its stock back, in one
    /// transaction. Returns `false` (writing nothing) when the reservation
    /// is no longer approved, so concurrent completions are skipped
    /// idempotently.
    async fn reap_with_credit(
        &self,
        reservation_id: &str,
        product_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, CoreError>;

    /// Complete an approved reservation and insert its sales record in one
    /// transaction, capturing the product price at completion time.
    ///
    /// Returns `None` (writing nothing) when the reservation is not
    /// currently approved; exactly one caller of concurrent completions
    /// observes `Some`.
    async fn complete_with_sale(
        &self,
        reservation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SalesRecord>, CoreError>;

    /// Reservations for a user, newest first.
    async fn reservations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ReservationRecord>, CoreError>;

    /// Reservations with a given status, newest first.
    async fn reservations_by_status(
        &self,
        status: ReservationStatus,
    ) -> Result<Vec<ReservationRecord>, CoreError>;

    /// Delete a reservation iff it is pending or terminal. Returns whether a
    /// row was deleted. Approved reservations must be resolved first so
    /// deletion can never strand a stock debit.
    async fn delete_reservation(&self, reservation_id: &str) -> Result<bool, CoreError>;

    // ------------------------------------------------------------------
    // Sales
    // ------------------------------------------------------------------

    /// Sales records for a calendar date.
    async fn sales_for_date(&self, date: NaiveDate) -> Result<Vec<SalesRecord>, CoreError>;

    /// Sales records in an inclusive date range.
    async fn sales_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SalesRecord>, CoreError>;

    /// Aggregate totals across all sales records.
    async fn sales_summary(&self) -> Result<SalesSummary, CoreError>;

    /// Export rows (sales joined with reservation timestamps) for a date.
    async fn sales_export_rows(&self, date: NaiveDate) -> Result<Vec<SalesExportRow>, CoreError>;

    // ------------------------------------------------------------------
    // Email log
    // ------------------------------------------------------------------

    /// Append an email log entry. Returns the new row ID.
    async fn insert_email_log(&self, entry: &NewEmailLog) -> Result<i64, CoreError>;

    /// Timestamp of the most recent successfully sent low-stock email for an
    /// (incubatee, product) pair. Cooldown decisions derive from this, never
    /// from in-memory state, so they survive restarts.
    async fn last_low_stock_sent(
        &self,
        incubatee_id: &str,
        product_id: &str,
    ) -> Result<Option<DateTime<Utc>>, CoreError>;

    /// Email log entries for an (incubatee, product) pair, newest first.
    async fn email_logs_for_pair(
        &self,
        incubatee_id: &str,
        product_id: &str,
    ) -> Result<Vec<EmailLogRecord>, CoreError>;

    /// Delete email log entries older than `cutoff`. Returns the count.
    async fn purge_email_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, CoreError>;

    // ------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------

    /// Cheap connectivity check.
    async fn health_check_db(&self) -> Result<(), CoreError>;
}
