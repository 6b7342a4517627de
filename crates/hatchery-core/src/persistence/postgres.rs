// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL persistence backend for hatchery-core.
//!
//! Provides all durable storage access functions for incubatees, products,
//! reservations, sales records, and the email dispatch log.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::error::CoreError;

use super::{
    DebitOutcome, EmailLogRecord, IncubateeRecord, LowStockCandidate, NewEmailLog, Persistence,
    ProductRecord, ReservationRecord, ReservationStatus, SalesExportRow, SalesRecord, SalesSummary,
};

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Catalog Operations
// ============================================================================

/// Insert an incubatee record.
pub async fn insert_incubatee(pool: &PgPool, incubatee: &IncubateeRecord) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO incubatees (id, name, contact_email, approved, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&incubatee.id)
    .bind(&incubatee.name)
    .bind(&incubatee.contact_email)
    .bind(incubatee.approved)
    .bind(incubatee.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a product record.
pub async fn insert_product(pool: &PgPool, product: &ProductRecord) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO products (id, incubatee_id, name, stock_amount, price,
                              pricing_unit, expires_on, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&product.id)
    .bind(&product.incubatee_id)
    .bind(&product.name)
    .bind(product.stock_amount)
    .bind(product.price)
    .bind(&product.pricing_unit)
    .bind(product.expires_on)
    .bind(product.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a product by ID.
pub async fn get_product(pool: &PgPool, product_id: &str) -> Result<Option<ProductRecord>, CoreError> {
    let record = sqlx::query_as::<_, ProductRecord>(
        r#"
        SELECT id, incubatee_id, name, stock_amount, price,
               pricing_unit, expires_on, created_at
        FROM products
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Conditionally debit stock. The guard on `stock_amount` makes the debit
/// all-or-nothing under concurrency.
pub async fn try_debit_stock(
    pool: &PgPool,
    product_id: &str,
    quantity: i32,
) -> Result<DebitOutcome, CoreError> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_amount = stock_amount - $2
        WHERE id = $1 AND stock_amount >= $2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        Ok(DebitOutcome::Insufficient)
    } else {
        Ok(DebitOutcome::Applied)
    }
}

/// Credit stock back to a product.
pub async fn credit_stock(pool: &PgPool, product_id: &str, quantity: i32) -> Result<(), CoreError> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_amount = stock_amount + $2
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound {
            entity: "product",
            id: product_id.to_string(),
        });
    }

    Ok(())
}

/// Change a product's unit price.
pub async fn update_product_price(
    pool: &PgPool,
    product_id: &str,
    price: f64,
) -> Result<(), CoreError> {
    let result = sqlx::query("UPDATE products SET price = $2 WHERE id = $1")
        .bind(product_id)
        .bind(price)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound {
            entity: "product",
            id: product_id.to_string(),
        });
    }

    Ok(())
}

/// Low-stock products whose incubatee is approved, ordered by product ID.
pub async fn low_stock_candidates(
    pool: &PgPool,
    threshold: i32,
) -> Result<Vec<LowStockCandidate>, CoreError> {
    let records = sqlx::query_as::<_, LowStockCandidate>(
        r#"
        SELECT p.id AS product_id, p.name AS product_name, p.stock_amount,
               i.id AS incubatee_id, i.name AS incubatee_name, i.contact_email
        FROM products p
        JOIN incubatees i ON i.id = p.incubatee_id
        WHERE p.stock_amount <= $1 AND i.approved = TRUE
        ORDER BY p.id ASC
        "#,
    )
    .bind(threshold)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

// ============================================================================
// Reservation Operations
// ============================================================================

/// Insert a reservation record.
pub async fn insert_reservation(
    pool: &PgPool,
    reservation: &ReservationRecord,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"
        INSERT INTO reservations (id, user_id, product_id, quantity, status,
                                  reserved_at, approved_at, completed_at,
                                  rejected_at, rejected_reason)
        VALUES ($1, $2, $3, $4, $5::reservation_status, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&reservation.id)
    .bind(&reservation.user_id)
    .bind(&reservation.product_id)
    .bind(reservation.quantity)
    .bind(&reservation.status)
    .bind(reservation.reserved_at)
    .bind(reservation.approved_at)
    .bind(reservation.completed_at)
    .bind(reservation.rejected_at)
    .bind(&reservation.rejected_reason)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a reservation by ID.
pub async fn get_reservation(
    pool: &PgPool,
    reservation_id: &str,
) -> Result<Option<ReservationRecord>, CoreError> {
    let record = sqlx::query_as::<_, ReservationRecord>(
        r#"
        SELECT id, user_id, product_id, quantity, status::text as status,
               reserved_at, approved_at, completed_at, rejected_at, rejected_reason
        FROM reservations
        WHERE id = $1
        "#,
    )
    .bind(reservation_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Pending reservations for a product in first-come-first-served order.
pub async fn pending_for_product(
    pool: &PgPool,
    product_id: &str,
) -> Result<Vec<ReservationRecord>, CoreError> {
    let records = sqlx::query_as::<_, ReservationRecord>(
        r#"
        SELECT id, user_id, product_id, quantity, status::text as status,
               reserved_at, approved_at, completed_at, rejected_at, rejected_reason
        FROM reservations
        WHERE product_id = $1 AND status = 'pending'::reservation_status
        ORDER BY reserved_at ASC, id ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Product IDs that currently have pending reservations.
pub async fn products_with_pending(pool: &PgPool) -> Result<Vec<String>, CoreError> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT product_id
        FROM reservations
        WHERE status = 'pending'::reservation_status
        ORDER BY product_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Approved reservations reserved strictly before `cutoff`.
pub async fn approved_older_than(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<Vec<ReservationRecord>, CoreError> {
    let records = sqlx::query_as::<_, ReservationRecord>(
        r#"
        SELECT id, user_id, product_id, quantity, status::text as status,
               reserved_at, approved_at, completed_at, rejected_at, rejected_reason
        FROM reservations
        WHERE status = 'approved'::reservation_status AND reserved_at < $1
        ORDER BY reserved_at ASC, id ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Debit stock and approve a pending reservation in one transaction.
pub async fn approve_with_debit(
    pool: &PgPool,
    reservation_id: &str,
    product_id: &str,
    quantity: i32,
    now: DateTime<Utc>,
) -> Result<DebitOutcome, CoreError> {
    let mut tx = pool.begin().await?;

    let debit = sqlx::query(
        r#"
        UPDATE products
        SET stock_amount = stock_amount - $2
        WHERE id = $1 AND stock_amount >= $2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *tx)
    .await?;

    if debit.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(DebitOutcome::Insufficient);
    }

    let approved = sqlx::query(
        r#"
        UPDATE reservations
        SET status = 'approved'::reservation_status, approved_at = $2
        WHERE id = $1 AND status = 'pending'::reservation_status
        "#,
    )
    .bind(reservation_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if approved.rows_affected() == 0 {
        tx.rollback().await?;
        let actual = reservation_status_text(pool, reservation_id).await?;
        return Err(CoreError::InvalidTransition {
            reservation_id: reservation_id.to_string(),
            expected: "pending".to_string(),
            actual,
        });
    }

    tx.commit().await?;
    Ok(DebitOutcome::Applied)
}

/// Reject a pending reservation.
pub async fn reject_pending(
    pool: &PgPool,
    reservation_id: &str,
    now: DateTime<Utc>,
    reason: &str,
) -> Result<(), CoreError> {
    let result = sqlx::query(
        r#"
        UPDATE reservations
        SET status = 'rejected'::reservation_status, rejected_at = $2, rejected_reason = $3
        WHERE id = $1 AND status = 'pending'::reservation_status
        "#,
    )
    .bind(reservation_id)
    .bind(now)
    .bind(reason)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let actual = reservation_status_text(pool, reservation_id).await?;
        return Err(CoreError::InvalidTransition {
            reservation_id: reservation_id.to_string(),
            expected: "pending".to_string(),
            actual,
        });
    }

    Ok(())
}

/// Reject an approved reservation and credit its stock back in one
/// transaction. Returns `false` when the reservation is no longer approved.
pub async fn reap_with_credit(
    pool: &PgPool,
    reservation_id: &str,
    product_id: &str,
    quantity: i32,
    now: DateTime<Utc>,
    reason: &str,
) -> Result<bool, CoreError> {
    let mut tx = pool.begin().await?;

    let rejected = sqlx::query(
        r#"
        UPDATE reservations
        SET status = 'rejected'::reservation_status, rejected_at = $2, rejected_reason = $3
        WHERE id = $1 AND status = 'approved'::reservation_status
        "#,
    )
    .bind(reservation_id)
    .bind(now)
    .bind(reason)
    .execute(&mut *tx)
    .await?;

    if rejected.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        r#"
        UPDATE products
        SET stock_amount = stock_amount + $2
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Complete an approved reservation and insert its sales record in one
/// transaction. Returns `None` when the reservation is not approved.
pub async fn complete_with_sale(
    pool: &PgPool,
    reservation_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<SalesRecord>, CoreError> {
    let mut tx = pool.begin().await?;

    let completed = sqlx::query(
        r#"
        UPDATE reservations
        SET status = 'completed'::reservation_status, completed_at = $2
        WHERE id = $1 AND status = 'approved'::reservation_status
        "#,
    )
    .bind(reservation_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if completed.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    // Price and name are captured here, at completion time.
    let record = sqlx::query_as::<_, SalesRecord>(
        r#"
        INSERT INTO sales_records (reservation_id, user_id, product_name, quantity,
                                   unit_price, total_price, sale_date, created_at)
        SELECT r.id, r.user_id, p.name, r.quantity,
               p.price, p.price * r.quantity, $2, $3
        FROM reservations r
        JOIN products p ON p.id = r.product_id
        WHERE r.id = $1
        RETURNING id, reservation_id, user_id, product_name, quantity,
                  unit_price, total_price, sale_date, created_at
        "#,
    )
    .bind(reservation_id)
    .bind(now.date_naive())
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(record))
}

/// Reservations for a user, newest first.
pub async fn reservations_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<ReservationRecord>, CoreError> {
    let records = sqlx::query_as::<_, ReservationRecord>(
        r#"
        SELECT id, user_id, product_id, quantity, status::text as status,
               reserved_at, approved_at, completed_at, rejected_at, rejected_reason
        FROM reservations
        WHERE user_id = $1
        ORDER BY reserved_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Reservations with a given status, newest first.
pub async fn reservations_by_status(
    pool: &PgPool,
    status: ReservationStatus,
) -> Result<Vec<ReservationRecord>, CoreError> {
    let records = sqlx::query_as::<_, ReservationRecord>(
        r#"
        SELECT id, user_id, product_id, quantity, status::text as status,
               reserved_at, approved_at, completed_at, rejected_at, rejected_reason
        FROM reservations
        WHERE status = $1::reservation_status
        ORDER BY reserved_at DESC, id DESC
        "#,
    )
    .bind(status.as_str())
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Delete a reservation unless it is approved. Approved reservations hold a
/// stock debit and must be completed or rejected first.
pub async fn delete_reservation(pool: &PgPool, reservation_id: &str) -> Result<bool, CoreError> {
    let result = sqlx::query(
        r#"
        DELETE FROM reservations
        WHERE id = $1 AND status != 'approved'::reservation_status
        "#,
    )
    .bind(reservation_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn reservation_status_text(pool: &PgPool, reservation_id: &str) -> Result<String, CoreError> {
    let status: Option<String> =
        sqlx::query_scalar("SELECT status::text FROM reservations WHERE id = $1")
            .bind(reservation_id)
            .fetch_optional(pool)
            .await?;

    Ok(status.unwrap_or_else(|| "missing".to_string()))
}

// ============================================================================
// Sales Operations
// ============================================================================

/// Sales records for a calendar date.
pub async fn sales_for_date(pool: &PgPool, date: NaiveDate) -> Result<Vec<SalesRecord>, CoreError> {
    let records = sqlx::query_as::<_, SalesRecord>(
        r#"
        SELECT id, reservation_id, user_id, product_name, quantity,
               unit_price, total_price, sale_date, created_at
        FROM sales_records
        WHERE sale_date = $1
        ORDER BY id ASC
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Sales records in an inclusive date range.
pub async fn sales_in_range(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<SalesRecord>, CoreError> {
    let records = sqlx::query_as::<_, SalesRecord>(
        r#"
        SELECT id, reservation_id, user_id, product_name, quantity,
               unit_price, total_price, sale_date, created_at
        FROM sales_records
        WHERE sale_date >= $1 AND sale_date <= $2
        ORDER BY sale_date ASC, id ASC
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Aggregate totals across all sales records.
pub async fn sales_summary(pool: &PgPool) -> Result<SalesSummary, CoreError> {
    let summary = sqlx::query_as::<_, SalesSummary>(
        r#"
        SELECT COUNT(*) AS total_sales,
               COALESCE(SUM(quantity), 0)::BIGINT AS total_quantity,
               COALESCE(SUM(total_price), 0.0) AS total_revenue
        FROM sales_records
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(summary)
}

/// Export rows for a calendar date: sales joined with reservation timestamps.
pub async fn sales_export_rows(
    pool: &PgPool,
    date: NaiveDate,
) -> Result<Vec<SalesExportRow>, CoreError> {
    let records = sqlx::query_as::<_, SalesExportRow>(
        r#"
        SELECT s.id, s.reservation_id, s.user_id, s.product_name, s.quantity,
               s.unit_price, s.total_price, s.sale_date,
               r.reserved_at, r.completed_at, r.status::text as status
        FROM sales_records s
        LEFT JOIN reservations r ON r.id = s.reservation_id
        WHERE s.sale_date = $1
        ORDER BY s.id ASC
        "#,
    )
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

// ============================================================================
// Email Log Operations
// ============================================================================

/// Append an email log entry.
pub async fn insert_email_log(pool: &PgPool, entry: &NewEmailLog) -> Result<i64, CoreError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO email_logs (kind, recipient, subject, product_id, incubatee_id,
                                stock_at_send, status, reason, sent_at,
                                next_scheduled, interval_minutes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(entry.kind.as_str())
    .bind(&entry.recipient)
    .bind(&entry.subject)
    .bind(&entry.product_id)
    .bind(&entry.incubatee_id)
    .bind(entry.stock_at_send)
    .bind(entry.status.as_str())
    .bind(&entry.reason)
    .bind(entry.sent_at)
    .bind(entry.next_scheduled)
    .bind(entry.interval_minutes)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Most recent successful low-stock send for an (incubatee, product) pair.
pub async fn last_low_stock_sent(
    pool: &PgPool,
    incubatee_id: &str,
    product_id: &str,
) -> Result<Option<DateTime<Utc>>, CoreError> {
    let sent_at: Option<DateTime<Utc>> = sqlx::query_scalar(
        r#"
        SELECT MAX(sent_at)
        FROM email_logs
        WHERE kind = 'low_stock' AND status = 'sent'
          AND incubatee_id = $1 AND product_id = $2
        "#,
    )
    .bind(incubatee_id)
    .bind(product_id)
    .fetch_one(pool)
    .await?;

    Ok(sent_at)
}

/// Email log entries for an (incubatee, product) pair, newest first.
pub async fn email_logs_for_pair(
    pool: &PgPool,
    incubatee_id: &str,
    product_id: &str,
) -> Result<Vec<EmailLogRecord>, CoreError> {
    let records = sqlx::query_as::<_, EmailLogRecord>(
        r#"
        SELECT id, kind, recipient, subject, product_id, incubatee_id,
               stock_at_send, status, reason, sent_at, next_scheduled, interval_minutes
        FROM email_logs
        WHERE incubatee_id = $1 AND product_id = $2
        ORDER BY sent_at DESC, id DESC
        "#,
    )
    .bind(incubatee_id)
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Delete email log entries older than `cutoff`.
pub async fn purge_email_logs_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, CoreError> {
    let result = sqlx::query("DELETE FROM email_logs WHERE sent_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Cheap connectivity check.
pub async fn health_check_db(pool: &PgPool) -> Result<(), CoreError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn insert_incubatee(&self, incubatee: &IncubateeRecord) -> Result<(), CoreError> {
        insert_incubatee(&self.pool, incubatee).await
    }

    async fn insert_product(&self, product: &ProductRecord) -> Result<(), CoreError> {
        insert_product(&self.pool, product).await
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<ProductRecord>, CoreError> {
        get_product(&self.pool, product_id).await
    }

    async fn try_debit_stock(
        &self,
        product_id: &str,
        quantity: i32,
    ) -> Result<DebitOutcome, CoreError> {
        try_debit_stock(&self.pool, product_id, quantity).await
    }

    async fn credit_stock(&self, product_id: &str, quantity: i32) -> Result<(), CoreError> {
        credit_stock(&self.pool, product_id, quantity).await
    }

    async fn update_product_price(&self, product_id: &str, price: f64) -> Result<(), CoreError> {
        update_product_price(&self.pool, product_id, price).await
    }

    async fn low_stock_candidates(
        &self,
        threshold: i32,
    ) -> Result<Vec<LowStockCandidate>, CoreError> {
        low_stock_candidates(&self.pool, threshold).await
    }

    async fn insert_reservation(&self, reservation: &ReservationRecord) -> Result<(), CoreError> {
        insert_reservation(&self.pool, reservation).await
    }

    async fn get_reservation(
        &self,
        reservation_id: &str,
    ) -> Result<Option<ReservationRecord>, CoreError> {
        get_reservation(&self.pool, reservation_id).await
    }

    async fn pending_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        pending_for_product(&self.pool, product_id).await
    }

    async fn products_with_pending(&self) -> Result<Vec<String>, CoreError> {
        products_with_pending(&self.pool).await
    }

    async fn approved_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        approved_older_than(&self.pool, cutoff).await
    }

    async fn approve_with_debit(
        &self,
        reservation_id: &str,
        product_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, CoreError> {
        approve_with_debit(&self.pool, reservation_id, product_id, quantity, now).await
    }

    async fn reject_pending(
        &self,
        reservation_id: &str,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), CoreError> {
        reject_pending(&self.pool, reservation_id, now, reason).await
    }

    async fn reap_with_credit(
        &self,
        reservation_id: &str,
        product_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, CoreError> {
        reap_with_credit(&self.pool, reservation_id, product_id, quantity, now, reason).await
    }

    async fn complete_with_sale(
        &self,
        reservation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SalesRecord>, CoreError> {
        complete_with_sale(&self.pool, reservation_id, now).await
    }

    async fn reservations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        reservations_for_user(&self.pool, user_id).await
    }

    async fn reservations_by_status(
        &self,
        status: ReservationStatus,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        reservations_by_status(&self.pool, status).await
    }

    async fn delete_reservation(&self, reservation_id: &str) -> Result<bool, CoreError> {
        delete_reservation(&self.pool, reservation_id).await
    }

    async fn sales_for_date(&self, date: NaiveDate) -> Result<Vec<SalesRecord>, CoreError> {
        sales_for_date(&self.pool, date).await
    }

    async fn sales_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SalesRecord>, CoreError> {
        sales_in_range(&self.pool, from, to).await
    }

    async fn sales_summary(&self) -> Result<SalesSummary, CoreError> {
        sales_summary(&self.pool).await
    }

    async fn sales_export_rows(&self, date: NaiveDate) -> Result<Vec<SalesExportRow>, CoreError> {
        sales_export_rows(&self.pool, date).await
    }

    async fn insert_email_log(&self, entry: &NewEmailLog) -> Result<i64, CoreError> {
        insert_email_log(&self.pool, entry).await
    }

    async fn last_low_stock_sent(
        &self,
        incubatee_id: &str,
        product_id: &str,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        last_low_stock_sent(&self.pool, incubatee_id, product_id).await
    }

    async fn email_logs_for_pair(
        &self,
        incubatee_id: &str,
        product_id: &str,
    ) -> Result<Vec<EmailLogRecord>, CoreError> {
        email_logs_for_pair(&self.pool, incubatee_id, product_id).await
    }

    async fn purge_email_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, CoreError> {
        purge_email_logs_before(&self.pool, cutoff).await
    }

    async fn health_check_db(&self) -> Result<(), CoreError> {
        health_check_db(&self.pool).await
    }
}
