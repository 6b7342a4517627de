//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::CoreError;

use super::{
    DebitOutcome, EmailLogRecord, IncubateeRecord, LowStockCandidate, NewEmailLog, Persistence,
    ProductRecord, ReservationRecord, ReservationStatus, SalesExportRow, SalesRecord, SalesSummary,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create and initialize a new SQLite persistence from a file path.
    ///
    /// Creates the database file if it doesn't exist, connects with sensible
    /// defaults, and runs all migrations.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Database(sqlx::Error::Io(e)))?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());

        let pool = SqlitePoolOptions::new().max_connections(5).connect(&url).await?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| CoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;

        Ok(Self { pool })
    }

    /// Create an in-memory SQLite persistence with migrations applied.
    ///
    /// The pool is limited to a single connection: each connection to
    /// `sqlite::memory:` would otherwise get its own empty database.
    pub async fn in_memory() -> Result<Self, CoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| CoreError::Database(sqlx::Error::Migrate(Box::new(e))))?;

        Ok(Self { pool })
    }

    async fn reservation_status_text(&self, reservation_id: &str) -> Result<String, CoreError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM reservations WHERE id = ?")
                .bind(reservation_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(status.unwrap_or_else(|| "missing".to_string()))
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn insert_incubatee(&self, incubatee: &IncubateeRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO incubatees (id, name, contact_email, approved, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&incubatee.id)
        .bind(&incubatee.name)
        .bind(&incubatee.contact_email)
        .bind(incubatee.approved)
        .bind(incubatee.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_product(&self, product: &ProductRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, incubatee_id, name, stock_amount, price,
                                  pricing_unit, expires_on, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
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
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_product(&self, product_id: &str) -> Result<Option<ProductRecord>, CoreError> {
        let record = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, incubatee_id, name, stock_amount, price,
                   pricing_unit, expires_on, created_at
            FROM products
            WHERE id = ?
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn try_debit_stock(
        &self,
        product_id: &str,
        quantity: i32,
    ) -> Result<DebitOutcome, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_amount = stock_amount - ?2
            WHERE id = ?1 AND stock_amount >= ?2
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(DebitOutcome::Insufficient)
        } else {
            Ok(DebitOutcome::Applied)
        }
    }

    async fn credit_stock(&self, product_id: &str, quantity: i32) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_amount = stock_amount + ?2
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            });
        }

        Ok(())
    }

    async fn update_product_price(&self, product_id: &str, price: f64) -> Result<(), CoreError> {
        let result = sqlx::query("UPDATE products SET price = ?2 WHERE id = ?1")
            .bind(product_id)
            .bind(price)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            });
        }

        Ok(())
    }

    async fn low_stock_candidates(
        &self,
        threshold: i32,
    ) -> Result<Vec<LowStockCandidate>, CoreError> {
        let records = sqlx::query_as::<_, LowStockCandidate>(
            r#"
            SELECT p.id AS product_id, p.name AS product_name, p.stock_amount,
                   i.id AS incubatee_id, i.name AS incubatee_name, i.contact_email
            FROM products p
            JOIN incubatees i ON i.id = p.incubatee_id
            WHERE p.stock_amount <= ? AND i.approved = 1
            ORDER BY p.id ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_reservation(&self, reservation: &ReservationRecord) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO reservations (id, user_id, product_id, quantity, status,
                                      reserved_at, approved_at, completed_at,
                                      rejected_at, rejected_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_reservation(
        &self,
        reservation_id: &str,
    ) -> Result<Option<ReservationRecord>, CoreError> {
        let record = sqlx::query_as::<_, ReservationRecord>(
            r#"
            SELECT id, user_id, product_id, quantity, status,
                   reserved_at, approved_at, completed_at, rejected_at, rejected_reason
            FROM reservations
            WHERE id = ?
            "#,
        )
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn pending_for_product(
        &self,
        product_id: &str,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        let records = sqlx::query_as::<_, ReservationRecord>(
            r#"
            SELECT id, user_id, product_id, quantity, status,
                   reserved_at, approved_at, completed_at, rejected_at, rejected_reason
            FROM reservations
            WHERE product_id = ? AND status = 'pending'
            ORDER BY reserved_at ASC, id ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn products_with_pending(&self) -> Result<Vec<String>, CoreError> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT product_id
            FROM reservations
            WHERE status = 'pending'
            ORDER BY product_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn approved_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        let records = sqlx::query_as::<_, ReservationRecord>(
            r#"
            SELECT id, user_id, product_id, quantity, status,
                   reserved_at, approved_at, completed_at, rejected_at, rejected_reason
            FROM reservations
            WHERE status = 'approved' AND reserved_at < ?
            ORDER BY reserved_at ASC, id ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn approve_with_debit(
        &self,
        reservation_id: &str,
        product_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<DebitOutcome, CoreError> {
        let mut tx = self.pool.begin().await?;

        let debit = sqlx::query(
            r#"
            UPDATE products
            SET stock_amount = stock_amount - ?2
            WHERE id = ?1 AND stock_amount >= ?2
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
            SET status = 'approved', approved_at = ?2
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(reservation_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if approved.rows_affected() == 0 {
            tx.rollback().await?;
            let actual = self.reservation_status_text(reservation_id).await?;
            return Err(CoreError::InvalidTransition {
                reservation_id: reservation_id.to_string(),
                expected: "pending".to_string(),
                actual,
            });
        }

        tx.commit().await?;
        Ok(DebitOutcome::Applied)
    }

    async fn reject_pending(
        &self,
        reservation_id: &str,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'rejected', rejected_at = ?2, rejected_reason = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(reservation_id)
        .bind(now)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let actual = self.reservation_status_text(reservation_id).await?;
            return Err(CoreError::InvalidTransition {
                reservation_id: reservation_id.to_string(),
                expected: "pending".to_string(),
                actual,
            });
        }

        Ok(())
    }

    async fn reap_with_credit(
        &self,
        reservation_id: &str,
        product_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
        reason: &str,
    ) -> Result<bool, CoreError> {
        let mut tx = self.pool.begin().await?;

        let rejected = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'rejected', rejected_at = ?2, rejected_reason = ?3
            WHERE id = ?1 AND status = 'approved'
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
            SET stock_amount = stock_amount + ?2
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn complete_with_sale(
        &self,
        reservation_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SalesRecord>, CoreError> {
        let mut tx = self.pool.begin().await?;

        let completed = sqlx::query(
            r#"
            UPDATE reservations
            SET status = 'completed', completed_at = ?2
            WHERE id = ?1 AND status = 'approved'
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
                   p.price, p.price * r.quantity, ?2, ?3
            FROM reservations r
            JOIN products p ON p.id = r.product_id
            WHERE r.id = ?1
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

    async fn reservations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        let records = sqlx::query_as::<_, ReservationRecord>(
            r#"
            SELECT id, user_id, product_id, quantity, status,
                   reserved_at, approved_at, completed_at, rejected_at, rejected_reason
            FROM reservations
            WHERE user_id = ?
            ORDER BY reserved_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn reservations_by_status(
        &self,
        status: ReservationStatus,
    ) -> Result<Vec<ReservationRecord>, CoreError> {
        let records = sqlx::query_as::<_, ReservationRecord>(
            r#"
            SELECT id, user_id, product_id, quantity, status,
                   reserved_at, approved_at, completed_at, rejected_at, rejected_reason
            FROM reservations
            WHERE status = ?
            ORDER BY reserved_at DESC, id DESC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn delete_reservation(&self, reservation_id: &str) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM reservations
            WHERE id = ? AND status != 'approved'
            "#,
        )
        .bind(reservation_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn sales_for_date(&self, date: NaiveDate) -> Result<Vec<SalesRecord>, CoreError> {
        let records = sqlx::query_as::<_, SalesRecord>(
            r#"
            SELECT id, reservation_id, user_id, product_name, quantity,
                   unit_price, total_price, sale_date, created_at
            FROM sales_records
            WHERE sale_date = ?
            ORDER BY id ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn sales_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SalesRecord>, CoreError> {
        let records = sqlx::query_as::<_, SalesRecord>(
            r#"
            SELECT id, reservation_id, user_id, product_name, quantity,
                   unit_price, total_price, sale_date, created_at
            FROM sales_records
            WHERE sale_date >= ? AND sale_date <= ?
            ORDER BY sale_date ASC, id ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn sales_summary(&self) -> Result<SalesSummary, CoreError> {
        let summary = sqlx::query_as::<_, SalesSummary>(
            r#"
            SELECT COUNT(*) AS total_sales,
                   COALESCE(SUM(quantity), 0) AS total_quantity,
                   COALESCE(SUM(total_price), 0.0) AS total_revenue
            FROM sales_records
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    async fn sales_export_rows(&self, date: NaiveDate) -> Result<Vec<SalesExportRow>, CoreError> {
        let records = sqlx::query_as::<_, SalesExportRow>(
            r#"
            SELECT s.id, s.reservation_id, s.user_id, s.product_name, s.quantity,
                   s.unit_price, s.total_price, s.sale_date,
                   r.reserved_at, r.completed_at, r.status
            FROM sales_records s
            LEFT JOIN reservations r ON r.id = s.reservation_id
            WHERE s.sale_date = ?
            ORDER BY s.id ASC
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_email_log(&self, entry: &NewEmailLog) -> Result<i64, CoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO email_logs (kind, recipient, subject, product_id, incubatee_id,
                                    stock_at_send, status, reason, sent_at,
                                    next_scheduled, interval_minutes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn last_low_stock_sent(
        &self,
        incubatee_id: &str,
        product_id: &str,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let sent_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MAX(sent_at)
            FROM email_logs
            WHERE kind = 'low_stock' AND status = 'sent'
              AND incubatee_id = ? AND product_id = ?
            "#,
        )
        .bind(incubatee_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sent_at)
    }

    async fn email_logs_for_pair(
        &self,
        incubatee_id: &str,
        product_id: &str,
    ) -> Result<Vec<EmailLogRecord>, CoreError> {
        let records = sqlx::query_as::<_, EmailLogRecord>(
            r#"
            SELECT id, kind, recipient, subject, product_id, incubatee_id,
                   stock_at_send, status, reason, sent_at, next_scheduled, interval_minutes
            FROM email_logs
            WHERE incubatee_id = ? AND product_id = ?
            ORDER BY sent_at DESC, id DESC
            "#,
        )
        .bind(incubatee_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn purge_email_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM email_logs WHERE sent_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn health_check_db(&self) -> Result<(), CoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
