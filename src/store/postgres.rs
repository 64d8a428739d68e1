//! Postgres-backed payment store
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE payments (
//!     id             TEXT PRIMARY KEY,
//!     order_id       TEXT NOT NULL,
//!     transaction_id TEXT,
//!     method         TEXT NOT NULL,
//!     status         TEXT NOT NULL,
//!     amount         NUMERIC NOT NULL,
//!     order_info     TEXT NOT NULL,
//!     user_id        TEXT,
//!     extra_data     TEXT,
//!     payment_url    TEXT,
//!     error_message  TEXT,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     updated_at     TIMESTAMPTZ NOT NULL,
//!     completed_at   TIMESTAMPTZ
//! );
//! CREATE INDEX payments_order_id_idx ON payments (order_id);
//! -- At most one live (non-failed) payment per order
//! CREATE UNIQUE INDEX payments_live_order_idx ON payments (order_id)
//!     WHERE status <> 'failed';
//! ```
//!
//! Status transitions are single conditional UPDATEs guarded on
//! `status = 'pending'`, so a record can leave the pending state exactly once
//! regardless of how many handlers race for it.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::error::{StoreError, StoreResult};
use crate::store::payment::{NewPayment, Payment, PaymentStatus};
use crate::store::PaymentStore;

pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn insert(&self, new: &NewPayment) -> StoreResult<Payment> {
        let now = Utc::now();
        sqlx::query_as::<_, Payment>(
            "INSERT INTO payments
                 (id, order_id, method, status, amount, order_info, user_id, extra_data, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING id, order_id, transaction_id, method, status, amount, order_info,
                       user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&new.order_id)
        .bind(new.method.to_string())
        .bind(PaymentStatus::Pending.to_string())
        .bind(new.amount)
        .bind(&new.order_info)
        .bind(&new.user_id)
        .bind(&new.extra_data)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn update(&self, payment: &Payment) -> StoreResult<Payment> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET order_info = $2, user_id = $3, extra_data = $4, payment_url = $5, updated_at = $6
             WHERE id = $1
             RETURNING id, order_id, transaction_id, method, status, amount, order_info,
                       user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at",
        )
        .bind(&payment.id)
        .bind(&payment.order_info)
        .bind(&payment.user_id)
        .bind(&payment.extra_data)
        .bind(&payment.payment_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, order_id, transaction_id, method, status, amount, order_info,
                    user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at
             FROM payments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        // Non-failed record wins when a failed attempt coexists with a retry
        sqlx::query_as::<_, Payment>(
            "SELECT id, order_id, transaction_id, method, status, amount, order_info,
                    user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at
             FROM payments WHERE order_id = $1
             ORDER BY CASE WHEN status = 'failed' THEN 1 ELSE 0 END, created_at DESC
             LIMIT 1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> StoreResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, order_id, transaction_id, method, status, amount, order_info,
                    user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at
             FROM payments WHERE transaction_id = $1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, order_id, transaction_id, method, status, amount, order_info,
                    user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at
             FROM payments WHERE user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, order_id, transaction_id, method, status, amount, order_info,
                    user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at
             FROM payments WHERE status = $1
             ORDER BY created_at ASC",
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn find_by_user_id_and_status(
        &self,
        user_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, order_id, transaction_id, method, status, amount, order_info,
                    user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at
             FROM payments WHERE user_id = $1 AND status = $2
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_if_pending(
        &self,
        order_id: &str,
        transaction_id: &str,
    ) -> StoreResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET status = 'success', transaction_id = $2, completed_at = $3, updated_at = $3
             WHERE order_id = $1 AND status = 'pending'
             RETURNING id, order_id, transaction_id, method, status, amount, order_info,
                       user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at",
        )
        .bind(order_id)
        .bind(transaction_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    async fn fail_if_pending(
        &self,
        order_id: &str,
        error_message: &str,
    ) -> StoreResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET status = 'failed', error_message = $2, updated_at = $3
             WHERE order_id = $1 AND status = 'pending'
             RETURNING id, order_id, transaction_id, method, status, amount, order_info,
                       user_id, extra_data, payment_url, error_message, created_at, updated_at, completed_at",
        )
        .bind(order_id)
        .bind(error_message)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }
}
