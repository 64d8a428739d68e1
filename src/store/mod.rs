//! Payment persistence
//!
//! The reconciliation engine talks to storage through the [`PaymentStore`]
//! trait. Two implementations are provided: a Postgres-backed store for
//! production and an in-memory store used by tests and local development.
//! Both realize status transitions as conditional writes ("apply only if the
//! record is still pending") so that concurrent deliveries of the same
//! notification cannot double-apply.

pub mod error;
pub mod memory;
pub mod payment;
pub mod postgres;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error as log_error, info};

pub use error::{StoreError, StoreErrorKind, StoreResult};
pub use memory::MemoryPaymentStore;
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentStatus};
pub use postgres::PgPaymentStore;

/// Keyed store of payment records
///
/// `find_by_order_id` resolves the live record for an order: when a failed
/// payment coexists with a later retry under the same order id, the
/// non-failed record wins, ties broken by recency.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new payment, assigning id and timestamps.
    ///
    /// Fails with a unique violation when a live (non-failed) record already
    /// exists for the order id.
    async fn insert(&self, new: &NewPayment) -> StoreResult<Payment>;

    /// Persist non-lifecycle field changes, refreshing `updated_at`
    async fn update(&self, payment: &Payment) -> StoreResult<Payment>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Payment>>;

    async fn find_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>>;

    async fn find_by_transaction_id(&self, transaction_id: &str) -> StoreResult<Option<Payment>>;

    async fn find_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Payment>>;

    async fn find_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>>;

    async fn find_by_user_id_and_status(
        &self,
        user_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<Vec<Payment>>;

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool>;

    /// Mark the order's payment successful, but only if it is still pending.
    ///
    /// Sets status, transaction reference and `completed_at` in one write.
    /// Returns `None` when the guard fails (the record is no longer pending),
    /// in which case the caller re-reads and decides.
    async fn complete_if_pending(
        &self,
        order_id: &str,
        transaction_id: &str,
    ) -> StoreResult<Option<Payment>>;

    /// Mark the order's payment failed, but only if it is still pending.
    async fn fail_if_pending(
        &self,
        order_id: &str,
        error_message: &str,
    ) -> StoreResult<Option<Payment>>;
}

/// Initialize the Postgres connection pool
pub async fn init_pool(database_url: &str, max_connections: u32) -> StoreResult<PgPool> {
    info!(
        "Initializing database pool: max_connections={}",
        max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("Failed to initialize database pool: {}", e);
            StoreError::from_sqlx(e)
        })?;

    info!("Database pool initialized successfully");
    Ok(pool)
}
