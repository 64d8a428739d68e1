//! In-memory payment store
//!
//! Backs the test suite and local development. Mirrors the Postgres store's
//! semantics, including the conditional status transitions: the read-check-
//! write runs under a single write lock, so a transition applies at most once
//! no matter how many concurrent deliveries race for it.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::error::{StoreError, StoreErrorKind, StoreResult};
use crate::store::payment::{NewPayment, Payment, PaymentStatus};
use crate::store::PaymentStore;

#[derive(Default)]
pub struct MemoryPaymentStore {
    records: RwLock<Vec<Payment>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the live record for an order: non-failed preferred, then the
    /// most recently inserted.
    fn live_index(records: &[Payment], order_id: &str) -> Option<usize> {
        let mut failed = None;
        let mut live = None;
        for (i, p) in records.iter().enumerate() {
            if p.order_id != order_id {
                continue;
            }
            if p.status == PaymentStatus::Failed {
                failed = Some(i);
            } else {
                live = Some(i);
            }
        }
        live.or(failed)
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn insert(&self, new: &NewPayment) -> StoreResult<Payment> {
        let mut records = self.records.write().await;
        // Same guarantee as the Postgres partial unique index: at most one
        // live record per order id
        if records
            .iter()
            .any(|p| p.order_id == new.order_id && p.status != PaymentStatus::Failed)
        {
            return Err(StoreError::new(StoreErrorKind::UniqueViolation {
                message: format!("live payment already exists for order {}", new.order_id),
            }));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: new.order_id.clone(),
            transaction_id: None,
            method: new.method,
            status: PaymentStatus::Pending,
            amount: new.amount,
            order_info: new.order_info.clone(),
            user_id: new.user_id.clone(),
            extra_data: new.extra_data.clone(),
            payment_url: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        records.push(payment.clone());
        Ok(payment)
    }

    async fn update(&self, payment: &Payment) -> StoreResult<Payment> {
        let mut records = self.records.write().await;
        let mut updated = payment.clone();
        updated.updated_at = Utc::now();
        if let Some(existing) = records.iter_mut().find(|p| p.id == payment.id) {
            *existing = updated.clone();
        } else {
            records.push(updated.clone());
        }
        Ok(updated)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Payment>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_order_id(&self, order_id: &str) -> StoreResult<Option<Payment>> {
        let records = self.records.read().await;
        Ok(Self::live_index(&records, order_id).map(|i| records[i].clone()))
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> StoreResult<Option<Payment>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn find_by_user_id(&self, user_id: &str) -> StoreResult<Vec<Payment>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|p| p.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: PaymentStatus) -> StoreResult<Vec<Payment>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|p| p.status == status)
            .cloned()
            .collect())
    }

    async fn find_by_user_id_and_status(
        &self,
        user_id: &str,
        status: PaymentStatus,
    ) -> StoreResult<Vec<Payment>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|p| p.user_id.as_deref() == Some(user_id) && p.status == status)
            .cloned()
            .collect())
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|p| p.id != id);
        Ok(records.len() < before)
    }

    async fn complete_if_pending(
        &self,
        order_id: &str,
        transaction_id: &str,
    ) -> StoreResult<Option<Payment>> {
        let mut records = self.records.write().await;
        let Some(i) = Self::live_index(&records, order_id) else {
            return Ok(None);
        };
        if records[i].status != PaymentStatus::Pending {
            return Ok(None);
        }
        let now = Utc::now();
        let record = &mut records[i];
        record.status = PaymentStatus::Success;
        record.transaction_id = Some(transaction_id.to_string());
        record.completed_at = Some(now);
        record.updated_at = now;
        Ok(Some(record.clone()))
    }

    async fn fail_if_pending(
        &self,
        order_id: &str,
        error_message: &str,
    ) -> StoreResult<Option<Payment>> {
        let mut records = self.records.write().await;
        let Some(i) = Self::live_index(&records, order_id) else {
            return Ok(None);
        };
        if records[i].status != PaymentStatus::Pending {
            return Ok(None);
        }
        let record = &mut records[i];
        record.status = PaymentStatus::Failed;
        record.error_message = Some(error_message.to_string());
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }
}
