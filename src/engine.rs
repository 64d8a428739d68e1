//! Payment reconciliation engine
//!
//! Sole authority over the payment state machine. Both rails request status
//! transitions through this type; nothing else writes `status`,
//! `transaction_id`, `completed_at` or `error_message`.
//!
//! The state machine is `Pending -> Success` or `Pending -> Failed`, both
//! terminal. Re-applying the status a record already holds is acknowledged by
//! returning the persisted record unchanged, which is what makes duplicate
//! and replayed gateway notifications safe. Moving between the two terminal
//! states is a caller error and is refused.
//!
//! Transitions are linearizable per order id: the underlying stores apply
//! them as conditional writes guarded on the record still being pending, so
//! of any number of racing deliveries exactly one wins and the rest observe
//! its result.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{NewPayment, Payment, PaymentStatus, PaymentStore, StoreError};

#[derive(Debug, Error)]
pub enum PaymentError {
    /// A non-failed payment already exists for the order
    #[error("a payment already exists for order {0}")]
    DuplicateOrder(String),

    #[error("no payment found for order {0}")]
    NotFound(String),

    /// Attempt to move a payment out of a terminal state
    #[error("payment for order {order_id} is already {status}")]
    TerminalState {
        order_id: String,
        status: PaymentStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct ReconciliationEngine {
    store: Arc<dyn PaymentStore>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    /// Open a new pending payment for an order.
    ///
    /// Rejected with [`PaymentError::DuplicateOrder`] while a non-failed
    /// payment exists for the same order id; a failed attempt does not block
    /// a fresh one.
    pub async fn create_payment(&self, new: NewPayment) -> Result<Payment, PaymentError> {
        if let Some(existing) = self.store.find_by_order_id(&new.order_id).await? {
            if existing.status != PaymentStatus::Failed {
                return Err(PaymentError::DuplicateOrder(new.order_id));
            }
        }

        // The store enforces at most one live record per order, which covers
        // creates racing past the check above
        let payment = match self.store.insert(&new).await {
            Ok(payment) => payment,
            Err(e) if e.is_unique_violation() => {
                return Err(PaymentError::DuplicateOrder(new.order_id));
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            "Created {} payment {} for order {}",
            payment.method, payment.id, payment.order_id
        );
        Ok(payment)
    }

    /// Settle an order.
    ///
    /// Idempotent: a payment already successful is returned as-is and the
    /// stored transaction reference is not overwritten. A failed payment
    /// cannot be resurrected and yields [`PaymentError::TerminalState`].
    pub async fn transition_to_success(
        &self,
        order_id: &str,
        transaction_id: &str,
    ) -> Result<Payment, PaymentError> {
        let current = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(order_id.to_string()))?;

        match current.status {
            PaymentStatus::Success => {
                info!("Payment already processed for order: {}", order_id);
                Ok(current)
            }
            PaymentStatus::Failed => Err(PaymentError::TerminalState {
                order_id: order_id.to_string(),
                status: current.status,
            }),
            PaymentStatus::Pending => {
                match self
                    .store
                    .complete_if_pending(order_id, transaction_id)
                    .await?
                {
                    Some(updated) => {
                        info!(
                            "Payment successful for order: {} (transaction {})",
                            order_id, transaction_id
                        );
                        Ok(updated)
                    }
                    None => self.resolve_lost_race(order_id, PaymentStatus::Success).await,
                }
            }
        }
    }

    /// Fail an order, recording the reason.
    ///
    /// Idempotent against an already-failed payment; refused for a
    /// successful one.
    pub async fn transition_to_failure(
        &self,
        order_id: &str,
        reason: &str,
    ) -> Result<Payment, PaymentError> {
        let current = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(order_id.to_string()))?;

        match current.status {
            PaymentStatus::Failed => Ok(current),
            PaymentStatus::Success => Err(PaymentError::TerminalState {
                order_id: order_id.to_string(),
                status: current.status,
            }),
            PaymentStatus::Pending => {
                match self.store.fail_if_pending(order_id, reason).await? {
                    Some(updated) => {
                        info!("Payment failed for order: {} ({})", order_id, reason);
                        Ok(updated)
                    }
                    None => self.resolve_lost_race(order_id, PaymentStatus::Failed).await,
                }
            }
        }
    }

    /// Pure read; never triggers reconciliation or any external call.
    pub async fn get(&self, order_id: &str) -> Result<Payment, PaymentError> {
        self.store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(order_id.to_string()))
    }

    /// Attach the gateway checkout URL to a freshly created payment.
    pub async fn attach_payment_url(
        &self,
        order_id: &str,
        payment_url: &str,
    ) -> Result<Payment, PaymentError> {
        let mut payment = self.get(order_id).await?;
        payment.payment_url = Some(payment_url.to_string());
        Ok(self.store.update(&payment).await?)
    }

    /// A conditional write found the record no longer pending: another
    /// delivery won the race. Re-read and answer with its outcome.
    async fn resolve_lost_race(
        &self,
        order_id: &str,
        wanted: PaymentStatus,
    ) -> Result<Payment, PaymentError> {
        let current = self
            .store
            .find_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(order_id.to_string()))?;

        if current.status == wanted {
            warn!(
                "Concurrent delivery already settled order {} as {}",
                order_id, current.status
            );
            return Ok(current);
        }

        Err(PaymentError::TerminalState {
            order_id: order_id.to_string(),
            status: current.status,
        })
    }
}
