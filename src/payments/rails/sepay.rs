//! SePay bank-transfer rail
//!
//! Payments settle by direct bank transfer: the payer scans a VietQR image
//! that pre-fills our account and a transfer note carrying the order id.
//! SePay then posts a webhook for the inbound transfer. The webhook carries
//! no signature, so a claim is honored only when its note correlates to a
//! pending order and the transferred amount covers what is owed. A
//! pull-based ledger poll covers webhooks that were lost or delayed.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::SePayConfig;
use crate::engine::{PaymentError, ReconciliationEngine};
use crate::payments::ledger::TransactionLedger;
use crate::payments::order_ref::extract_order_id;
use crate::payments::types::{CreatePaymentRequest, PaymentResponse, TransferNotification};
use crate::store::{NewPayment, Payment, PaymentMethod, PaymentStatus};

const QR_IMAGE_BASE: &str = "https://img.vietqr.io/image";

/// How many ledger entries one reconciliation pass scans
const RECONCILE_SCAN_LIMIT: u32 = 50;

pub struct SePayRail {
    config: SePayConfig,
    engine: Arc<ReconciliationEngine>,
    ledger: Arc<dyn TransactionLedger>,
}

impl SePayRail {
    pub fn new(
        config: SePayConfig,
        engine: Arc<ReconciliationEngine>,
        ledger: Arc<dyn TransactionLedger>,
    ) -> Self {
        Self {
            config,
            engine,
            ledger,
        }
    }

    /// Open a pending payment and return the VietQR transfer descriptor.
    ///
    /// There is no checkout session on this rail; the QR image URL encodes
    /// the target account, the amount, and the order id as the transfer
    /// note so the inbound transfer can be correlated later.
    pub async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<PaymentResponse, PaymentError> {
        info!("Creating SePay payment for order: {}", request.order_id);

        self.engine
            .create_payment(NewPayment {
                order_id: request.order_id.clone(),
                method: PaymentMethod::Sepay,
                amount: request.amount,
                order_info: request.order_info.clone(),
                user_id: request.user_id.clone(),
                extra_data: request.extra_data.clone(),
            })
            .await?;

        Ok(PaymentResponse::pending(
            &request.order_id,
            self.qr_image_url(request),
            request.amount,
            "Scan QR code to pay via bank transfer",
        ))
    }

    fn qr_image_url(&self, request: &CreatePaymentRequest) -> String {
        format!(
            "{}/{}-{}-compact.png?amount={}&addInfo={}&accountName={}",
            QR_IMAGE_BASE,
            self.config.bank_code,
            self.config.account_number,
            request.amount.trunc(),
            request.order_id,
            self.config.account_name.replace(' ', "%20"),
        )
    }

    /// Process a webhook claim for an inbound transfer.
    ///
    /// Returns `true` when the order is (or already was) settled by this
    /// claim; `false` when the claim cannot be correlated, the order is
    /// unknown, or the amount falls short. An insufficient transfer fails
    /// the order so the payer can re-attempt against a fresh one.
    pub async fn handle_webhook(&self, claim: &TransferNotification) -> bool {
        info!(
            "Received SePay webhook for transfer: {}",
            claim.reference_number.as_deref().unwrap_or("<none>")
        );

        let content = claim.content.as_deref().unwrap_or_default();
        let Some(order_id) = extract_order_id(content) else {
            error!("Could not extract order id from transfer content: {:?}", content);
            return false;
        };

        let payment = match self.engine.get(&order_id).await {
            Ok(payment) => payment,
            Err(PaymentError::NotFound(_)) => {
                error!("Payment not found for order: {}", order_id);
                return false;
            }
            Err(e) => {
                error!("Error loading payment for order {}: {}", order_id, e);
                return false;
            }
        };

        if payment.status == PaymentStatus::Success {
            info!("Payment already processed for order: {}", order_id);
            return true;
        }

        if claim.transfer_amount < payment.amount {
            error!(
                "Transfer amount {} is less than payment amount {} for order: {}",
                claim.transfer_amount, payment.amount, order_id
            );
            if let Err(e) = self
                .engine
                .transition_to_failure(&order_id, "Insufficient amount transferred")
                .await
            {
                error!("Error failing underpaid order {}: {}", order_id, e);
            }
            return false;
        }

        let reference = claim.reference_number.as_deref().unwrap_or_default();
        match self.engine.transition_to_success(&order_id, reference).await {
            Ok(_) => {
                info!("Updated payment status for order: {} to SUCCESS", order_id);
                true
            }
            Err(e) => {
                error!("Error settling order {} from webhook: {}", order_id, e);
                false
            }
        }
    }

    /// Pull-based fallback for a payment that is still pending: scan recent
    /// ledger entries for a transfer whose note mentions the order id.
    ///
    /// Amount and idempotency rules are the engine's, identical to the
    /// webhook path. The ledger query is advisory; on failure the order is
    /// left pending and the error logged.
    pub async fn reconcile_pending(&self, order_id: &str) -> Result<Payment, PaymentError> {
        let payment = self.engine.get(order_id).await?;
        if payment.status != PaymentStatus::Pending {
            return Ok(payment);
        }

        info!("Checking ledger for pending order: {}", order_id);
        let entries = match self.ledger.list_recent_transactions(RECONCILE_SCAN_LIMIT).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Ledger query failed, leaving order {} pending: {}",
                    order_id, e
                );
                return Ok(payment);
            }
        };

        for entry in entries {
            let Some(content) = entry.content.as_deref() else {
                continue;
            };
            if !content.contains(order_id) {
                continue;
            }
            if entry.amount_in >= payment.amount {
                info!("Payment confirmed for order: {}", order_id);
                let reference = entry.reference_number.as_deref().unwrap_or_default();
                return self.engine.transition_to_success(order_id, reference).await;
            }
        }

        Ok(payment)
    }

    /// Manually settle an order, synthesising a reference when none is
    /// given. Idempotent against an already-successful payment.
    pub async fn manual_confirm(
        &self,
        order_id: &str,
        transaction_id: Option<&str>,
    ) -> Result<Payment, PaymentError> {
        let reference = transaction_id
            .map(str::to_string)
            .unwrap_or_else(|| format!("MANUAL_{}", Utc::now().timestamp_millis()));

        info!("Manually confirming payment for order: {}", order_id);
        self.engine.transition_to_success(order_id, &reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::ledger::{LedgerEntry, LedgerError};
    use crate::store::MemoryPaymentStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct StaticLedger(Vec<LedgerEntry>);

    #[async_trait]
    impl TransactionLedger for StaticLedger {
        async fn list_recent_transactions(
            &self,
            _limit: u32,
        ) -> Result<Vec<LedgerEntry>, LedgerError> {
            Ok(self.0.clone())
        }
    }

    struct UnreachableLedger;

    #[async_trait]
    impl TransactionLedger for UnreachableLedger {
        async fn list_recent_transactions(
            &self,
            _limit: u32,
        ) -> Result<Vec<LedgerEntry>, LedgerError> {
            Err(LedgerError::Status(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    fn test_config() -> SePayConfig {
        SePayConfig {
            api_key: "test-api-key".to_string(),
            account_number: "0123456789".to_string(),
            account_name: "DORM DELI".to_string(),
            bank_code: "VCB".to_string(),
            endpoint: "https://my.sepay.vn".to_string(),
            timeout_secs: 10,
        }
    }

    fn rail_with_ledger(
        ledger: Arc<dyn TransactionLedger>,
    ) -> (SePayRail, Arc<ReconciliationEngine>) {
        let store = Arc::new(MemoryPaymentStore::new());
        let engine = Arc::new(ReconciliationEngine::new(store));
        (
            SePayRail::new(test_config(), engine.clone(), ledger),
            engine,
        )
    }

    fn rail() -> (SePayRail, Arc<ReconciliationEngine>) {
        rail_with_ledger(Arc::new(StaticLedger(Vec::new())))
    }

    fn request(order_id: &str, amount: Decimal) -> CreatePaymentRequest {
        CreatePaymentRequest {
            order_id: order_id.to_string(),
            amount,
            order_info: "dorm delivery".to_string(),
            user_id: Some("user-1".to_string()),
            extra_data: None,
        }
    }

    fn claim(content: &str, amount: Decimal, reference: &str) -> TransferNotification {
        TransferNotification {
            id: Some(1),
            transaction_date: Some("2024-05-25 21:11:02".to_string()),
            account_number: Some("0123456789".to_string()),
            code: None,
            content: Some(content.to_string()),
            transfer_amount: amount,
            reference_number: Some(reference.to_string()),
            body: None,
            gate_name: Some("VCB".to_string()),
        }
    }

    #[tokio::test]
    async fn create_payment_returns_qr_descriptor() {
        let (rail, engine) = rail();
        let response = rail
            .create_payment(&request("ORD1001", dec!(100000)))
            .await
            .unwrap();

        let url = response.payment_url.unwrap();
        assert_eq!(
            url,
            "https://img.vietqr.io/image/VCB-0123456789-compact.png?amount=100000&addInfo=ORD1001&accountName=DORM%20DELI"
        );
        // QR descriptor is a response-side concern; it is not persisted
        let stored = engine.get("ORD1001").await.unwrap();
        assert!(stored.payment_url.is_none());
        assert_eq!(stored.method, PaymentMethod::Sepay);
    }

    #[tokio::test]
    async fn webhook_with_matching_note_settles_order() {
        let (rail, engine) = rail();
        rail.create_payment(&request("ORD1001", dec!(100000)))
            .await
            .unwrap();

        let ok = rail
            .handle_webhook(&claim("Thanh toan ORD1001", dec!(100000), "FT55"))
            .await;
        assert!(ok);

        let payment = engine.get("ORD1001").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.transaction_id.as_deref(), Some("FT55"));
        assert!(payment.completed_at.is_some());
    }

    #[tokio::test]
    async fn underpayment_by_smallest_unit_fails_order() {
        let (rail, engine) = rail();
        rail.create_payment(&request("ORD1002", dec!(100000)))
            .await
            .unwrap();

        let ok = rail
            .handle_webhook(&claim("ORD1002", dec!(99999.99), "FT56"))
            .await;
        assert!(!ok);

        let payment = engine.get("ORD1002").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(
            payment.error_message.as_deref(),
            Some("Insufficient amount transferred")
        );
    }

    #[tokio::test]
    async fn overpayment_is_accepted() {
        let (rail, engine) = rail();
        rail.create_payment(&request("ORD1003", dec!(100000)))
            .await
            .unwrap();

        assert!(
            rail.handle_webhook(&claim("ORD1003", dec!(150000), "FT57"))
                .await
        );
        assert_eq!(
            engine.get("ORD1003").await.unwrap().status,
            PaymentStatus::Success
        );
    }

    #[tokio::test]
    async fn duplicate_webhook_is_acknowledged_without_rewrite() {
        let (rail, engine) = rail();
        rail.create_payment(&request("ORD1004", dec!(100000)))
            .await
            .unwrap();

        assert!(
            rail.handle_webhook(&claim("ORD1004", dec!(100000), "FT58"))
                .await
        );
        // Retried delivery with a different bank reference
        assert!(
            rail.handle_webhook(&claim("ORD1004", dec!(100000), "FT58-RETRY"))
                .await
        );

        let payment = engine.get("ORD1004").await.unwrap();
        assert_eq!(payment.transaction_id.as_deref(), Some("FT58"));
    }

    #[tokio::test]
    async fn concurrent_webhook_deliveries_both_acknowledge() {
        let store = Arc::new(MemoryPaymentStore::new());
        let engine = Arc::new(ReconciliationEngine::new(store));
        let rail = Arc::new(SePayRail::new(
            test_config(),
            engine.clone(),
            Arc::new(StaticLedger(Vec::new())),
        ));
        rail.create_payment(&request("ORD1005", dec!(100000)))
            .await
            .unwrap();

        let a = {
            let rail = rail.clone();
            tokio::spawn(async move {
                rail.handle_webhook(&claim("ORD1005", dec!(100000), "FT-A"))
                    .await
            })
        };
        let b = {
            let rail = rail.clone();
            tokio::spawn(async move {
                rail.handle_webhook(&claim("ORD1005", dec!(100000), "FT-B"))
                    .await
            })
        };

        assert!(a.await.unwrap());
        assert!(b.await.unwrap());

        let payment = engine.get("ORD1005").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        // Exactly one delivery applied its reference
        let reference = payment.transaction_id.as_deref().unwrap();
        assert!(reference == "FT-A" || reference == "FT-B");
    }

    #[tokio::test]
    async fn blank_note_is_rejected_without_state_change() {
        let (rail, _) = rail();
        assert!(!rail.handle_webhook(&claim("   ", dec!(100000), "FT59")).await);
    }

    #[tokio::test]
    async fn unknown_order_is_rejected() {
        let (rail, _) = rail();
        assert!(
            !rail
                .handle_webhook(&claim("Thanh toan ORD4040", dec!(100000), "FT60"))
                .await
        );
    }

    #[tokio::test]
    async fn reconcile_pending_confirms_from_ledger() {
        let ledger = StaticLedger(vec![
            LedgerEntry {
                content: Some("unrelated transfer".to_string()),
                amount_in: dec!(999999),
                reference_number: Some("FT-X".to_string()),
            },
            LedgerEntry {
                content: Some("CK Thanh toan ORD2001".to_string()),
                amount_in: dec!(100000),
                reference_number: Some("FT61".to_string()),
            },
        ]);
        let (rail, engine) = rail_with_ledger(Arc::new(ledger));
        rail.create_payment(&request("ORD2001", dec!(100000)))
            .await
            .unwrap();

        let payment = rail.reconcile_pending("ORD2001").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.transaction_id.as_deref(), Some("FT61"));
        assert_eq!(engine.get("ORD2001").await.unwrap().status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn reconcile_pending_skips_insufficient_ledger_entry() {
        let ledger = StaticLedger(vec![LedgerEntry {
            content: Some("ORD2002".to_string()),
            amount_in: dec!(50000),
            reference_number: Some("FT62".to_string()),
        }]);
        let (rail, _) = rail_with_ledger(Arc::new(ledger));
        rail.create_payment(&request("ORD2002", dec!(100000)))
            .await
            .unwrap();

        let payment = rail.reconcile_pending("ORD2002").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn reconcile_pending_fails_open_on_ledger_error() {
        let (rail, _) = rail_with_ledger(Arc::new(UnreachableLedger));
        rail.create_payment(&request("ORD2003", dec!(100000)))
            .await
            .unwrap();

        let payment = rail.reconcile_pending("ORD2003").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn reconcile_of_settled_order_is_a_pure_read() {
        let (rail, engine) = rail();
        rail.create_payment(&request("ORD2004", dec!(100000)))
            .await
            .unwrap();
        engine.transition_to_success("ORD2004", "FT63").await.unwrap();

        let payment = rail.reconcile_pending("ORD2004").await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.transaction_id.as_deref(), Some("FT63"));
    }

    #[tokio::test]
    async fn manual_confirm_synthesises_reference() {
        let (rail, engine) = rail();
        rail.create_payment(&request("ORD2005", dec!(100000)))
            .await
            .unwrap();

        let payment = rail.manual_confirm("ORD2005", None).await.unwrap();
        assert!(payment
            .transaction_id
            .as_deref()
            .unwrap()
            .starts_with("MANUAL_"));

        // A second confirm keeps the first reference
        let again = rail.manual_confirm("ORD2005", Some("FT64")).await.unwrap();
        assert_eq!(again.transaction_id, payment.transaction_id);
        assert_eq!(engine.get("ORD2005").await.unwrap().status, PaymentStatus::Success);
    }
}
