//! VNPay gateway rail
//!
//! Redirect-based payments: we build a signed checkout URL, the payer
//! completes payment on the gateway's page, and the gateway calls back with
//! the outcome and an HMAC over the callback parameters. The callback is the
//! only trusted input on this rail; an invalid signature is rejected before
//! any persisted state is touched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::VnPayConfig;
use crate::engine::{PaymentError, ReconciliationEngine};
use crate::payments::signature;
use crate::payments::types::{CreatePaymentRequest, PaymentResponse};
use crate::store::{NewPayment, PaymentMethod};

/// Callback signature field, stripped before verification
const SECURE_HASH_FIELD: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";

/// Gateway response code for a settled payment
const RESPONSE_CODE_SUCCESS: &str = "00";

/// Checkout link validity window, enforced server-side by the gateway
const EXPIRY_MINUTES: i64 = 15;

pub struct VnPayRail {
    config: VnPayConfig,
    engine: Arc<ReconciliationEngine>,
}

impl VnPayRail {
    pub fn new(config: VnPayConfig, engine: Arc<ReconciliationEngine>) -> Self {
        Self { config, engine }
    }

    /// Open a pending payment and build the signed checkout URL for it.
    pub async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
        client_ip: &str,
    ) -> Result<PaymentResponse, PaymentError> {
        info!("Creating VNPay payment for order: {}", request.order_id);

        let payment = self
            .engine
            .create_payment(NewPayment {
                order_id: request.order_id.clone(),
                method: PaymentMethod::Vnpay,
                amount: request.amount,
                order_info: request.order_info.clone(),
                user_id: request.user_id.clone(),
                extra_data: request.extra_data.clone(),
            })
            .await?;

        let payment_url = self.build_payment_url(request, client_ip);
        self.engine
            .attach_payment_url(&payment.order_id, &payment_url)
            .await?;

        Ok(PaymentResponse::pending(
            &request.order_id,
            payment_url,
            request.amount,
            "VNPay payment URL created successfully",
        ))
    }

    /// Assemble, canonicalize and sign the checkout request.
    ///
    /// The gateway validates the expiry timestamp in Vietnam local time, so
    /// both timestamps are rendered in UTC+7 (Indochina Time observes no
    /// daylight saving).
    fn build_payment_url(&self, request: &CreatePaymentRequest, client_ip: &str) -> String {
        let mut params: HashMap<String, String> = HashMap::new();

        params.insert("vnp_Version".to_string(), self.config.version.clone());
        params.insert("vnp_Command".to_string(), self.config.command.clone());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        // Amount is sent in minor units: x100, truncated
        params.insert(
            "vnp_Amount".to_string(),
            (request.amount * Decimal::from(100)).trunc().to_string(),
        );
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert("vnp_TxnRef".to_string(), request.order_id.clone());
        params.insert("vnp_OrderInfo".to_string(), request.order_info.clone());
        params.insert("vnp_OrderType".to_string(), self.config.order_type.clone());
        params.insert("vnp_Locale".to_string(), "vn".to_string());
        params.insert("vnp_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert("vnp_IpAddr".to_string(), client_ip.to_string());

        let ict = FixedOffset::east_opt(7 * 3600).expect("valid UTC+7 offset");
        let now = Utc::now().with_timezone(&ict);
        params.insert(
            "vnp_CreateDate".to_string(),
            now.format("%Y%m%d%H%M%S").to_string(),
        );
        params.insert(
            "vnp_ExpireDate".to_string(),
            (now + Duration::minutes(EXPIRY_MINUTES))
                .format("%Y%m%d%H%M%S")
                .to_string(),
        );

        let query = signature::canonicalize(&params);
        let secure_hash = signature::sign(&self.config.hash_secret, &query);

        format!(
            "{}?{}&{}={}",
            self.config.pay_url, query, SECURE_HASH_FIELD, secure_hash
        )
    }

    /// Process a gateway callback (return URL or IPN; both carry the same
    /// parameter set).
    ///
    /// Returns `true` once the requested transition has been applied or was
    /// already in effect; `false` for an invalid signature, an unknown
    /// order, or a transition the state machine refuses. Nothing is
    /// persisted unless the signature verifies.
    pub async fn handle_callback(&self, params: &HashMap<String, String>) -> bool {
        let Some(provided_hash) = params.get(SECURE_HASH_FIELD) else {
            warn!("VNPay callback without a secure hash");
            return false;
        };

        let mut signed_fields = params.clone();
        signed_fields.remove(SECURE_HASH_FIELD);
        signed_fields.remove(SECURE_HASH_TYPE_FIELD);

        if !signature::verify(&self.config.hash_secret, &signed_fields, provided_hash) {
            error!("Invalid VNPay signature");
            return false;
        }

        let Some(order_id) = params.get("vnp_TxnRef") else {
            warn!("VNPay callback without an order reference");
            return false;
        };
        let response_code = params
            .get("vnp_ResponseCode")
            .map(String::as_str)
            .unwrap_or_default();

        let result = if response_code == RESPONSE_CODE_SUCCESS {
            let transaction_id = params
                .get("vnp_TransactionNo")
                .map(String::as_str)
                .unwrap_or_default();
            self.engine
                .transition_to_success(order_id, transaction_id)
                .await
        } else {
            self.engine
                .transition_to_failure(
                    order_id,
                    &format!("VNPay response code: {}", response_code),
                )
                .await
        };

        match result {
            Ok(payment) => {
                info!(
                    "VNPay callback for order {} acknowledged with status {}",
                    order_id, payment.status
                );
                true
            }
            Err(PaymentError::NotFound(_)) => {
                error!("Payment not found for order: {}", order_id);
                false
            }
            Err(e) => {
                error!("Error handling VNPay callback for order {}: {}", order_id, e);
                false
            }
        }
    }
}
