//! Payment request and response types
//!
//! Common shapes shared by both rails and the HTTP boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::PaymentStatus;

/// Request to open a payment for an order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    /// Unique order reference; also the transfer-note correlation key
    pub order_id: String,
    /// Amount owed in VND
    pub amount: Decimal,
    pub order_info: String,
    pub user_id: Option<String>,
    /// Opaque passthrough for the caller
    pub extra_data: Option<String>,
}

impl CreatePaymentRequest {
    /// Boundary validation, mirrored into a failed-status response body
    pub fn validate(&self) -> Result<(), String> {
        if self.order_id.trim().is_empty() {
            return Err("Order ID is required".to_string());
        }
        if self.amount <= Decimal::ZERO {
            return Err("Amount must be positive".to_string());
        }
        if self.order_info.trim().is_empty() {
            return Err("Order info is required".to_string());
        }
        Ok(())
    }
}

/// Response returned by either rail's create-payment operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub order_id: Option<String>,
    pub transaction_id: Option<String>,
    /// Checkout URL (gateway rail) or QR image URL (bank transfer rail)
    pub payment_url: Option<String>,
    pub status: PaymentStatus,
    pub amount: Option<Decimal>,
    pub message: String,
}

impl PaymentResponse {
    pub fn pending(
        order_id: &str,
        payment_url: String,
        amount: Decimal,
        message: &str,
    ) -> Self {
        Self {
            order_id: Some(order_id.to_string()),
            transaction_id: None,
            payment_url: Some(payment_url),
            status: PaymentStatus::Pending,
            amount: Some(amount),
            message: message.to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            order_id: None,
            transaction_id: None,
            payment_url: None,
            status: PaymentStatus::Failed,
            amount: None,
            message: message.into(),
        }
    }
}

/// SePay webhook claim, as posted by the provider (snake_case on the wire).
///
/// Nothing in this payload is cryptographically authenticated; it is trusted
/// only after note correlation and amount verification succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferNotification {
    pub id: Option<i64>,
    pub transaction_date: Option<String>,
    pub account_number: Option<String>,
    pub code: Option<String>,
    /// Free-text transfer note carrying the order reference
    pub content: Option<String>,
    pub transfer_amount: Decimal,
    pub reference_number: Option<String>,
    pub body: Option<String>,
    pub gate_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(amount: Decimal) -> CreatePaymentRequest {
        CreatePaymentRequest {
            order_id: "ORD1".to_string(),
            amount,
            order_info: "order".to_string(),
            user_id: None,
            extra_data: None,
        }
    }

    #[test]
    fn positive_amount_is_required() {
        assert!(request(dec!(1000)).validate().is_ok());
        assert!(request(Decimal::ZERO).validate().is_err());
        assert!(request(dec!(-5)).validate().is_err());
    }

    #[test]
    fn blank_order_id_is_rejected() {
        let mut req = request(dec!(1000));
        req.order_id = "  ".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn webhook_claim_deserializes_from_provider_payload() {
        let claim: TransferNotification = serde_json::from_str(
            r#"{
                "id": 92704,
                "gateway": "Vietcombank",
                "transaction_date": "2024-05-25 21:11:02",
                "account_number": "0123499999",
                "code": null,
                "content": "Thanh toan ORD1001",
                "transfer_amount": 100000,
                "reference_number": "FT55",
                "body": null,
                "gate_name": "VCB"
            }"#,
        )
        .unwrap();
        assert_eq!(claim.content.as_deref(), Some("Thanh toan ORD1001"));
        assert_eq!(claim.transfer_amount, dec!(100000));
        assert_eq!(claim.reference_number.as_deref(), Some("FT55"));
    }
}
