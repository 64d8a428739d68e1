//! Payment endpoints
//!
//! Response bodies mirror what the rails report; webhook and callback
//! endpoints answer in the shapes the respective provider expects.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

use crate::api::AppState;
use crate::engine::PaymentError;
use crate::payments::types::{CreatePaymentRequest, PaymentResponse, TransferNotification};
use crate::store::Payment;

/// POST /payment/create: open a bank-transfer payment
pub async fn create_sepay_payment(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Json<PaymentResponse> {
    if let Err(message) = request.validate() {
        return Json(PaymentResponse::failed(message));
    }

    match state.sepay.create_payment(&request).await {
        Ok(response) => Json(response),
        Err(PaymentError::DuplicateOrder(_)) => {
            Json(PaymentResponse::failed("Order ID already exists"))
        }
        Err(e) => Json(PaymentResponse::failed(format!("Error: {}", e))),
    }
}

/// POST /payment/webhook: SePay transfer notification
pub async fn sepay_webhook(
    State(state): State<AppState>,
    Json(claim): Json<TransferNotification>,
) -> (StatusCode, Json<Value>) {
    if state.sepay.handle_webhook(&claim).await {
        (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "Payment processed successfully",
            })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": "Failed to process payment",
            })),
        )
    }
}

#[derive(Deserialize)]
pub struct StatusQuery {
    /// Run the ledger reconciliation poll before answering
    #[serde(default)]
    pub reconcile: bool,
}

/// GET /payment/status/:order_id: read payment state
///
/// The read itself never touches the network; `?reconcile=true` explicitly
/// runs the pull-based ledger check first.
pub async fn payment_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Payment>, StatusCode> {
    info!(
        "Getting payment status for order: {} (reconcile: {})",
        order_id, query.reconcile
    );

    let result = if query.reconcile {
        state.sepay.reconcile_pending(&order_id).await
    } else {
        state.engine.get(&order_id).await
    };

    match result {
        Ok(payment) => Ok(Json(payment)),
        Err(PaymentError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Deserialize)]
pub struct ConfirmQuery {
    pub transaction_id: Option<String>,
}

/// POST /payment/confirm/:order_id: manual confirmation
pub async fn confirm_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> (StatusCode, Json<Value>) {
    match state
        .sepay
        .manual_confirm(&order_id, query.transaction_id.as_deref())
        .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "Payment confirmed successfully",
            })),
        ),
        Err(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": "Payment not found or already completed",
            })),
        ),
    }
}

/// POST /payment/vnpay/create: open a gateway payment
pub async fn create_vnpay_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePaymentRequest>,
) -> Json<PaymentResponse> {
    if let Err(message) = request.validate() {
        return Json(PaymentResponse::failed(message));
    }

    let client_ip = client_ip_from_headers(&headers);
    match state.vnpay.create_payment(&request, &client_ip).await {
        Ok(response) => Json(response),
        Err(PaymentError::DuplicateOrder(_)) => {
            Json(PaymentResponse::failed("Order ID already exists"))
        }
        Err(e) => Json(PaymentResponse::failed(format!("Error: {}", e))),
    }
}

/// GET /payment/vnpay/return: browser return from the gateway
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    info!("Received VNPay return callback");

    let handled = state.vnpay.handle_callback(&params).await;
    let order_id = params.get("vnp_TxnRef").cloned();
    let response_code = params.get("vnp_ResponseCode").cloned();
    let success = handled && response_code.as_deref() == Some("00");

    let body = json!({
        "orderId": order_id,
        "success": success,
        "responseCode": response_code,
        "message": if success {
            "Payment successful"
        } else {
            "Payment failed or invalid signature"
        },
    });

    if success {
        (StatusCode::OK, Json(body))
    } else {
        (StatusCode::BAD_REQUEST, Json(body))
    }
}

/// GET /payment/vnpay/ipn: server-to-server notification; the gateway
/// expects its own acknowledgment shape and always a 200.
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    info!("Received VNPay IPN callback");

    let handled = state.vnpay.handle_callback(&params).await;
    let success = handled && params.get("vnp_ResponseCode").map(String::as_str) == Some("00");

    if success {
        Json(json!({"RspCode": "00", "Message": "Confirm Success"}))
    } else {
        Json(json!({"RspCode": "99", "Message": "Confirm Fail"}))
    }
}

/// First client address on the forwarding path, falling back to loopback
/// when no proxy header is present.
fn client_ip_from_headers(headers: &HeaderMap) -> String {
    for name in ["x-forwarded-for", "x-real-ip"] {
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        // A proxy may pass a comma-separated chain; the first hop is the client
        let value = value.split(',').next().unwrap_or("").trim();
        if !value.is_empty() && !value.eq_ignore_ascii_case("unknown") {
            return value.to_string();
        }
    }
    "127.0.0.1".to_string()
}
