//! HTTP boundary
//!
//! Thin axum handlers over the rails and the reconciliation engine. Request
//! parsing and validation happen here; all reconciliation decisions happen
//! below this layer.

pub mod health;
pub mod payments;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::config::Config;
use crate::engine::ReconciliationEngine;
use crate::payments::{SePayRail, VnPayRail};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: Arc<ReconciliationEngine>,
    pub vnpay: Arc<VnPayRail>,
    pub sepay: Arc<SePayRail>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/payment/create", post(payments::create_sepay_payment))
        .route("/payment/webhook", post(payments::sepay_webhook))
        .route("/payment/status/:order_id", get(payments::payment_status))
        .route("/payment/confirm/:order_id", post(payments::confirm_payment))
        .route("/payment/vnpay/create", post(payments::create_vnpay_payment))
        .route("/payment/vnpay/return", get(payments::vnpay_return))
        .route("/payment/vnpay/ipn", get(payments::vnpay_ipn))
}
