//! Payment entity and status types
//!
//! The single durable record this service manages. A payment is created in
//! `Pending` state by one of the rails and only ever moves to `Success` or
//! `Failed`, both of which are terminal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Payment rail the order was created on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    /// Gateway redirect with a signed return callback
    Vnpay,
    /// Bank transfer confirmed by webhook or ledger poll
    Sepay,
}

/// Payment lifecycle status
///
/// `Success` and `Failed` are terminal. No code path may move a payment out
/// of a terminal status; repeated attempts to apply the same terminal status
/// are acknowledged without re-applying the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

#[derive(Debug, Clone, Error)]
#[error("invalid value: {0}")]
pub struct ParseError(String);

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Vnpay => write!(f, "vnpay"),
            PaymentMethod::Sepay => write!(f, "sepay"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vnpay" => Ok(Self::Vnpay),
            "sepay" => Ok(Self::Sepay),
            other => Err(ParseError(format!("unknown payment method: {}", other))),
        }
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Success => write!(f, "success"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(ParseError(format!("unknown payment status: {}", other))),
        }
    }
}

impl TryFrom<String> for PaymentStatus {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Payment record
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Store-assigned, immutable once set
    pub id: String,
    /// Externally supplied correlation key; unique among non-failed payments
    pub order_id: String,
    /// Rail-assigned proof-of-payment reference, absent until settled
    pub transaction_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub method: PaymentMethod,
    #[sqlx(try_from = "String")]
    pub status: PaymentStatus,
    /// Amount owed, fixed at creation
    pub amount: Decimal,
    pub order_info: String,
    pub user_id: Option<String>,
    pub extra_data: Option<String>,
    /// Set only for the redirect rail, after the signed URL is built
    pub payment_url: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stamped exactly once, on the first transition to `Success`
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields a rail supplies when opening a payment; everything else is
/// store-assigned at insert time.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: String,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub order_info: String,
    pub user_id: Option<String>,
    pub extra_data: Option<String>,
}
