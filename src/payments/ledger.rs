//! Bank ledger query client
//!
//! Pull-side counterpart to the SePay webhook: fetches the most recent
//! inbound transfers from the provider's transaction-list API so that a
//! still-pending order can be reconciled on demand. The query is advisory;
//! callers treat any failure here as non-fatal and leave the order pending,
//! since the webhook remains the authoritative push path.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::SePayConfig;

/// One inbound ledger entry, reduced to the fields reconciliation needs
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Free-text transfer note
    pub content: Option<String>,
    /// Amount credited to the account
    pub amount_in: Decimal,
    /// Bank-assigned transfer reference
    pub reference_number: Option<String>,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ledger API returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Source of recent bank-ledger entries
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    async fn list_recent_transactions(&self, limit: u32) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// SePay user-API client, authenticated with a bearer key
pub struct SePayLedger {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl SePayLedger {
    pub fn new(config: &SePayConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }
}

#[async_trait]
impl TransactionLedger for SePayLedger {
    async fn list_recent_transactions(&self, limit: u32) -> Result<Vec<LedgerEntry>, LedgerError> {
        let url = format!("{}/userapi/transactions/list", self.endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Status(status));
        }

        let body: TransactionListResponse = response.json().await?;
        info!(
            "Fetched {} recent ledger transactions",
            body.transactions.len()
        );

        Ok(body
            .transactions
            .into_iter()
            .map(|t| LedgerEntry {
                content: t.transaction_content,
                amount_in: t.amount_in.unwrap_or_default(),
                reference_number: t.reference_number,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct TransactionListResponse {
    #[serde(default)]
    transactions: Vec<ApiTransaction>,
}

#[derive(Debug, Deserialize)]
struct ApiTransaction {
    transaction_content: Option<String>,
    amount_in: Option<Decimal>,
    reference_number: Option<String>,
}
