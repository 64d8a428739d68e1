//! Payment rail integrations
//!
//! Two rails feed the reconciliation engine: the VNPay gateway (signed
//! checkout URL plus a signed return callback) and SePay bank transfers
//! (unauthenticated webhook correlated by transfer note, with a pull-based
//! ledger poll as fallback). Both request status transitions exclusively
//! through [`crate::engine::ReconciliationEngine`].

pub mod ledger;
pub mod order_ref;
pub mod rails;
pub mod signature;
pub mod types;

pub use rails::sepay::SePayRail;
pub use rails::vnpay::VnPayRail;
