//! Rail implementations
//!
//! Concrete integrations driving the reconciliation engine.

pub mod sepay;
pub mod vnpay;
