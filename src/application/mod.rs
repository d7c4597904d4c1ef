//! Application layer containing the reconciliation orchestration.
//!
//! `ReconciliationEngine` is the entry point for the two public operations,
//! `initiate` and `confirm`. It resolves the referenced violation through the
//! `IdentifierResolver`, assesses the fine, and drives the payment through its
//! gateway and state machine.

pub mod engine;
pub mod resolver;
