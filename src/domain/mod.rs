//! Domain model of the reconciliation engine: violations, payment attempts,
//! fine assessment and the ports through which records are persisted.

pub mod fine;
pub mod money;
pub mod payment;
pub mod ports;
pub mod reference;
pub mod violation;
