use super::checks::{check_payment_status, check_settlement, check_version};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{PaymentStore, SettlementStore, ViolationStore};
use crate::domain::violation::{Violation, ViolationId};
use crate::error::{ReconError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    violations: HashMap<ViolationId, Violation>,
    references: HashMap<String, ViolationId>,
    payments: HashMap<PaymentId, Payment>,
}

/// A thread-safe in-memory store for violations and payments.
///
/// All tables sit behind a single `RwLock`, so a settlement commit holds one
/// write guard across both records. Clones share the same tables.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn reference_key(reference: &str) -> String {
    reference.trim().to_ascii_uppercase()
}

#[async_trait]
impl ViolationStore for InMemoryStore {
    async fn insert_violation(&self, violation: Violation) -> Result<()> {
        let mut tables = self.tables.write().await;
        let key = reference_key(&violation.reference);
        if tables.violations.contains_key(&violation.id) || tables.references.contains_key(&key) {
            return Err(ReconError::ValidationError(format!(
                "violation {} already exists",
                violation.reference
            )));
        }
        tables.references.insert(key, violation.id);
        tables.violations.insert(violation.id, violation);
        Ok(())
    }

    async fn get_violation(&self, id: ViolationId) -> Result<Option<Violation>> {
        let tables = self.tables.read().await;
        Ok(tables.violations.get(&id).cloned())
    }

    async fn find_violation_by_reference(&self, reference: &str) -> Result<Option<Violation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .references
            .get(&reference_key(reference))
            .and_then(|id| tables.violations.get(id))
            .cloned())
    }

    async fn find_open_violations_by_driver(&self, driver_name: &str) -> Result<Vec<Violation>> {
        let tables = self.tables.read().await;
        let wanted = driver_name.trim();
        Ok(tables
            .violations
            .values()
            .filter(|v| v.status.is_open() && v.driver_name.trim().eq_ignore_ascii_case(wanted))
            .cloned()
            .collect())
    }

    async fn update_violation(&self, mut violation: Violation) -> Result<Violation> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .violations
            .get(&violation.id)
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("violation_id={}", violation.id),
            })?;
        check_version(stored, &violation)?;

        violation.version += 1;
        tables.violations.insert(violation.id, violation.clone());
        Ok(violation)
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn create_payment(&self, payment: Payment) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.payments.contains_key(&payment.id) {
            return Err(ReconError::ValidationError(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        tables.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn update_payment(&self, payment: Payment, expected: PaymentStatus) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.payments.get_mut(&payment.id) {
            Some(stored) => {
                check_payment_status(stored, expected)?;
                *stored = payment;
                Ok(())
            }
            None => Err(ReconError::NotFound {
                attempted: format!("payment_id={}", payment.id),
            }),
        }
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(&id).cloned())
    }
}

#[async_trait]
impl SettlementStore for InMemoryStore {
    async fn commit_settlement(&self, payment: Payment, mut violation: Violation) -> Result<Violation> {
        let mut tables = self.tables.write().await;
        let stored_violation = tables
            .violations
            .get(&violation.id)
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("violation_id={}", violation.id),
            })?;
        let stored_payment = tables
            .payments
            .get(&payment.id)
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("payment_id={}", payment.id),
            })?;
        check_settlement(stored_violation, stored_payment, &payment, &violation)?;

        violation.version += 1;
        tables.violations.insert(violation.id, violation.clone());
        tables.payments.insert(payment.id, payment);
        Ok(violation)
    }
}
