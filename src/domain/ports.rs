use super::payment::{Payment, PaymentId, PaymentStatus};
use super::violation::{Violation, ViolationId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Repository access to violation records.
#[async_trait]
pub trait ViolationStore: Send + Sync {
    /// Adds a new record. Fails if the id or reference number is already taken.
    async fn insert_violation(&self, violation: Violation) -> Result<()>;
    async fn get_violation(&self, id: ViolationId) -> Result<Option<Violation>>;
    async fn find_violation_by_reference(&self, reference: &str) -> Result<Option<Violation>>;
    /// Violations for `driver_name` (case-insensitive) that still owe their fine.
    async fn find_open_violations_by_driver(&self, driver_name: &str) -> Result<Vec<Violation>>;
    /// Writes `violation` if the stored version still equals `violation.version`,
    /// returning the record with its bumped version. A stale version is `Conflict`.
    async fn update_violation(&self, violation: Violation) -> Result<Violation>;
}

/// Repository access to payment attempts.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_payment(&self, payment: Payment) -> Result<()>;
    /// Replaces the stored attempt only while its status is still `expected`;
    /// otherwise nothing is written and `Conflict` is returned.
    async fn update_payment(&self, payment: Payment, expected: PaymentStatus) -> Result<()>;
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;
}

/// The single transactional boundary of the engine.
#[async_trait]
pub trait SettlementStore: Send + Sync {
    /// Persists a `completed` payment together with its `paid` violation as one
    /// atomic unit.
    ///
    /// Under the store's write guard the stored violation is re-checked: if it is
    /// already `paid` the commit aborts with `InvariantViolation`, if its version
    /// moved it aborts with `Conflict`. The stored payment must still be
    /// `processing`. Nothing is written on failure.
    async fn commit_settlement(&self, payment: Payment, violation: Violation) -> Result<Violation>;
}

pub trait ReconciliationStore: ViolationStore + PaymentStore + SettlementStore {}

impl<T: ViolationStore + PaymentStore + SettlementStore> ReconciliationStore for T {}

pub type StoreHandle = Arc<dyn ReconciliationStore>;

/// Source of the current instant, injectable for deadline-sensitive tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
