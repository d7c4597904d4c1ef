#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use finerecon::application::engine::{InitiateRequest, ReconciliationEngine};
use finerecon::application::resolver::ResolutionHints;
use finerecon::config::EngineConfig;
use finerecon::domain::money::Money;
use finerecon::domain::payment::{Payer, Payment, PaymentId, PaymentStatus};
use finerecon::domain::ports::{FixedClock, PaymentStore, SettlementStore, ViolationStore};
use finerecon::domain::violation::{Violation, ViolationId};
use finerecon::error::Result;
use finerecon::gateway::{Gateway, GatewayKind, GatewayRegistry, SandboxBehavior, SandboxGateway};
use finerecon::infrastructure::in_memory::InMemoryStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-06-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn violation(reference: &str, base: Decimal, deadline_offset: Duration) -> Violation {
    let issued = now() - Duration::days(45);
    Violation::new(
        reference,
        "Ada Driver",
        Money::new(base),
        issued + Duration::days(30),
        now() + deadline_offset,
        issued,
    )
}

pub fn payer() -> Payer {
    Payer {
        name: "Ada Driver".to_string(),
        email: "ada@example.com".to_string(),
        phone: Some("+31 6 0000 0000".to_string()),
    }
}

pub fn by_reference(reference: &str) -> InitiateRequest {
    InitiateRequest {
        hints: ResolutionHints {
            reference: Some(reference.to_string()),
            ..Default::default()
        },
        payer: payer(),
        gateway: GatewayKind::Sandbox,
        claimed_amount: None,
    }
}

pub fn registry(gateway: SandboxGateway) -> GatewayRegistry {
    GatewayRegistry::new(EngineConfig::default().gateway_timeout).with(Gateway::Sandbox(gateway))
}

pub fn engine<S>(store: S, behavior: SandboxBehavior) -> ReconciliationEngine
where
    S: ViolationStore + PaymentStore + SettlementStore + 'static,
{
    engine_with(store, registry(SandboxGateway::new(behavior)))
}

pub fn engine_with<S>(store: S, gateways: GatewayRegistry) -> ReconciliationEngine
where
    S: ViolationStore + PaymentStore + SettlementStore + 'static,
{
    ReconciliationEngine::new(Arc::new(store), gateways, EngineConfig::default())
        .with_clock(Arc::new(FixedClock(now())))
}

/// Wraps a store and counts every write that reaches it.
#[derive(Clone, Default)]
pub struct CountingStore {
    pub inner: InMemoryStore,
    writes: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ViolationStore for CountingStore {
    async fn insert_violation(&self, violation: Violation) -> Result<()> {
        self.record_write();
        self.inner.insert_violation(violation).await
    }

    async fn get_violation(&self, id: ViolationId) -> Result<Option<Violation>> {
        self.inner.get_violation(id).await
    }

    async fn find_violation_by_reference(&self, reference: &str) -> Result<Option<Violation>> {
        self.inner.find_violation_by_reference(reference).await
    }

    async fn find_open_violations_by_driver(&self, driver_name: &str) -> Result<Vec<Violation>> {
        self.inner.find_open_violations_by_driver(driver_name).await
    }

    async fn update_violation(&self, violation: Violation) -> Result<Violation> {
        self.record_write();
        self.inner.update_violation(violation).await
    }
}

#[async_trait]
impl PaymentStore for CountingStore {
    async fn create_payment(&self, payment: Payment) -> Result<()> {
        self.record_write();
        self.inner.create_payment(payment).await
    }

    async fn update_payment(&self, payment: Payment, expected: PaymentStatus) -> Result<()> {
        self.record_write();
        self.inner.update_payment(payment, expected).await
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.inner.get_payment(id).await
    }
}

#[async_trait]
impl SettlementStore for CountingStore {
    async fn commit_settlement(&self, payment: Payment, violation: Violation) -> Result<Violation> {
        self.record_write();
        self.inner.commit_settlement(payment, violation).await
    }
}
