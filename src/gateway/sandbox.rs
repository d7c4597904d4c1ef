use super::{CreatedPayment, GatewayKind, GatewayStatus, PaymentGateway, PaymentOrder, VerifiedPayment};
use crate::domain::money::Money;
use crate::error::GatewayError;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Scripted outcome of the in-process demo provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxBehavior {
    /// Create settles synchronously.
    SettleImmediately,
    /// Create returns a redirect; verify settles.
    Redirect,
    /// Create returns a redirect; verify reports failure.
    DeclineOnVerify,
    /// Create is rejected by the provider.
    RejectOnCreate,
    /// The provider cannot be reached.
    Unreachable,
}

impl SandboxBehavior {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SETTLE" | "ALWAYS_SUCCESS" => Some(SandboxBehavior::SettleImmediately),
            "REDIRECT" => Some(SandboxBehavior::Redirect),
            "DECLINE" | "DECLINE_ON_VERIFY" => Some(SandboxBehavior::DeclineOnVerify),
            "REJECT" | "ALWAYS_FAILURE" => Some(SandboxBehavior::RejectOnCreate),
            "UNREACHABLE" | "ALWAYS_TIMEOUT" => Some(SandboxBehavior::Unreachable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct SandboxTransaction {
    amount: Money,
}

/// Demo provider that never leaves the process.
///
/// Accepted transactions are remembered so `verify_payment` can report the
/// amount it was created with.
#[derive(Clone)]
pub struct SandboxGateway {
    behavior: SandboxBehavior,
    latency: Option<Duration>,
    transactions: Arc<Mutex<HashMap<String, SandboxTransaction>>>,
}

impl SandboxGateway {
    pub fn new(behavior: SandboxBehavior) -> Self {
        Self {
            behavior,
            latency: None,
            transactions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Delays every response, to exercise caller timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Sandbox
    }

    async fn create_payment(&self, order: &PaymentOrder) -> Result<CreatedPayment, GatewayError> {
        self.simulate_latency().await;

        match self.behavior {
            SandboxBehavior::Unreachable => {
                return Err(GatewayError::Unreachable {
                    detail: "sandbox: connection refused".to_string(),
                });
            }
            SandboxBehavior::RejectOnCreate => {
                return Err(GatewayError::Rejected {
                    code: "SANDBOX_DECLINED".to_string(),
                    detail: format!("sandbox declined order {}", order.payment_id),
                });
            }
            _ => {}
        }

        let transaction_id = format!("sbx_{}", Uuid::new_v4().simple());
        self.transactions.lock().await.insert(
            transaction_id.clone(),
            SandboxTransaction {
                amount: order.amount,
            },
        );

        let (status, redirect_url) = match self.behavior {
            SandboxBehavior::SettleImmediately => (GatewayStatus::Settled, None),
            _ => (
                GatewayStatus::Pending,
                Some(format!("/sandbox/checkout/{transaction_id}")),
            ),
        };

        Ok(CreatedPayment {
            reference: Some(format!("SBX-{}", order.payment_id.0.simple())),
            provider_response: json!({
                "id": transaction_id,
                "status": status,
                "amount": order.amount,
                "currency": order.currency,
            }),
            transaction_id,
            status,
            redirect_url,
        })
    }

    async fn verify_payment(&self, transaction_id: &str) -> Result<VerifiedPayment, GatewayError> {
        self.simulate_latency().await;

        if self.behavior == SandboxBehavior::Unreachable {
            return Err(GatewayError::Unreachable {
                detail: "sandbox: connection refused".to_string(),
            });
        }

        let transactions = self.transactions.lock().await;
        let tx = transactions
            .get(transaction_id)
            .ok_or_else(|| GatewayError::Rejected {
                code: "UNKNOWN_TRANSACTION".to_string(),
                detail: format!("sandbox has no transaction {transaction_id}"),
            })?;

        let status = match self.behavior {
            SandboxBehavior::DeclineOnVerify => GatewayStatus::Failed,
            _ => GatewayStatus::Settled,
        };

        Ok(VerifiedPayment {
            status,
            amount: tx.amount,
            provider_response: json!({
                "id": transaction_id,
                "status": status,
                "amount": tx.amount,
            }),
        })
    }
}
