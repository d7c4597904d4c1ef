use super::money::Money;
use super::violation::{Violation, ViolationId};
use crate::error::ReconError;
use crate::gateway::GatewayKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a single payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub Uuid);

impl PaymentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a payment attempt.
///
/// ```text
/// pending -> processing -> completed -> refunded
///                       \-> failed
///                       \-> cancelled
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
                | (Completed, Refunded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Payer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Receipt handed back once a payment completes.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Receipt {
    pub receipt_number: String,
    pub download_locator: String,
}

/// One attempt to settle a violation's fine.
///
/// `amount` is a snapshot taken at creation and never changes afterwards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub violation_id: ViolationId,
    pub violation_reference: String,
    pub payer: Payer,
    amount: Money,
    pub currency: String,
    pub gateway: GatewayKind,
    pub status: PaymentStatus,
    pub gateway_transaction_id: Option<String>,
    pub gateway_reference: Option<String>,
    pub redirect_url: Option<String>,
    pub provider_response: Option<serde_json::Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub receipt: Option<Receipt>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn new(
        violation: &Violation,
        payer: Payer,
        amount: Money,
        currency: impl Into<String>,
        gateway: GatewayKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::generate(),
            violation_id: violation.id,
            violation_reference: violation.reference.clone(),
            payer,
            amount,
            currency: currency.into(),
            gateway,
            status: PaymentStatus::Pending,
            gateway_transaction_id: None,
            gateway_reference: None,
            redirect_url: None,
            provider_response: None,
            error_code: None,
            error_message: None,
            receipt: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    fn transition(&mut self, next: PaymentStatus, now: DateTime<Utc>) -> Result<(), ReconError> {
        if !self.status.can_transition_to(next) {
            return Err(ReconError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Entered immediately before the gateway is contacted.
    pub fn begin_processing(&mut self, now: DateTime<Utc>) -> Result<(), ReconError> {
        self.transition(PaymentStatus::Processing, now)
    }

    /// Records what the gateway assigned when it accepted the attempt.
    pub fn record_acceptance(
        &mut self,
        transaction_id: String,
        reference: Option<String>,
        redirect_url: Option<String>,
        provider_response: serde_json::Value,
    ) {
        self.gateway_transaction_id = Some(transaction_id);
        self.gateway_reference = reference;
        self.redirect_url = redirect_url;
        self.provider_response = Some(provider_response);
    }

    pub fn complete(&mut self, receipt: Receipt, now: DateTime<Utc>) -> Result<(), ReconError> {
        self.transition(PaymentStatus::Completed, now)?;
        self.receipt = Some(receipt);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(
        &mut self,
        code: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ReconError> {
        self.transition(PaymentStatus::Failed, now)?;
        self.error_code = Some(code.into());
        self.error_message = Some(message.into());
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), ReconError> {
        self.transition(PaymentStatus::Cancelled, now)
    }

    /// Administrative reversal of a completed payment.
    pub fn refund(&mut self, now: DateTime<Utc>) -> Result<(), ReconError> {
        self.transition(PaymentStatus::Refunded, now)
    }
}
