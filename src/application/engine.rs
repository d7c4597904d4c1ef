use super::resolver::{IdentifierResolver, ResolutionHints};
use crate::config::EngineConfig;
use crate::domain::fine;
use crate::domain::money::Money;
use crate::domain::payment::{Payer, Payment, PaymentId, PaymentStatus, Receipt};
use crate::domain::ports::{
    Clock, PaymentStore, SettlementStore, StoreHandle, SystemClock, ViolationStore,
};
use crate::domain::violation::Violation;
use crate::error::{GatewayError, ReconError, Result};
use crate::gateway::{GatewayKind, GatewayRegistry, GatewayStatus, PaymentOrder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Inbound `initiate` call, already authenticated by the caller.
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub hints: ResolutionHints,
    pub payer: Payer,
    pub gateway: GatewayKind,
    /// Amount the client believes it owes. Logged on discrepancy, never charged.
    pub claimed_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiateOutcome {
    pub payment: Payment,
    pub violation: Violation,
    pub redirect_url: Option<String>,
    pub gateway_transaction_id: Option<String>,
    /// Present when the gateway settled synchronously.
    pub receipt: Option<Receipt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
    pub payment: Payment,
    pub violation: Violation,
    pub receipt: Receipt,
}

/// Reconciles violation payments: resolve, assess, charge, settle.
///
/// Each call is an independent unit of work. The engine keeps no per-request
/// state of its own; consistency between a payment and its violation is
/// delegated to the store's atomic settlement commit.
pub struct ReconciliationEngine {
    store: StoreHandle,
    gateways: GatewayRegistry,
    resolver: IdentifierResolver,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Creates a new `ReconciliationEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - Repository for violations and payments.
    /// * `gateways` - Provider adapters resolved at startup.
    /// * `config` - Currency, penalty policy and receipt settings.
    pub fn new(store: StoreHandle, gateways: GatewayRegistry, config: EngineConfig) -> Self {
        Self {
            store,
            gateways,
            resolver: IdentifierResolver::default(),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_resolver(mut self, resolver: IdentifierResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Starts a payment attempt for the violation the request refers to.
    ///
    /// Already-paid violations are rejected before anything is written. A
    /// gateway that settles synchronously completes the payment and marks the
    /// violation paid in one commit; otherwise the payment stays `processing`
    /// and the redirect target is returned.
    pub async fn initiate(&self, request: InitiateRequest) -> Result<InitiateOutcome> {
        let now = self.clock.now();
        self.gateways.get(request.gateway)?;

        let mut hints = request.hints;
        if hints.driver_name.is_none() {
            hints.driver_name = Some(request.payer.name.clone());
        }
        let mut violation = self
            .resolver
            .resolve(self.store.as_ref(), &hints)
            .await?
            .violation;
        violation.ensure_payable()?;

        let assessment = fine::assess(&violation, now, &self.config.late_penalty);
        if assessment.apply_to(&mut violation) {
            violation = self.store.update_violation(violation).await?;
            info!(
                violation_id = %violation.id,
                penalty = %violation.additional_penalties,
                total = %violation.total_fine,
                "late penalty applied"
            );
        }
        if let Some(claimed) = request.claimed_amount
            && claimed != assessment.amount.value()
        {
            warn!(
                violation_id = %violation.id,
                claimed = %claimed,
                charged = %assessment.amount,
                "client amount differs from assessed fine; charging assessed fine"
            );
        }

        let mut payment = Payment::new(
            &violation,
            request.payer,
            assessment.amount,
            self.config.currency.clone(),
            request.gateway,
            now,
        );
        self.store.create_payment(payment.clone()).await?;
        payment.begin_processing(now)?;
        self.store
            .update_payment(payment.clone(), PaymentStatus::Pending)
            .await?;
        info!(
            payment_id = %payment.id,
            violation_id = %violation.id,
            amount = %payment.amount(),
            gateway = %payment.gateway,
            "payment processing"
        );

        let order = PaymentOrder {
            payment_id: payment.id,
            amount: payment.amount(),
            currency: payment.currency.clone(),
            description: format!("Traffic violation {}", violation.reference),
            payer: payment.payer.clone(),
        };
        let created = match self.gateways.create_payment(payment.gateway, &order).await {
            Ok(created) => created,
            Err(e) => return Err(self.fail_on_gateway_error(payment, e, now).await),
        };

        payment.record_acceptance(
            created.transaction_id.clone(),
            created.reference,
            created.redirect_url.clone(),
            created.provider_response,
        );

        match created.status {
            GatewayStatus::Settled => {
                let (payment, violation, receipt) = self.settle(payment, violation, now).await?;
                Ok(InitiateOutcome {
                    payment,
                    violation,
                    redirect_url: None,
                    gateway_transaction_id: Some(created.transaction_id),
                    receipt: Some(receipt),
                })
            }
            GatewayStatus::Pending => {
                self.store
                    .update_payment(payment.clone(), PaymentStatus::Processing)
                    .await?;
                info!(payment_id = %payment.id, "awaiting gateway confirmation");
                Ok(InitiateOutcome {
                    payment,
                    violation,
                    redirect_url: created.redirect_url,
                    gateway_transaction_id: Some(created.transaction_id),
                    receipt: None,
                })
            }
            GatewayStatus::Failed => {
                let e = GatewayError::Rejected {
                    code: "GATEWAY_DECLINED".to_string(),
                    detail: format!("create returned failed for {}", created.transaction_id),
                };
                Err(self.fail_on_gateway_error(payment, e, now).await)
            }
        }
    }

    /// Verifies a redirect-based payment with its gateway and settles it.
    ///
    /// Confirming a payment that already completed returns its receipt again,
    /// including when an overlapping confirm for the same payment completes it
    /// while this one is in flight.
    pub async fn confirm(&self, payment_id: PaymentId, gateway_transaction_id: &str) -> Result<ConfirmOutcome> {
        let now = self.clock.now();
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("payment_id={payment_id}"),
            })?;

        let transaction_id = gateway_transaction_id.trim();
        if payment.gateway_transaction_id.as_deref() != Some(transaction_id) {
            warn!(
                payment_id = %payment.id,
                supplied = %transaction_id,
                "transaction id does not match payment"
            );
            return Err(ReconError::VerificationMismatch);
        }

        match payment.status {
            PaymentStatus::Completed => return self.completed_outcome(payment).await,
            PaymentStatus::Processing => {}
            other => {
                return Err(ReconError::InvalidTransition {
                    from: other,
                    to: PaymentStatus::Completed,
                });
            }
        }

        match self.verify_and_settle(payment, transaction_id, now).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let current = self.store.get_payment(payment_id).await?;
                match current {
                    Some(current) if current.status == PaymentStatus::Completed => {
                        info!(payment_id = %payment_id, "payment completed by an overlapping confirm");
                        self.completed_outcome(current).await
                    }
                    _ => Err(e),
                }
            }
        }
    }

    async fn verify_and_settle(
        &self,
        mut payment: Payment,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome> {
        let violation = self.load_violation(&payment).await?;
        if let Err(e) = violation.ensure_payable() {
            warn!(payment_id = %payment.id, violation_id = %violation.id, "violation no longer payable");
            self.abandon(payment, "VIOLATION_NOT_PAYABLE", &e.to_string(), now)
                .await?;
            return Err(e);
        }

        let verified = match self.gateways.verify_payment(payment.gateway, transaction_id).await {
            Ok(verified) => verified,
            Err(e) => return Err(self.fail_on_gateway_error(payment, e, now).await),
        };
        payment.provider_response = Some(verified.provider_response);

        if verified.status != GatewayStatus::Settled {
            warn!(payment_id = %payment.id, status = ?verified.status, "gateway did not confirm settlement");
            self.abandon(payment, "VERIFICATION_FAILED", "payment was not settled by the gateway", now)
                .await?;
            return Err(ReconError::VerificationMismatch);
        }
        if verified.amount != payment.amount() {
            error!(
                payment_id = %payment.id,
                expected = %payment.amount(),
                verified = %verified.amount,
                "gateway settled a different amount"
            );
            self.abandon(payment, "AMOUNT_MISMATCH", "settled amount differs from amount due", now)
                .await?;
            return Err(ReconError::VerificationMismatch);
        }

        let (payment, violation, receipt) = self.settle(payment, violation, now).await?;
        Ok(ConfirmOutcome {
            payment,
            violation,
            receipt,
        })
    }

    async fn load_violation(&self, payment: &Payment) -> Result<Violation> {
        self.store
            .get_violation(payment.violation_id)
            .await?
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("violation_id={}", payment.violation_id),
            })
    }

    async fn completed_outcome(&self, payment: Payment) -> Result<ConfirmOutcome> {
        let receipt = payment.receipt.clone().ok_or_else(|| {
            ReconError::InvariantViolation(format!("completed payment {} has no receipt", payment.id))
        })?;
        let violation = self.load_violation(&payment).await?;
        Ok(ConfirmOutcome {
            payment,
            violation,
            receipt,
        })
    }

    /// Completes `payment` and marks `violation` paid in one atomic commit.
    ///
    /// Losing a race against another payment for the same violation is reported
    /// as `AlreadySettled`, and this attempt is marked failed.
    async fn settle(
        &self,
        payment: Payment,
        violation: Violation,
        now: DateTime<Utc>,
    ) -> Result<(Payment, Violation, Receipt)> {
        let receipt = self.receipt_for(&payment, now);

        let mut completed = payment.clone();
        completed.complete(receipt.clone(), now)?;
        let mut paid = violation.clone();
        paid.mark_paid(payment.gateway.as_str(), now, &receipt.receipt_number);

        match self.store.commit_settlement(completed.clone(), paid).await {
            Ok(violation) => {
                info!(
                    payment_id = %completed.id,
                    violation_id = %violation.id,
                    receipt = %receipt.receipt_number,
                    "payment settled"
                );
                Ok((completed, violation, receipt))
            }
            Err(ReconError::InvariantViolation(detail)) => {
                let payment_id = payment.id;
                self.abandon(payment, "ALREADY_SETTLED", "violation already settled", now)
                    .await?;
                error!(
                    %payment_id,
                    %detail,
                    "violation settled by another payment; captured funds need a manual refund"
                );
                Err(ReconError::AlreadySettled {
                    reference: violation.reference,
                })
            }
            Err(ReconError::Conflict) => {
                warn!(payment_id = %payment.id, "violation changed during settlement");
                self.abandon(payment, "CONFLICT", "violation changed during settlement", now)
                    .await?;
                Err(ReconError::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    /// Fails a `processing` attempt. Returns `Conflict`, writing nothing, if the
    /// stored attempt has already moved on.
    async fn abandon(&self, mut payment: Payment, code: &str, message: &str, now: DateTime<Utc>) -> Result<()> {
        payment.fail(code, message, now)?;
        self.store
            .update_payment(payment, PaymentStatus::Processing)
            .await
    }

    /// Marks the payment failed and returns the error to propagate.
    ///
    /// The provider detail only goes to the log.
    async fn fail_on_gateway_error(&self, payment: Payment, e: GatewayError, now: DateTime<Utc>) -> ReconError {
        error!(
            payment_id = %payment.id,
            gateway = %payment.gateway,
            code = %e.code(),
            detail = %e.detail(),
            "gateway call failed"
        );
        let code = e.code().to_string();
        let message = e.to_string();
        match self.abandon(payment, &code, &message, now).await {
            Ok(()) => ReconError::Gateway(e),
            Err(store_err) => store_err,
        }
    }

    fn receipt_for(&self, payment: &Payment, now: DateTime<Utc>) -> Receipt {
        let short_id = payment.id.0.simple().to_string()[..8].to_ascii_uppercase();
        Receipt {
            receipt_number: format!("RCP-{}-{}", now.format("%Y%m%d"), short_id),
            download_locator: format!(
                "{}/{}",
                self.config.receipt_base.trim_end_matches('/'),
                payment.id
            ),
        }
    }

    /// Amount currently owed for a violation, without persisting anything.
    ///
    /// Violations that `initiate` would refuse are refused here too.
    pub async fn quote(&self, hints: &ResolutionHints) -> Result<(Violation, Money)> {
        let violation = self
            .resolver
            .resolve(self.store.as_ref(), hints)
            .await?
            .violation;
        violation.ensure_payable()?;
        let assessment = fine::assess(&violation, self.clock.now(), &self.config.late_penalty);
        Ok((violation, assessment.amount))
    }
}
