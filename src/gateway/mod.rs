//! Uniform access to the external payment providers.
//!
//! Each provider implements [`PaymentGateway`]. The set of providers is closed:
//! [`GatewayKind`] names them and [`Gateway`] holds one adapter per variant, so
//! selection is a `match` on a tagged value rather than a lookup by string.

use crate::domain::money::Money;
use crate::domain::payment::{Payer, PaymentId};
use crate::error::{GatewayError, ReconError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub mod hosted_checkout;
pub mod sandbox;

pub use hosted_checkout::{HostedCheckoutConfig, HostedCheckoutGateway};
pub use sandbox::{SandboxBehavior, SandboxGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    Sandbox,
    HostedCheckout,
}

impl GatewayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::Sandbox => "sandbox",
            GatewayKind::HostedCheckout => "hosted_checkout",
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayKind {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sandbox" | "demo" => Ok(GatewayKind::Sandbox),
            "hosted_checkout" => Ok(GatewayKind::HostedCheckout),
            other => Err(ReconError::ValidationError(format!(
                "unknown gateway '{other}'"
            ))),
        }
    }
}

/// What the engine asks a provider to charge.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub payment_id: PaymentId,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub payer: Payer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Settled,
    Pending,
    Failed,
}

/// Provider answer to a create call.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub transaction_id: String,
    pub reference: Option<String>,
    pub status: GatewayStatus,
    pub redirect_url: Option<String>,
    pub provider_response: serde_json::Value,
}

/// Provider answer to a verify call.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub status: GatewayStatus,
    pub amount: Money,
    pub provider_response: serde_json::Value,
}

/// The contract every provider adapter satisfies.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn kind(&self) -> GatewayKind;

    async fn create_payment(&self, order: &PaymentOrder) -> Result<CreatedPayment, GatewayError>;

    async fn verify_payment(&self, transaction_id: &str) -> Result<VerifiedPayment, GatewayError>;
}

/// One configured adapter, tagged by provider.
pub enum Gateway {
    Sandbox(SandboxGateway),
    HostedCheckout(HostedCheckoutGateway),
}

impl Gateway {
    pub fn kind(&self) -> GatewayKind {
        match self {
            Gateway::Sandbox(g) => g.kind(),
            Gateway::HostedCheckout(g) => g.kind(),
        }
    }

    pub async fn create_payment(&self, order: &PaymentOrder) -> Result<CreatedPayment, GatewayError> {
        match self {
            Gateway::Sandbox(g) => g.create_payment(order).await,
            Gateway::HostedCheckout(g) => g.create_payment(order).await,
        }
    }

    pub async fn verify_payment(&self, transaction_id: &str) -> Result<VerifiedPayment, GatewayError> {
        match self {
            Gateway::Sandbox(g) => g.verify_payment(transaction_id).await,
            Gateway::HostedCheckout(g) => g.verify_payment(transaction_id).await,
        }
    }
}

/// Adapters resolved once at startup, keyed by provider.
///
/// Every outbound call is bounded by `timeout`; expiry becomes
/// [`GatewayError::Timeout`].
#[derive(Clone)]
pub struct GatewayRegistry {
    adapters: HashMap<GatewayKind, Arc<Gateway>>,
    timeout: Duration,
}

impl GatewayRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            adapters: HashMap::new(),
            timeout,
        }
    }

    pub fn with(mut self, gateway: Gateway) -> Self {
        self.adapters.insert(gateway.kind(), Arc::new(gateway));
        self
    }

    pub fn get(&self, kind: GatewayKind) -> Result<&Gateway, GatewayError> {
        self.adapters
            .get(&kind)
            .map(Arc::as_ref)
            .ok_or_else(|| GatewayError::NotConfigured(kind.to_string()))
    }

    pub async fn create_payment(
        &self,
        kind: GatewayKind,
        order: &PaymentOrder,
    ) -> Result<CreatedPayment, GatewayError> {
        let gateway = self.get(kind)?;
        tokio::time::timeout(self.timeout, gateway.create_payment(order))
            .await
            .map_err(|_| GatewayError::Timeout)?
    }

    pub async fn verify_payment(
        &self,
        kind: GatewayKind,
        transaction_id: &str,
    ) -> Result<VerifiedPayment, GatewayError> {
        let gateway = self.get(kind)?;
        tokio::time::timeout(self.timeout, gateway.verify_payment(transaction_id))
            .await
            .map_err(|_| GatewayError::Timeout)?
    }
}

/// Converts to integer minor units (cents) as most provider APIs expect.
pub fn to_minor_units(amount: Money) -> Result<i64, GatewayError> {
    (amount.rounded().value() * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or_else(|| GatewayError::Malformed {
            detail: format!("amount {amount} does not fit in minor units"),
        })
}

pub fn from_minor_units(minor: i64) -> Money {
    Money::new(Decimal::new(minor, 2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_gateway_kind_parsing() {
        assert_eq!("sandbox".parse::<GatewayKind>().unwrap(), GatewayKind::Sandbox);
        assert_eq!(
            "Hosted-Checkout".parse::<GatewayKind>().unwrap(),
            GatewayKind::HostedCheckout
        );
        assert!("paypal".parse::<GatewayKind>().is_err());
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Money::new(dec!(1100))).unwrap(), 110_000);
        assert_eq!(to_minor_units(Money::new(dec!(12.345))).unwrap(), 1_235);
        assert_eq!(from_minor_units(110_050), Money::new(dec!(1100.50)));
    }

    #[test]
    fn test_registry_reports_missing_adapter() {
        let registry = GatewayRegistry::new(Duration::from_secs(1))
            .with(Gateway::Sandbox(SandboxGateway::new(SandboxBehavior::SettleImmediately)));
        assert!(registry.get(GatewayKind::Sandbox).is_ok());
        assert!(matches!(
            registry.get(GatewayKind::HostedCheckout),
            Err(GatewayError::NotConfigured(_))
        ));
    }
}
