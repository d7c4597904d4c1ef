use crate::domain::fine::LatePenaltyPolicy;
use rust_decimal::Decimal;
use std::time::Duration;

pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RECEIPT_BASE: &str = "/receipts";

/// Settings of the reconciliation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The single currency every fine is charged in.
    pub currency: String,
    pub late_penalty: LatePenaltyPolicy,
    /// Upper bound for each outbound gateway call.
    pub gateway_timeout: Duration,
    /// Prefix of receipt download locators.
    pub receipt_base: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            late_penalty: LatePenaltyPolicy::default(),
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            receipt_base: DEFAULT_RECEIPT_BASE.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_late_penalty_rate(mut self, rate: Decimal) -> Self {
        self.late_penalty = LatePenaltyPolicy { rate };
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }
}
