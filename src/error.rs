use crate::domain::payment::PaymentStatus;
use crate::domain::violation::ViolationStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconError>;

/// Errors surfaced by the reconciliation engine.
///
/// Every variant is scoped to a single request; none of them is fatal to the
/// process.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("no matching record (attempted: {attempted})")]
    NotFound { attempted: String },
    #[error("violation {reference} is already settled")]
    AlreadySettled { reference: String },
    #[error("violation {reference} cannot be paid while {status}")]
    NotPayable {
        reference: String,
        status: ViolationStatus,
    },
    #[error("payment gateway unavailable, please try again")]
    Gateway(#[from] GatewayError),
    #[error("payment could not be verified with the gateway")]
    VerificationMismatch,
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("concurrent update detected, please retry")]
    Conflict,
    #[error("payment cannot move from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("storage error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl ReconError {
    /// Whether a caller may retry the same request with a fresh `initiate`.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconError::Conflict => true,
            ReconError::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ReconError {
    fn from(e: rocksdb::Error) -> Self {
        ReconError::InternalError(Box::new(e))
    }
}

impl From<serde_json::Error> for ReconError {
    fn from(e: serde_json::Error) -> Self {
        ReconError::InternalError(Box::new(e))
    }
}

/// Failure reported by a gateway adapter.
///
/// The provider's own message is kept for logs; `Display` stays generic so it
/// can be surfaced to end users.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway timed out")]
    Timeout,
    #[error("gateway unreachable")]
    Unreachable { detail: String },
    #[error("gateway rejected the request")]
    Rejected { code: String, detail: String },
    #[error("gateway returned a malformed response")]
    Malformed { detail: String },
    #[error("gateway {0} is not configured")]
    NotConfigured(String),
}

impl GatewayError {
    /// Stable machine code recorded on failed payments.
    pub fn code(&self) -> &str {
        match self {
            GatewayError::Timeout => "GATEWAY_TIMEOUT",
            GatewayError::Unreachable { .. } => "GATEWAY_UNREACHABLE",
            GatewayError::Rejected { code, .. } => code,
            GatewayError::Malformed { .. } => "GATEWAY_MALFORMED_RESPONSE",
            GatewayError::NotConfigured(_) => "GATEWAY_NOT_CONFIGURED",
        }
    }

    /// Provider detail for logs only.
    pub fn detail(&self) -> String {
        match self {
            GatewayError::Timeout => "no response within the configured timeout".to_string(),
            GatewayError::Unreachable { detail }
            | GatewayError::Rejected { detail, .. }
            | GatewayError::Malformed { detail } => detail.clone(),
            GatewayError::NotConfigured(kind) => format!("no adapter registered for {kind}"),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout | GatewayError::Unreachable { .. }
        )
    }
}
