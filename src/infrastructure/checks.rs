//! Write-time invariants every store enforces under its own write guard.

use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::violation::{Violation, ViolationStatus};
use crate::error::{ReconError, Result};

/// Optimistic check for violation writes.
pub(crate) fn check_version(stored: &Violation, incoming: &Violation) -> Result<()> {
    if stored.version != incoming.version {
        return Err(ReconError::Conflict);
    }
    if stored.reference != incoming.reference {
        return Err(ReconError::ValidationError(
            "reference number is immutable".to_string(),
        ));
    }
    Ok(())
}

/// Compare-and-swap guard for payment writes.
pub(crate) fn check_payment_status(stored: &Payment, expected: PaymentStatus) -> Result<()> {
    if stored.status != expected {
        return Err(ReconError::Conflict);
    }
    Ok(())
}

/// Pre-commit checks for a settlement.
pub(crate) fn check_settlement(
    stored_violation: &Violation,
    stored_payment: &Payment,
    payment: &Payment,
    violation: &Violation,
) -> Result<()> {
    if payment.status != PaymentStatus::Completed || violation.status != ViolationStatus::Paid {
        return Err(ReconError::InvariantViolation(format!(
            "settlement requires a completed payment and a paid violation, got {} / {}",
            payment.status, violation.status
        )));
    }
    if payment.violation_id != violation.id {
        return Err(ReconError::InvariantViolation(format!(
            "payment {} does not belong to violation {}",
            payment.id, violation.id
        )));
    }
    if stored_violation.status == ViolationStatus::Paid {
        return Err(ReconError::InvariantViolation(format!(
            "violation {} already paid (reference {})",
            stored_violation.id,
            stored_violation.payment_reference.as_deref().unwrap_or("unknown")
        )));
    }
    check_version(stored_violation, violation)?;
    if stored_payment.status != PaymentStatus::Processing {
        return Err(ReconError::InvalidTransition {
            from: stored_payment.status,
            to: PaymentStatus::Completed,
        });
    }
    Ok(())
}
