use super::money::Money;
use super::violation::Violation;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// The single late-payment policy: a one-time surcharge on the base fine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatePenaltyPolicy {
    pub rate: Decimal,
}

impl Default for LatePenaltyPolicy {
    fn default() -> Self {
        Self { rate: dec!(0.10) }
    }
}

/// Result of assessing what a violation owes at a given instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FineAssessment {
    /// Authoritative amount to charge.
    pub amount: Money,
    /// Surcharge that became due with this assessment and still has to be persisted.
    pub late_penalty: Option<Money>,
}

impl FineAssessment {
    /// Writes a newly due surcharge onto the violation. Returns whether anything changed.
    pub fn apply_to(&self, violation: &mut Violation) -> bool {
        match self.late_penalty {
            Some(penalty) => violation.apply_late_penalty(penalty),
            None => false,
        }
    }
}

/// Computes the amount owed by `violation` at `now`.
///
/// The surcharge is only due for open violations past their deadline that have
/// not had it applied yet; in every other case the persisted total is owed.
pub fn assess(violation: &Violation, now: DateTime<Utc>, policy: &LatePenaltyPolicy) -> FineAssessment {
    let late = now > violation.payment_deadline;
    if !late || !violation.status.is_open() || violation.late_penalty_applied {
        return FineAssessment {
            amount: violation.total_fine,
            late_penalty: None,
        };
    }

    let penalty = violation.base_fine.percentage(policy.rate);
    FineAssessment {
        amount: violation.total_fine + penalty,
        late_penalty: Some(penalty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::violation::ViolationStatus;
    use chrono::Duration;

    fn violation(deadline_offset: Duration) -> (Violation, DateTime<Utc>) {
        let now = Utc::now();
        let v = Violation::new(
            "OVR100",
            "Ada Driver",
            Money::new(dec!(1000)),
            now - Duration::days(40),
            now + deadline_offset,
            now - Duration::days(40),
        );
        (v, now)
    }

    #[test]
    fn test_before_deadline_owes_total() {
        let (v, now) = violation(Duration::days(1));
        let a = assess(&v, now, &LatePenaltyPolicy::default());
        assert_eq!(a.amount, Money::new(dec!(1000)));
        assert!(a.late_penalty.is_none());
    }

    #[test]
    fn test_exactly_at_deadline_is_not_late() {
        let (v, _) = violation(Duration::zero());
        let a = assess(&v, v.payment_deadline, &LatePenaltyPolicy::default());
        assert_eq!(a.amount, Money::new(dec!(1000)));
    }

    #[test]
    fn test_after_deadline_adds_ten_percent_once() {
        let (mut v, now) = violation(-Duration::days(1));
        let policy = LatePenaltyPolicy::default();

        let first = assess(&v, now, &policy);
        assert_eq!(first.amount, Money::new(dec!(1100)));
        assert_eq!(first.late_penalty, Some(Money::new(dec!(100))));
        assert!(first.apply_to(&mut v));
        assert_eq!(v.total_fine, Money::new(dec!(1100)));

        let second = assess(&v, now + Duration::days(3), &policy);
        assert_eq!(second.amount, Money::new(dec!(1100)));
        assert!(second.late_penalty.is_none());
        assert!(!second.apply_to(&mut v));
        assert_eq!(v.additional_penalties, Money::new(dec!(100)));
    }

    #[test]
    fn test_non_open_status_is_never_surcharged() {
        let (mut v, now) = violation(-Duration::days(1));
        for status in [
            ViolationStatus::Paid,
            ViolationStatus::Disputed,
            ViolationStatus::Dismissed,
            ViolationStatus::Cancelled,
        ] {
            v.status = status;
            let a = assess(&v, now, &LatePenaltyPolicy::default());
            assert_eq!(a.amount, Money::new(dec!(1000)), "status {status}");
            assert!(a.late_penalty.is_none());
        }
    }

    #[test]
    fn test_existing_penalties_are_kept() {
        let (mut v, now) = violation(-Duration::days(1));
        v.additional_penalties = Money::new(dec!(25));
        v.recompute_total();
        let a = assess(&v, now, &LatePenaltyPolicy::default());
        assert_eq!(a.amount, Money::new(dec!(1125)));
    }
}
