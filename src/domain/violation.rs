use super::money::Money;
use crate::error::ReconError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable internal identifier of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViolationId(pub Uuid);

impl ViolationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ViolationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ViolationStatus {
    Pending,
    Paid,
    Disputed,
    Dismissed,
    Overdue,
    Cancelled,
}

impl ViolationStatus {
    /// Statuses in which the fine is still owed.
    pub fn is_open(self) -> bool {
        matches!(self, ViolationStatus::Pending | ViolationStatus::Overdue)
    }
}

impl fmt::Display for ViolationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationStatus::Pending => "pending",
            ViolationStatus::Paid => "paid",
            ViolationStatus::Disputed => "disputed",
            ViolationStatus::Dismissed => "dismissed",
            ViolationStatus::Overdue => "overdue",
            ViolationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for ViolationStatus {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ViolationStatus::Pending),
            "paid" => Ok(ViolationStatus::Paid),
            "disputed" => Ok(ViolationStatus::Disputed),
            "dismissed" => Ok(ViolationStatus::Dismissed),
            "overdue" => Ok(ViolationStatus::Overdue),
            "cancelled" => Ok(ViolationStatus::Cancelled),
            other => Err(ReconError::ValidationError(format!(
                "unknown violation status '{other}'"
            ))),
        }
    }
}

/// An authoritative violation record.
///
/// `total_fine` is persisted for query convenience and is always
/// `base_fine + additional_penalties` after any mutation made here.
/// `version` is bumped by the store on every successful write and is used for
/// optimistic concurrency checks.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Violation {
    pub id: ViolationId,
    pub reference: String,
    pub driver_name: String,
    pub base_fine: Money,
    pub additional_penalties: Money,
    pub total_fine: Money,
    pub due_date: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
    pub status: ViolationStatus,
    /// Set once the one-time late surcharge has been added.
    pub late_penalty_applied: bool,
    pub payment_method: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Violation {
    pub fn new(
        reference: impl Into<String>,
        driver_name: impl Into<String>,
        base_fine: Money,
        due_date: DateTime<Utc>,
        payment_deadline: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ViolationId::generate(),
            reference: reference.into(),
            driver_name: driver_name.into(),
            base_fine,
            additional_penalties: Money::ZERO,
            total_fine: base_fine,
            due_date,
            payment_deadline,
            status: ViolationStatus::Pending,
            late_penalty_applied: false,
            payment_method: None,
            payment_date: None,
            payment_reference: None,
            created_at,
            version: 0,
        }
    }

    /// Rejects violations that must not receive a new payment attempt.
    pub fn ensure_payable(&self) -> Result<(), ReconError> {
        match self.status {
            ViolationStatus::Paid => Err(ReconError::AlreadySettled {
                reference: self.reference.clone(),
            }),
            ViolationStatus::Disputed | ViolationStatus::Dismissed | ViolationStatus::Cancelled => {
                Err(ReconError::NotPayable {
                    reference: self.reference.clone(),
                    status: self.status,
                })
            }
            ViolationStatus::Pending | ViolationStatus::Overdue => Ok(()),
        }
    }

    /// Adds the late surcharge exactly once. Returns `false` if it was already applied.
    pub fn apply_late_penalty(&mut self, penalty: Money) -> bool {
        if self.late_penalty_applied {
            return false;
        }
        self.additional_penalties += penalty;
        self.late_penalty_applied = true;
        if self.status == ViolationStatus::Pending {
            self.status = ViolationStatus::Overdue;
        }
        self.recompute_total();
        true
    }

    pub fn mark_paid(&mut self, method: &str, at: DateTime<Utc>, reference: &str) {
        self.status = ViolationStatus::Paid;
        self.payment_method = Some(method.to_string());
        self.payment_date = Some(at);
        self.payment_reference = Some(reference.to_string());
    }

    pub fn recompute_total(&mut self) {
        self.total_fine = self.base_fine + self.additional_penalties;
    }
}
