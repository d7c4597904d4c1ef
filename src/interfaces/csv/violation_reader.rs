use crate::domain::money::Money;
use crate::domain::reference::extract_reference;
use crate::domain::violation::{Violation, ViolationId, ViolationStatus};
use crate::error::{ReconError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use uuid::Uuid;

/// One CSV row as written by the enforcement export.
#[derive(Debug, Deserialize)]
struct ViolationRecord {
    #[serde(default)]
    id: Option<String>,
    reference: String,
    driver_name: String,
    base_fine: Decimal,
    #[serde(default)]
    additional_penalties: Option<Decimal>,
    due_date: String,
    deadline: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    late_penalty_applied: Option<bool>,
    #[serde(default)]
    created_at: Option<String>,
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_instant(field: &str, value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ReconError::ValidationError(format!("invalid {field} '{value}'")))
}

impl TryFrom<ViolationRecord> for Violation {
    type Error = ReconError;

    fn try_from(record: ViolationRecord) -> Result<Self> {
        let reference = extract_reference(&record.reference).ok_or_else(|| {
            ReconError::ValidationError(format!(
                "invalid reference number '{}'",
                record.reference.trim()
            ))
        })?;
        let base_fine = Money::non_negative(record.base_fine)?;
        let penalties = Money::non_negative(record.additional_penalties.unwrap_or_default())?;
        let due_date = parse_instant("due_date", &record.due_date)?;
        let deadline = parse_instant("deadline", &record.deadline)?;
        let created_at = match record.created_at.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => parse_instant("created_at", value)?,
            _ => due_date,
        };

        let mut violation = Violation::new(
            reference,
            record.driver_name.trim(),
            base_fine,
            due_date,
            deadline,
            created_at,
        );
        if let Some(id) = record.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let uuid = Uuid::parse_str(id)
                .map_err(|_| ReconError::ValidationError(format!("invalid id '{id}'")))?;
            violation.id = ViolationId(uuid);
        }
        if let Some(status) = record.status.as_deref().filter(|s| !s.trim().is_empty()) {
            violation.status = status.parse()?;
        }
        violation.additional_penalties = penalties;
        violation.late_penalty_applied = record.late_penalty_applied.unwrap_or(false);
        violation.recompute_total();
        if violation.status == ViolationStatus::Paid {
            violation.payment_date = Some(violation.created_at);
        }
        Ok(violation)
    }
}

/// Reads violation records from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and tolerating missing optional
/// columns. Each row yields its own `Result` so one bad row does not stop the
/// import.
pub struct ViolationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ViolationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and converts violations.
    pub fn violations(self) -> impl Iterator<Item = Result<Violation>> {
        self.reader
            .into_deserialize::<ViolationRecord>()
            .map(|result| result.map_err(ReconError::from).and_then(Violation::try_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "id,reference,driver_name,base_fine,additional_penalties,due_date,deadline,status,created_at";

    #[test]
    fn test_reader_valid_stream() {
        let data = format!(
            "{HEADER}\n\
             ,lpc-000123, Ada Driver ,1000,,2026-01-01,2026-02-01,,\n\
             6f1c2a9e-3b4d-4e5f-8a7b-1c2d3e4f5a6b,OVR100,Bob,50.5,5,2026-01-01T00:00:00Z,2026-02-01T00:00:00Z,overdue,2025-12-30"
        );
        let results: Vec<Result<Violation>> = ViolationReader::new(data.as_bytes()).violations().collect();
        assert_eq!(results.len(), 2);

        let first = results[0].as_ref().unwrap();
        assert_eq!(first.reference, "LPC-000123");
        assert_eq!(first.driver_name, "Ada Driver");
        assert_eq!(first.total_fine, Money::new(dec!(1000)));
        assert_eq!(first.status, ViolationStatus::Pending);

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.id.to_string(), "6f1c2a9e-3b4d-4e5f-8a7b-1c2d3e4f5a6b");
        assert_eq!(second.total_fine, Money::new(dec!(55.5)));
        assert_eq!(second.status, ViolationStatus::Overdue);
    }

    #[test]
    fn test_reader_malformed_rows() {
        let data = format!(
            "{HEADER}\n\
             ,OVR1,Ada,not_a_number,,2026-01-01,2026-02-01,,\n\
             ,OVR2,Ada,10,,yesterday,2026-02-01,,\n\
             ,OVR3,Ada,10,,2026-01-01,2026-02-01,closed,\n\
             ,OVR4,Ada,10,,2026-01-01,2026-02-01,pending,"
        );
        let results: Vec<Result<Violation>> = ViolationReader::new(data.as_bytes()).violations().collect();
        assert!(results[0].is_err());
        assert!(results[1].is_err());
        assert!(results[2].is_err());
        assert!(results[3].is_ok());
    }

    #[test]
    fn test_reader_canonicalizes_references() {
        let data = format!(
            "{HEADER}\n\
             ,lpc000123,Ada,10,,2026-01-01,2026-02-01,,\n\
             ,OVR-100,Ada,10,,2026-01-01,2026-02-01,,\n\
             ,not a reference,Ada,10,,2026-01-01,2026-02-01,,"
        );
        let results: Vec<Result<Violation>> = ViolationReader::new(data.as_bytes()).violations().collect();
        assert_eq!(results[0].as_ref().unwrap().reference, "LPC-000123");
        assert_eq!(results[1].as_ref().unwrap().reference, "OVR100");
        assert!(matches!(results[2], Err(ReconError::ValidationError(_))));
    }
}
