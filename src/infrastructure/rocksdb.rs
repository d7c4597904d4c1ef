use super::checks::{check_payment_status, check_settlement, check_version};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{PaymentStore, SettlementStore, ViolationStore};
use crate::domain::violation::{Violation, ViolationId};
use crate::error::{ReconError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for violation records, keyed by internal id.
pub const CF_VIOLATIONS: &str = "violations";
/// Column Family mapping uppercase reference numbers to internal ids.
pub const CF_VIOLATION_REFS: &str = "violation_refs";
/// Column Family for payment attempts, keyed by payment id.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent store implementation using RocksDB.
///
/// Every read-check-write sequence runs under `write_lock`, and multi-record
/// writes go through a single `WriteBatch`, so a settlement lands completely or
/// not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating the
    /// column families if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_VIOLATIONS, CF_VIOLATION_REFS, CF_PAYMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            ReconError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(&cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, batch: &mut WriteBatch, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(&cf, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn load_violation(&self, id: ViolationId) -> Result<Option<Violation>> {
        self.get_json(CF_VIOLATIONS, id.0.as_bytes())
    }

    fn load_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, id.0.as_bytes())
    }
}

fn reference_key(reference: &str) -> Vec<u8> {
    reference.trim().to_ascii_uppercase().into_bytes()
}

#[async_trait]
impl ViolationStore for RocksDBStore {
    async fn insert_violation(&self, violation: Violation) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let ref_key = reference_key(&violation.reference);
        let refs = self.cf(CF_VIOLATION_REFS)?;
        if self.load_violation(violation.id)?.is_some()
            || self.db.get_pinned_cf(&refs, &ref_key)?.is_some()
        {
            return Err(ReconError::ValidationError(format!(
                "violation {} already exists",
                violation.reference
            )));
        }

        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_VIOLATIONS, violation.id.0.as_bytes(), &violation)?;
        batch.put_cf(&refs, &ref_key, violation.id.0.as_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_violation(&self, id: ViolationId) -> Result<Option<Violation>> {
        self.load_violation(id)
    }

    async fn find_violation_by_reference(&self, reference: &str) -> Result<Option<Violation>> {
        let refs = self.cf(CF_VIOLATION_REFS)?;
        let Some(id_bytes) = self.db.get_cf(&refs, reference_key(reference))? else {
            return Ok(None);
        };
        let id = uuid::Uuid::from_slice(&id_bytes)
            .map_err(|e| ReconError::InternalError(Box::new(e)))?;
        self.load_violation(ViolationId(id))
    }

    async fn find_open_violations_by_driver(&self, driver_name: &str) -> Result<Vec<Violation>> {
        let handle = self.cf(CF_VIOLATIONS)?;
        let wanted = driver_name.trim();

        let mut violations = Vec::new();
        for item in self.db.iterator_cf(handle, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let violation: Violation = serde_json::from_slice(&value)?;
            if violation.status.is_open() && violation.driver_name.trim().eq_ignore_ascii_case(wanted) {
                violations.push(violation);
            }
        }
        Ok(violations)
    }

    async fn update_violation(&self, mut violation: Violation) -> Result<Violation> {
        let _guard = self.write_lock.lock().await;
        let stored = self
            .load_violation(violation.id)?
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("violation_id={}", violation.id),
            })?;
        check_version(&stored, &violation)?;

        violation.version += 1;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_VIOLATIONS, violation.id.0.as_bytes(), &violation)?;
        self.db.write(batch)?;
        Ok(violation)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn create_payment(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.load_payment(payment.id)?.is_some() {
            return Err(ReconError::ValidationError(format!(
                "payment {} already exists",
                payment.id
            )));
        }
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENTS, payment.id.0.as_bytes(), &payment)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn update_payment(&self, payment: Payment, expected: PaymentStatus) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let stored = self
            .load_payment(payment.id)?
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("payment_id={}", payment.id),
            })?;
        check_payment_status(&stored, expected)?;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENTS, payment.id.0.as_bytes(), &payment)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        self.load_payment(id)
    }
}

#[async_trait]
impl SettlementStore for RocksDBStore {
    async fn commit_settlement(&self, payment: Payment, mut violation: Violation) -> Result<Violation> {
        let _guard = self.write_lock.lock().await;
        let stored_violation = self
            .load_violation(violation.id)?
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("violation_id={}", violation.id),
            })?;
        let stored_payment = self
            .load_payment(payment.id)?
            .ok_or_else(|| ReconError::NotFound {
                attempted: format!("payment_id={}", payment.id),
            })?;
        check_settlement(&stored_violation, &stored_payment, &payment, &violation)?;

        violation.version += 1;
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_VIOLATIONS, violation.id.0.as_bytes(), &violation)?;
        self.put_json(&mut batch, CF_PAYMENTS, payment.id.0.as_bytes(), &payment)?;
        self.db.write(batch)?;
        Ok(violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::payment::{Payer, Receipt};
    use crate::domain::violation::ViolationStatus;
    use crate::gateway::GatewayKind;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn violation(reference: &str) -> Violation {
        let now = Utc::now();
        Violation::new(
            reference,
            "Ada Driver",
            Money::new(dec!(250)),
            now,
            now + Duration::days(10),
            now,
        )
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_VIOLATIONS).is_some());
        assert!(store.db.cf_handle(CF_VIOLATION_REFS).is_some());
        assert!(store.db.cf_handle(CF_PAYMENTS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_violation_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let v = violation("LPC-000123");

        store.insert_violation(v.clone()).await.unwrap();
        assert_eq!(store.get_violation(v.id).await.unwrap(), Some(v.clone()));
        assert_eq!(
            store.find_violation_by_reference("lpc-000123").await.unwrap(),
            Some(v.clone())
        );
        assert_eq!(
            store.find_open_violations_by_driver("ada driver").await.unwrap(),
            vec![v.clone()]
        );

        let updated = store.update_violation(v.clone()).await.unwrap();
        assert_eq!(updated.version, 1);
        assert!(matches!(
            store.update_violation(v).await,
            Err(ReconError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_rocksdb_settlement_survives_reopen() {
        let dir = tempdir().unwrap();
        let v = violation("OVR100");
        let now = Utc::now();
        let mut payment = Payment::new(
            &v,
            Payer {
                name: "Ada Driver".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
            },
            v.total_fine,
            "EUR",
            GatewayKind::Sandbox,
            now,
        );
        payment.begin_processing(now).unwrap();

        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            store.insert_violation(v.clone()).await.unwrap();
            store.create_payment(payment.clone()).await.unwrap();

            let mut completed = payment.clone();
            completed
                .complete(
                    Receipt {
                        receipt_number: "RCP-1".to_string(),
                        download_locator: "/receipts/1".to_string(),
                    },
                    now,
                )
                .unwrap();
            let mut paid = v.clone();
            paid.mark_paid("sandbox", now, "RCP-1");
            store.commit_settlement(completed, paid).await.unwrap();
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        let stored_v = store.get_violation(v.id).await.unwrap().unwrap();
        let stored_p = store.get_payment(payment.id).await.unwrap().unwrap();
        assert_eq!(stored_v.status, ViolationStatus::Paid);
        assert_eq!(stored_p.status, PaymentStatus::Completed);
        assert!(store.find_open_violations_by_driver("Ada Driver").await.unwrap().is_empty());

        let mut stale = payment;
        stale.fail("CONFLICT", "stale", now).unwrap();
        assert!(matches!(
            store.update_payment(stale, PaymentStatus::Processing).await,
            Err(ReconError::Conflict)
        ));
        let stored_p = store.get_payment(stored_p.id).await.unwrap().unwrap();
        assert_eq!(stored_p.status, PaymentStatus::Completed);
    }
}
