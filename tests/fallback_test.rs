use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

fn violations_csv() -> tempfile::NamedTempFile {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "reference,driver_name,base_fine,due_date,deadline").unwrap();
    writeln!(csv, "OVR100,Ada Driver,100,2099-01-01,2099-02-01").unwrap();
    csv
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_rocksdb_fallback_warning() {
    let csv = violations_csv();

    let mut cmd = Command::new(cargo_bin!("finerecon"));
    cmd.arg("--violations")
        .arg(csv.path())
        .arg("--db-path")
        .arg("some_db")
        .args(["quote", "--reference", "OVR100"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_rocksdb_no_fallback_warning() {
    let csv = violations_csv();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("finerecon"));
    cmd.arg("--violations")
        .arg(csv.path())
        .arg("--db-path")
        .arg(&db_path)
        .args(["quote", "--reference", "OVR100"]);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Falling back").not());
}
