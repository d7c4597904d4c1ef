use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const FIXTURE: &str = "tests/fixtures/violations.csv";

fn finerecon() -> Command {
    let mut cmd = Command::new(cargo_bin!("finerecon"));
    cmd.env("RUST_LOG", "warn").arg("--violations").arg(FIXTURE);
    cmd
}

#[test]
fn test_cli_initiate_settles_late_violation() -> Result<(), Box<dyn std::error::Error>> {
    let output = finerecon()
        .args([
            "initiate",
            "--reference",
            "lpc000123 ",
            "--payer-name",
            "Ada Driver",
            "--payer-email",
            "ada@example.com",
        ])
        .output()?;
    assert!(output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(body["payment"]["status"], "completed");
    assert_eq!(body["payment"]["violation_reference"], "LPC-000123");
    assert_eq!(body["violation"]["status"], "paid");
    assert_eq!(body["violation"]["late_penalty_applied"], true);
    assert!(
        body["receipt"]["receipt_number"]
            .as_str()
            .is_some_and(|r| r.starts_with("RCP-"))
    );
    Ok(())
}

#[test]
fn test_cli_quote_does_not_charge() -> Result<(), Box<dyn std::error::Error>> {
    let output = finerecon()
        .args(["quote", "--reference", "OVR-200"])
        .output()?;
    assert!(output.status.success());

    let body: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(body["reference"], "OVR200");
    assert_eq!(body["status"], "pending");
    Ok(())
}

#[test]
fn test_cli_redirect_flow() {
    finerecon()
        .args([
            "--sandbox-behavior",
            "redirect",
            "initiate",
            "--reference",
            "OVR200",
            "--payer-name",
            "Ada Driver",
            "--payer-email",
            "ada@example.com",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"redirect_url\": \"/sandbox/checkout/sbx_"))
        .stdout(predicate::str::contains("\"status\": \"processing\""));
}

#[test]
fn test_cli_rejects_paid_violation() {
    finerecon()
        .args([
            "initiate",
            "--reference",
            "OVR300",
            "--payer-name",
            "Bob Rider",
            "--payer-email",
            "bob@example.com",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already settled"));
}

#[test]
fn test_cli_skips_malformed_rows() {
    finerecon()
        .args(["quote", "--reference", "OVR200"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Error reading violation"));
}

#[test]
fn test_cli_unconfigured_gateway() {
    finerecon()
        .env_remove("HOSTED_CHECKOUT_URL")
        .args([
            "initiate",
            "--reference",
            "OVR200",
            "--payer-name",
            "Ada Driver",
            "--payer-email",
            "ada@example.com",
            "--gateway",
            "hosted-checkout",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("payment gateway unavailable"));
}

#[test]
fn test_cli_requires_identifier() {
    finerecon()
        .args(["quote", "--driver-name", "Ada Driver"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("id or reference number is required"));
}
