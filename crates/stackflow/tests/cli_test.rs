#![allow(deprecated)] // TODO: move from Command::cargo_bin to cargo_bin_cmd!

mod common;

use assert_cmd::Command;
use common::TestProject;
use predicates::prelude::*;
use std::fs;

const KEY: &str = "c3RhY2tmbG93LXRlc3Qta2V5";

/// Help lists every subcommand
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("sas"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

#[test]
fn test_up_help() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("up")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--stack"))
        .stdout(predicate::str::contains("--fail"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stack").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_up_requires_stack() {
    let project = TestProject::with_dev_stack();
    project.command().arg("up").assert().failure();
}

#[test]
fn test_preview_prints_order() {
    let project = TestProject::with_dev_stack();
    project
        .command()
        .args(["preview", "--stack", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("contact-legacy-function-dev"))
        .stdout(predicate::str::contains("keyvault:Vault"))
        .stdout(predicate::str::contains("primaryStorageKey (secret)"));
    assert!(!project.state_file("dev").exists());
}

#[test]
fn test_stack_from_environment() {
    let project = TestProject::with_dev_stack();
    project
        .command()
        .arg("preview")
        .env("STACKFLOW_STACK", "dev")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stack: dev"));
}

#[test]
fn test_missing_tenant_is_an_error() {
    let project = TestProject::new();
    project.write_project("name: contact-legacy\n");
    project
        .command()
        .args(["preview", "--stack", "dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tenantId"));
}

#[test]
fn test_up_realizes_stack_and_saves_state() {
    let project = TestProject::with_dev_stack();
    project
        .command()
        .args(["up", "--stack", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("7 realized, 0 failed"))
        .stdout(predicate::str::contains("primaryStorageKey = [secret]"));

    let state = fs::read_to_string(project.state_file("dev")).unwrap();
    let state: serde_json::Value = serde_json::from_str(&state).unwrap();
    assert_eq!(state["stack"], "dev");
    assert_eq!(state["exports"]["primaryStorageKey"], "[secret]");
    assert_eq!(
        state["resources"]["vault"]["status"],
        serde_json::json!("realized")
    );
}

#[test]
fn test_up_failure_skips_dependents() {
    let project = TestProject::with_dev_stack();
    project
        .command()
        .args(["up", "--stack", "dev", "--fail", "contactlegdev=validation"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("skipped (blocked by contactlegdev)"))
        .stderr(predicate::str::contains("not fully realized"));

    let state = fs::read_to_string(project.state_file("dev")).unwrap();
    assert!(state.contains("\"failed\""));
}

#[test]
fn test_sas_prints_signed_url() {
    let project = TestProject::new();
    project
        .command()
        .args([
            "sas",
            "--account",
            "acct1",
            "--container",
            "zips",
            "--blob",
            "app.zip",
            "--package",
            "--start",
            "2021-01-01",
            "--end",
            "2030-01-01",
        ])
        .env("STACKFLOW_STORAGE_KEY", KEY)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "https://acct1.blob.core.windows.net/zips/app.zip?sv=2018-11-09",
        ))
        .stdout(predicate::str::contains(
            "sig=6wO2dXtVbgz9AbXSrOTNWWU9pUcXEFgpoChvpDtElfg%3D",
        ));
}

#[test]
fn test_sas_without_key_fails() {
    let project = TestProject::new();
    project
        .command()
        .args(["sas", "--account", "a", "--container", "c", "--blob", "b"])
        .env_remove("STACKFLOW_STORAGE_KEY")
        .assert()
        .failure()
        .stderr(predicate::str::contains("STACKFLOW_STORAGE_KEY"));
}

#[test]
fn test_sas_rejects_inverted_window() {
    let project = TestProject::new();
    project
        .command()
        .args([
            "sas",
            "--account",
            "a",
            "--container",
            "c",
            "--blob",
            "b",
            "--start",
            "2030-01-01",
            "--end",
            "2021-01-01",
        ])
        .env("STACKFLOW_STORAGE_KEY", KEY)
        .assert()
        .failure()
        .stderr(predicate::str::contains("validity window"));
}
