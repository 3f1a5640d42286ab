//! CLI integration tests for every subcommand.
//!
//! Uses `assert_cmd` to spawn the `costguard` binary against a temporary
//! configuration and in-memory inventory fixture, then checks exit codes,
//! stdout and stderr.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Evaluation instant used by every run: a Wednesday inside active hours.
const AT: &str = "2026-04-01T12:00:00Z";

const FLEET: &str = r#"{
  "resources": [
    {
      "id": "i-old",
      "kind": "compute-instance",
      "type_class": "t3.large",
      "state": "running",
      "created_at": "2026-03-31T08:00:00Z"
    },
    {
      "id": "i-ok",
      "kind": "compute-instance",
      "type_class": "t3.medium",
      "state": "running",
      "created_at": "2026-04-01T08:00:00Z",
      "tags": {
        "AutoDelete": "false",
        "CostCenter": "eng",
        "MaxHours": "24",
        "Environment": "dev",
        "Owner": "ops@example.com"
      }
    },
    {
      "id": "i-new",
      "kind": "compute-instance",
      "type_class": "t3.large",
      "state": "running",
      "created_at": "2026-04-01T11:00:00Z"
    }
  ],
  "spend": [
    { "at": "2026-04-01T09:00:00Z", "amount": "120.50" }
  ]
}"#;

/// A config directory holding `costguard.toml` (with `extra` appended)
/// next to the fleet fixture.
fn workspace(extra: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("fleet.json"), FLEET).unwrap();
    let config = format!(
        "[provider]\nkind = \"memory\"\ninventory = \"fleet.json\"\n\n{}",
        extra
    );
    fs::write(dir.path().join("costguard.toml"), config).unwrap();
    dir
}

fn costguard(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("costguard");
    cmd.arg("--config")
        .arg(dir.join("costguard.toml"))
        .arg("--at")
        .arg(AT)
        .env("COSTGUARD_LOG", "warn");
    cmd
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.arg("--output").arg("json").output().unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

// ──────────────────────────────────────────────
// Help and errors
// ──────────────────────────────────────────────

#[test]
fn help_lists_subcommands() {
    cargo_bin_cmd!("costguard")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check-spend"))
        .stdout(predicate::str::contains("emergency"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = workspace("[budget]\nshutdown_threshold = \"1.5\"\n");
    costguard(dir.path())
        .arg("check-spend")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("budget.shutdown_threshold"));
}

#[test]
fn json_errors_are_json() {
    cargo_bin_cmd!("costguard")
        .args(["--config", "/nonexistent/costguard.toml", "--output", "json"])
        .arg("evaluate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("{\"error\":"));
}

#[test]
fn quiet_suppresses_errors() {
    cargo_bin_cmd!("costguard")
        .args(["--config", "/nonexistent/costguard.toml", "--quiet"])
        .arg("evaluate")
        .assert()
        .code(1)
        .stderr(predicate::str::is_empty());
}

#[test]
fn unknown_trigger_source_is_a_usage_error() {
    let dir = workspace("");
    costguard(dir.path())
        .args(["shutdown", "--source", "cosmic-rays"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown trigger source"));
}

#[test]
fn bad_timestamp_is_a_usage_error() {
    cargo_bin_cmd!("costguard")
        .args(["--at", "yesterday", "evaluate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid RFC 3339 timestamp"));
}

// ──────────────────────────────────────────────
// Spend check
// ──────────────────────────────────────────────

#[test]
fn spend_below_threshold_does_nothing() {
    let dir = workspace("");
    costguard(dir.path())
        .arg("check-spend")
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily spend: 120.50 of 500"))
        .stdout(predicate::str::contains("Breach: no"));
}

#[test]
fn spend_breach_shuts_everything_down() {
    let dir = workspace("[budget]\ndaily_limit = \"100\"\n");
    let json = json_stdout(costguard(dir.path()).arg("check-spend"));

    assert_eq!(json["status_code"], 200);
    let body = &json["body"];
    assert_eq!(body["breach"], true);
    assert_eq!(body["shutdown"]["reason"], "BUDGET_BREACH");
    assert_eq!(body["shutdown"]["status"], "complete");
    assert_eq!(body["shutdown"]["terminated_count"], 3);
}

// ──────────────────────────────────────────────
// Shutdown and emergency
// ──────────────────────────────────────────────

#[test]
fn shutdown_records_the_trigger_reason() {
    let dir = workspace("");
    let json = json_stdout(costguard(dir.path()).args(["shutdown", "--source", "alarm"]));
    assert_eq!(json["body"]["reason"], "ALARM_TRIGGERED");
    assert_eq!(json["body"]["terminated_count"], 3);
}

#[test]
fn emergency_requires_the_exact_phrase() {
    let dir = workspace("");
    costguard(dir.path())
        .args(["emergency", "--confirm", "shutdown"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Shutdown cancelled"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn emergency_reads_confirmation_from_stdin() {
    let dir = workspace("");
    costguard(dir.path())
        .arg("emergency")
        .write_stdin("SHUTDOWN\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Type 'SHUTDOWN' to confirm"))
        .stdout(predicate::str::contains(
            "Shutdown (MANUAL_EMERGENCY): complete",
        ))
        .stdout(predicate::str::contains("Instances terminated:    3"));
}

#[test]
fn emergency_with_empty_stdin_is_cancelled() {
    let dir = workspace("");
    costguard(dir.path())
        .arg("emergency")
        .write_stdin("")
        .assert()
        .code(2);
}

#[test]
fn unreachable_inventory_falls_back_to_known_instances() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("costguard.toml"),
        "[provider]\nkind = \"http\"\nendpoint = \"http://127.0.0.1:1\"\n",
    )
    .unwrap();
    fs::write(dir.path().join("known.txt"), "i-a\ni-b\n").unwrap();

    let json = json_stdout(
        costguard(dir.path())
            .arg("--known-instances")
            .arg(dir.path().join("known.txt"))
            .args(["shutdown", "--source", "schedule"]),
    );
    let body = &json["body"];
    assert_eq!(body["reason"], "SCHEDULED_SHUTDOWN");
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["terminated_count"], 0);
    assert!(!body["failures"].as_array().unwrap().is_empty());
}

// ──────────────────────────────────────────────
// Tag policy and instance cap
// ──────────────────────────────────────────────

#[test]
fn evaluate_reports_verdicts_without_acting() {
    let dir = workspace("");
    let json = json_stdout(costguard(dir.path()).arg("evaluate"));

    let verdicts = json["body"].as_array().unwrap();
    assert_eq!(verdicts.len(), 3);
    let action = |id: &str| {
        verdicts
            .iter()
            .find(|v| v["resource_id"] == id)
            .map(|v| v["action"].clone())
            .unwrap()
    };
    assert_eq!(action("i-old"), "terminate");
    assert_eq!(action("i-new"), "warn");
    assert_eq!(action("i-ok"), "none");
}

#[test]
fn enforce_tags_terminates_expired_and_marks_young() {
    let dir = workspace("");
    let json = json_stdout(costguard(dir.path()).arg("enforce-tags"));

    let body = &json["body"];
    assert_eq!(body["violations_found"], 2);
    assert_eq!(body["instances_terminated"], 1);
    assert_eq!(body["instances_tagged"], 1);
    assert_eq!(body["escalation"]["reason"], "TAG_ENFORCEMENT");
}

#[test]
fn enforce_limit_stops_the_newest() {
    let dir = workspace("[budget]\nmax_instances = 1\n");
    let json = json_stdout(costguard(dir.path()).arg("enforce-limit"));

    let body = &json["body"];
    assert_eq!(body["running_count"], 3);
    assert_eq!(body["excess_ids"], serde_json::json!(["i-new", "i-ok"]));
    assert_eq!(body["escalation"]["stopped_count"], 2);
    assert_eq!(body["escalation"]["reason"], "INSTANCE_LIMIT");
}

#[test]
fn enforce_limit_within_cap_reports_no_excess() {
    let dir = workspace("");
    costguard(dir.path())
        .arg("enforce-limit")
        .assert()
        .success()
        .stdout(predicate::str::contains("Running instances: 3 (cap 10)"))
        .stdout(predicate::str::contains("Within cap"));
}
