//! Smoke tests -- verify the binary runs and key subcommands work.

use assert_cmd::Command;
use predicates::prelude::*;

fn replay_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("replay.jsonl");
    std::fs::write(
        &path,
        "{\"faultNumber\": 4, \"sample\": 19, \"detector_score\": 0.9, \"diagnosis_code\": 4}\n\
         {\"faultNumber\": 4, \"sample\": 20, \"detector_score\": 0.9, \"diagnosis_code\": 4}\n\
         {\"faultNumber\": 4, \"sample\": 21, \"detector_score\": 0.2, \"diagnosis_code\": 4}\n\
         {\"faultNumber\": 4, \"sample\": 22, \"detector_score\": 0.8, \"diagnosis_code\": 4}\n\
         {\"faultNumber\": 9, \"sample\": 21, \"detector_score\": 0.9, \"diagnosis_code\": 9}\n",
    )
    .unwrap();
    path
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("reactormonitor")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fault detection and diagnosis timing"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("reactormonitor")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reactormonitor"));
}

#[test]
fn test_serve_subcommand_exists() {
    Command::cargo_bin("reactormonitor")
        .unwrap()
        .args(["serve", "--help"])
        .assert()
        .success();
}

#[test]
fn test_scenarios_lists_catalogue() {
    Command::cargo_bin("reactormonitor")
        .unwrap()
        .arg("scenarios")
        .assert()
        .success()
        .stdout(predicate::str::contains("A feed loss"))
        .stdout(predicate::str::contains("20 "));
}

#[test]
fn test_evaluate_file_summary() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = replay_file(&dir);

    Command::cargo_bin("reactormonitor")
        .unwrap()
        .args(["evaluate", "--scenario", "4", "--file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "scenario 4: detection 6 min, diagnosis 6 min (4 samples)",
        ));
}

#[test]
fn test_evaluate_file_json() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = replay_file(&dir);

    let output = Command::cargo_bin("reactormonitor")
        .unwrap()
        .args(["evaluate", "--scenario", "4", "--json", "--trace", "--file"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let out: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(out["scenario"], 4);
    assert_eq!(out["report"]["detection_delay_minutes"], 6.0);
    assert_eq!(out["report"]["diagnosis_delay_minutes"], 6.0);
    assert_eq!(out["trace"].as_array().unwrap().len(), 4);
}

#[test]
fn test_evaluate_rejects_unknown_scenario() {
    Command::cargo_bin("reactormonitor")
        .unwrap()
        .args(["evaluate", "--scenario", "21", "--file", "replay.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown scenario class 21"));
}

#[test]
fn test_evaluate_requires_source() {
    Command::cargo_bin("reactormonitor")
        .unwrap()
        .env_remove("REACTORMONITOR_CONFIG")
        .args(["evaluate", "--scenario", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no replay source"));
}

#[test]
fn test_broken_env_config_is_logged() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("broken-monitor.toml");
    std::fs::write(&path, "bad = [").unwrap();

    Command::cargo_bin("reactormonitor")
        .unwrap()
        .env("REACTORMONITOR_CONFIG", &path)
        .env_remove("RUST_LOG")
        .arg("scenarios")
        .assert()
        .success()
        .stdout(predicate::str::contains("A feed loss"))
        .stderr(predicate::str::contains("broken-monitor.toml"));
}
