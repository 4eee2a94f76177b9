//! Integration tests for the `bleq` CLI binary.
//!
//! Everything runs against the built-in simulated radio, with config
//! isolated to a temporary directory.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const HEART_RATE: &str = "0000180d-0000-1000-8000-00805f9b34fb";
const BATTERY: &str = "0000180f-0000-1000-8000-00805f9b34fb";

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `bleq` binary with env isolation.
///
/// Clears every `BLEQ_*` variable and points the config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn bleq_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("bleq");
    cmd.env("HOME", "/tmp/bleq-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/bleq-cli-test-nonexistent")
        .env("BLEQ_DEFAULTS__ADVERTISE_INTERVAL_MS", "20")
        .env_remove("BLEQ_PROFILE")
        .env_remove("BLEQ_OUTPUT")
        .env_remove("BLEQ_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

/// Same as [`bleq_cmd`], reading `contents` as the config file.
fn bleq_with_config(dir: &Path, contents: &str) -> (assert_cmd::Command, PathBuf) {
    let path = dir.join("config.toml");
    std::fs::write(&path, contents).unwrap();
    let mut cmd = bleq_cmd();
    cmd.arg("--config").arg(&path);
    (cmd, path)
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = bleq_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    bleq_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("scan")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn test_version_flag() {
    bleq_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bleq"));
}

#[test]
fn test_invalid_scan_mode_is_a_usage_error() {
    bleq_cmd()
        .args(["scan", "--mode", "warp"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown scan mode"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    bleq_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    bleq_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");

    bleq_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_path_defaults_to_config_toml() {
    bleq_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_resolves_profile() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = bleq_with_config(
        dir.path(),
        r#"
        default_profile = "lab"

        [profiles.lab]
        devices = 5
        bonded = ["aa-bb-cc-dd-ee-01"]
        "#,
    );

    cmd.args(["config", "show"]).assert().success().stdout(
        predicate::str::contains("lab")
            .and(predicate::str::contains("Simulated devices:      5"))
            .and(predicate::str::contains("aa-bb-cc-dd-ee-01")),
    );
}

#[test]
fn test_unknown_profile_lists_available_ones() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = bleq_with_config(dir.path(), "[profiles.lab]\ndevices = 1\n");

    let output = cmd
        .args(["--profile", "garage", "config", "show"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("garage"), "{text}");
    assert!(text.contains("lab"), "{text}");
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    bleq_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    bleq_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("already exists"));

    bleq_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

// ── Devices ─────────────────────────────────────────────────────────

#[test]
fn test_devices_lists_bonded_addresses() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = bleq_with_config(
        dir.path(),
        "[profiles.default]\nbonded = [\"aa-bb-cc-dd-ee-01\", \"AABBCCDDEE02\"]\n",
    );

    cmd.args(["-o", "plain", "devices"])
        .assert()
        .success()
        .stdout("AA:BB:CC:DD:EE:01\nAA:BB:CC:DD:EE:02\n");
}

#[test]
fn test_devices_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let (mut cmd, _) = bleq_with_config(
        dir.path(),
        "[profiles.default]\nbonded = [\"aa:bb:cc:dd:ee:01\"]\n",
    );

    let output = cmd.args(["-o", "json", "devices"]).output().unwrap();
    assert!(output.status.success());
    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(devices[0]["address"], "AA:BB:CC:DD:EE:01");
}

// ── Scanning ────────────────────────────────────────────────────────

#[test]
fn test_scan_prints_advertisements() {
    bleq_cmd()
        .args(["-o", "plain", "scan", "--duration", "1s"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("0C:B1:E0:00:00:00")
                .and(predicate::str::contains("0C:B1:E0:00:00:01"))
                .and(predicate::str::contains("0C:B1:E0:00:00:02")),
        );
}

#[test]
fn test_scan_filters_by_every_requested_service() {
    let output = bleq_cmd()
        .args(["-o", "plain", "scan", "--duration", "1s"])
        .args(["--service", HEART_RATE, "--service", BATTERY])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0C:B1:E0:00:00:00"), "{stdout}");
    assert!(!stdout.contains("0C:B1:E0:00:00:01"), "{stdout}");
    assert!(!stdout.contains("0C:B1:E0:00:00:02"), "{stdout}");
}

#[test]
fn test_scan_json_streams_one_object_per_line() {
    let output = bleq_cmd()
        .args(["-o", "json", "scan", "--duration", "1s"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next().unwrap();
    let result: serde_json::Value = serde_json::from_str(first).unwrap();
    assert!(result["device"]["address"].is_string());
    assert!(result["rssi"].is_i64());
}

#[test]
fn test_scan_table_summarizes_devices() {
    bleq_cmd()
        .args(["-o", "table", "scan", "--duration", "1s"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Address")
                .and(predicate::str::contains("sim-0"))
                .and(predicate::str::contains("180D")),
        );
}

#[test]
fn test_power_off_fails_shared_scan_with_exit_code_3() {
    bleq_cmd()
        .args(["-o", "plain", "scan", "--duration", "10s", "--power-off-after", "300ms"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("disabled"));
}

#[test]
fn test_power_off_leaves_settings_scan_running() {
    bleq_cmd()
        .args(["-o", "plain", "scan", "--duration", "1s", "--power-off-after", "200ms"])
        .args(["--mode", "low-latency"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0C:B1:E0:00:00:00"));
}
