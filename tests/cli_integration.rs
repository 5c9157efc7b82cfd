//! CLI smoke tests against the built `rui` binary.

mod common;

use std::fs;

use serde_json::Value;

fn assert_success(result: &common::CmdResult) {
    assert!(
        result.status.success(),
        "expected success; log: {}",
        result.log_path.display()
    );
}

#[test]
fn help_command_prints_usage() {
    let result = common::run_cli_case("help_command_prints_usage", &["--help"]);
    assert_success(&result);
    assert!(
        result.stdout.contains("Usage: rui [OPTIONS] <COMMAND>"),
        "missing help banner; log: {}",
        result.log_path.display()
    );
}

#[test]
fn version_command_prints_version() {
    let result = common::run_cli_case("version_command_prints_version", &["--version"]);
    assert_success(&result);
    assert!(result.stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn scripted_recovery_run_boots_the_inserted_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let profile = dir.path().join("device.toml");
    fs::write(
        &profile,
        "mode = \"manual_recovery\"\n\n[[removable]]\nat_ms = 100\nstate = \"valid\"\n",
    )
    .expect("write profile");

    let result = common::run_cli_case(
        "scripted_recovery_run",
        &[
            "run",
            "--profile",
            profile.to_str().expect("utf-8 path"),
            "--script",
            "idle",
        ],
    );
    assert_success(&result);
    let json = common::stdout_json(&result);
    assert_eq!(json["command"], "run");
    assert_eq!(json["report"]["mode"], "manual_recovery");
    assert_eq!(
        json["report"]["outcome"]["booted"]["target"],
        "recovery_disk"
    );
    assert!(json["frames"].as_array().is_some_and(|f| !f.is_empty()));
}

#[test]
fn diagnostics_run_reports_the_event_log_payload() {
    let result = common::run_cli_case(
        "diagnostics_run",
        &[
            "run",
            "--mode",
            "diagnostics",
            "--script",
            "enter",
            "--max-iterations",
            "10",
        ],
    );
    assert_success(&result);
    let json = common::stdout_json(&result);
    assert_eq!(json["report"]["outcome"], "shutdown");
    assert_eq!(json["iterations"], 10);
    let events = json["report"]["diag_events"].as_array().expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["test"], "storage_health");
    assert_eq!(events[0]["result"], "passed");
    let hex = json["elog_payload_hex"].as_str().expect("payload hex");
    assert!(hex.starts_with("020101"), "payload {hex}");
}

#[test]
fn run_without_script_needs_a_terminal() {
    let result = common::run_cli_case("run_without_script", &["run"]);
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("not a terminal"));
}

#[test]
fn bad_script_token_is_a_user_error() {
    let result = common::run_cli_case("bad_script_token", &["run", "--script", "up sideways"]);
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("sideways"));
}

#[test]
fn report_decode_round_trips_a_payload() {
    let result = common::run_cli_case(
        "report_decode",
        &["report", "decode", "02 02010500 0x04040000"],
    );
    assert_success(&result);
    let json = common::stdout_json(&result);
    let events = json["events"].as_array().expect("events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["test"], "storage_test_short");
    assert_eq!(events[0]["result"], "passed");
    assert_eq!(events[0]["elapsed_s"], 5);
    assert_eq!(events[1]["test"], "memory_quick");
    assert_eq!(events[1]["result"], "aborted");
}

#[test]
fn report_decode_rejects_odd_hex() {
    let result = common::run_cli_case("report_decode_odd", &["report", "decode", "020"]);
    assert_eq!(result.status.code(), Some(1));
}

#[test]
fn report_decode_rejects_non_ascii_input() {
    let result = common::run_cli_case("report_decode_non_ascii", &["report", "decode", "a\u{e9}0"]);
    assert_eq!(result.status.code(), Some(1));
    assert!(result.stderr.contains("invalid hex digit"));
}

#[test]
fn paginate_reports_pages_and_anchors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = dir.path().join("firmware.log");
    let mut text = String::new();
    for boot in 0..2 {
        text.push_str(&format!("coreboot-4.{boot} starting\n"));
        for line in 0..9 {
            text.push_str(&format!("step {line}\n"));
        }
    }
    fs::write(&log, text).expect("write log");
    let path = log.to_str().expect("utf-8 path");

    let result = common::run_cli_case(
        "paginate",
        &["paginate", path, "--lines", "5", "--page", "2"],
    );
    assert_success(&result);
    let json = common::stdout_json(&result);
    assert_eq!(json["page"], 2);
    assert_eq!(json["page_count"], 4);
    assert_eq!(json["anchor_total"], 2);
    assert!(json["text"].as_str().is_some_and(|t| t.contains("coreboot-4.1")));

    let out_of_range = common::run_cli_case(
        "paginate_out_of_range",
        &["paginate", path, "--lines", "5", "--page", "9"],
    );
    assert_eq!(out_of_range.status.code(), Some(1));
}

#[test]
fn screens_lists_the_registry() {
    let result = common::run_cli_case("screens", &["screens"]);
    assert_success(&result);
    let json = common::stdout_json(&result);
    let rows = json["screens"].as_array().expect("rows");
    assert_eq!(rows.len(), 25);
    let names: Vec<&str> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
    assert!(names.contains(&"developer_mode"));
    let language = rows
        .iter()
        .find(|r| r["name"] == "language_select")
        .expect("language row");
    assert_eq!(language["items"], Value::from("dynamic"));
}

#[test]
fn config_commands_report_defaults() {
    let path = common::run_cli_case("config_path", &["config", "path"]);
    assert_success(&path);
    let json = common::stdout_json(&path);
    assert_eq!(json["exists"], false);
    assert!(
        json["path"]
            .as_str()
            .is_some_and(|p| p.ends_with("rui/config.toml"))
    );

    let show = common::run_cli_case("config_show", &["config", "show"]);
    assert_success(&show);
    let json = common::stdout_json(&show);
    assert_eq!(json["config"]["ui"]["key_delay_ms"], 20);
    assert!(json["hash"].as_str().is_some_and(|h| !h.is_empty()));
}

#[test]
fn invalid_config_fails_validation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("config.toml");
    fs::write(&config, "[ui]\nkey_delay_ms = \"fast\"\n").expect("write config");

    let result = common::run_cli_case(
        "invalid_config",
        &["config", "validate", "--config", config.to_str().expect("utf-8 path")],
    );
    assert_eq!(result.status.code(), Some(1));
    let json = common::stdout_json(&result);
    assert_eq!(json["valid"], false);
}
