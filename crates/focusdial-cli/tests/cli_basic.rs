//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a temporary data directory and
//! verify outputs.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusdial"))
        .args(args)
        .env("FOCUSDIAL_DATA_DIR", data_dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

/// Fresh data directory with durations read as seconds.
fn test_mode_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "timer.test_mode", "true"]);
    assert_eq!(code, 0, "enabling test mode failed: {stderr}");
    dir
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "timer.focus_duration"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "25");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "timer.break_duration", "10"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "timer.break_duration"]);
    assert_eq!(stdout.trim(), "10");

    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "timer.nope", "1"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Unknown configuration key"));

    let (stdout, _, code) = run_cli(dir.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));
}

#[test]
fn test_timer_status_starts_idle() {
    let dir = test_mode_dir();
    let output = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(output["status"]["phase"], "idle");
    assert_eq!(output["events"].as_array().unwrap().len(), 0);
}

#[test]
fn test_invalid_transition_is_reported() {
    let dir = test_mode_dir();
    let (_, stderr, code) = run_cli(dir.path(), &["timer", "pause"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Cannot pause while idle"), "stderr: {stderr}");

    let (_, stderr, code) = run_cli(dir.path(), &["timer", "start", "--minutes", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid duration"), "stderr: {stderr}");
}

#[test]
fn test_stop_confirm_records_session() {
    let dir = test_mode_dir();
    let started = run_json(dir.path(), &["timer", "start", "--minutes", "600"]);
    assert_eq!(started["status"]["phase"], "running_focus");
    assert_eq!(started["events"][0]["type"], "SessionStarted");

    let stopped = run_json(dir.path(), &["timer", "stop"]);
    assert_eq!(stopped["status"]["phase"], "awaiting_completion_confirmation");

    let confirmed = run_json(dir.path(), &["timer", "confirm"]);
    assert_eq!(confirmed["status"]["phase"], "idle");

    let history = run_json(dir.path(), &["history", "list"]);
    let sessions = history.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["kind"], "focus");
    assert_eq!(sessions[0]["is_completed"], true);
}

#[test]
fn test_break_parks_focus_and_returns() {
    let dir = test_mode_dir();
    run_json(dir.path(), &["timer", "start", "--minutes", "600"]);
    let on_break = run_json(dir.path(), &["timer", "break", "--minutes", "300"]);
    assert_eq!(on_break["status"]["phase"], "running_break");
    assert!(on_break["status"]["parked_focus_remaining_secs"].is_number());

    let back = run_json(dir.path(), &["timer", "end-break"]);
    assert_eq!(back["status"]["phase"], "running_focus");

    let abandoned = run_json(dir.path(), &["timer", "abandon"]);
    assert_eq!(abandoned["status"]["phase"], "idle");
    let history = run_json(dir.path(), &["history", "list", "--kind", "focus"]);
    assert_eq!(history[0]["is_completed"], false);
}

#[test]
fn test_task_label_and_natural_completion_with_reward() {
    let dir = test_mode_dir();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "rewards.unlock_threshold", "1"]);
    assert_eq!(code, 0);

    let task = run_json(dir.path(), &["task", "add", "Write changelog"]);
    let task_id = task["id"].as_str().unwrap().to_string();

    let started = run_json(dir.path(), &["timer", "start", "--minutes", "1", "--task", &task_id]);
    assert_eq!(started["status"]["label"], "Write changelog");

    std::thread::sleep(std::time::Duration::from_millis(1500));
    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["status"]["phase"], "idle");

    let rewards = run_json(dir.path(), &["rewards", "list"]);
    assert_eq!(rewards["unlocked"].as_array().unwrap().len(), 1);

    let tasks = run_json(dir.path(), &["task", "list"]);
    assert_eq!(tasks[0]["completed"], true);
}

#[test]
fn test_watch_settles_completion_and_persists_it() {
    let dir = test_mode_dir();
    run_json(dir.path(), &["timer", "start", "--minutes", "3"]);

    let (stdout, stderr, code) = run_cli(dir.path(), &["timer", "watch"]);
    assert_eq!(code, 0, "watch failed: {stderr}");
    assert!(stdout.contains("\"SessionCompleted\""), "stdout: {stdout}");

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["status"]["phase"], "idle");
    assert_eq!(status["events"].as_array().unwrap().len(), 0);

    let history = run_json(dir.path(), &["history", "list"]);
    assert_eq!(history.as_array().unwrap().len(), 1);
}
