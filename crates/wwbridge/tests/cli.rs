#![cfg(all(unix, feature = "cli"))]

use std::process::{Command, Output};

use serde_json::Value;

fn wwbridge(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wwbridge"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .env_remove("WWBRIDGE_ROLE")
        .output()
        .expect("wwbridge should run")
}

fn reports(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be a JSON report"))
        .collect()
}

#[test]
fn version_prints_package_version() {
    let output = wwbridge(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("wwbridge {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn demo_calls_every_worker_function() {
    let output = wwbridge(&["demo", "--delay", "10ms"]);
    assert_eq!(output.status.code(), Some(0));

    let reports = reports(&output);
    let names: Vec<_> = reports.iter().map(|r| r["name"].as_str().unwrap_or_default()).collect();
    assert_eq!(names, vec!["test1", "test2", "test3", "test4"]);

    assert_eq!(reports[0]["value"], "2000 123");
    assert_eq!(reports[1]["error"]["message"], "1000 Error in promise");
    assert_eq!(reports[2]["value"], "1001 cba");
    assert_eq!(reports[3]["error"]["message"], "1002 Error in function");
    assert_eq!(reports[3]["ok"], false);
}

#[test]
fn call_returns_worker_value() {
    let output = wwbridge(&["call", "test3", "--args", r#"["x","y","z"]"#]);
    assert_eq!(output.status.code(), Some(0));
    let reports = reports(&output);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["value"], "1000 zyx");
}

#[test]
fn raised_error_exits_with_failure() {
    let output = wwbridge(&["call", "test4"]);
    assert_eq!(output.status.code(), Some(1));
    let reports = reports(&output);
    assert_eq!(reports[0]["error"]["name"], "Error");
    assert!(reports[0]["error"]["fileName"].is_string());
}

#[test]
fn unknown_function_is_usage_error() {
    let output = wwbridge(&["call", "nope"]);
    assert_eq!(output.status.code(), Some(64));
    assert_eq!(reports(&output)[0]["error"]["name"], "ReferenceError");
}

#[test]
fn slow_call_times_out() {
    let output = wwbridge(&["call", "test1", "--timeout", "50ms", "--delay", "5s"]);
    assert_eq!(output.status.code(), Some(124));
    assert_eq!(reports(&output)[0]["error"]["name"], "TimeoutError");
}

#[test]
fn demo_exit_status_reflects_timeouts() {
    let output = wwbridge(&["demo", "--timeout", "50ms", "--delay", "5s"]);
    assert_eq!(output.status.code(), Some(124));
    let reports = reports(&output);
    assert_eq!(reports.len(), 4);
    assert_eq!(reports[0]["error"]["name"], "TimeoutError");
    assert_eq!(reports[1]["error"]["name"], "TimeoutError");
    assert_eq!(reports[2]["ok"], true);
    assert_eq!(reports[3]["error"]["name"], "Error");
}

#[test]
fn malformed_args_are_rejected() {
    let output = wwbridge(&["call", "test3", "--args", "{}"]);
    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("JSON array"));
}
