//! Integration tests for the compiled agent binary.
//!
//! The agent is a long-running daemon, so these tests cover the startup
//! surface only: CLI parsing and the fatal config-load path. The loop itself
//! is exercised by the unit tests of the library modules.

use std::path::PathBuf;
use std::process::Command;

/// Path to the compiled binary.
fn binary() -> PathBuf {
    // Prefer the current exe's directory (works inside cargo test).
    let mut p = std::env::current_exe().expect("current exe");
    p.pop(); // remove test binary name
    if p.ends_with("deps") {
        p.pop();
    }
    p.push("scanhive-agent");
    if cfg!(windows) {
        p.set_extension("exe");
    }
    p
}

fn run(args: &[&str]) -> std::process::Output {
    Command::new(binary())
        .args(args)
        .output()
        .expect("run binary")
}

#[test]
fn missing_config_file_is_fatal() {
    let output = run(&["-c", "/nonexistent/agent_config.json"]);
    assert!(
        !output.status.success(),
        "missing config must exit non-zero"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("agent_config.json"),
        "stderr should name the config file: {stderr}"
    );
}

#[test]
fn malformed_config_file_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("agent_config.json");
    std::fs::write(&config_path, "{not json").expect("write config");

    let output = run(&["-c", config_path.to_str().expect("utf-8 path")]);
    assert!(
        !output.status.success(),
        "malformed config must exit non-zero"
    );
}

#[test]
fn invalid_config_values_are_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("agent_config.json");
    std::fs::write(
        &config_path,
        r#"{
            "master_address": "https://master.example.org",
            "master_port": 443,
            "scan_agent": "agent-1",
            "api_token": "t",
            "http_useragent": "ua",
            "scan_results_dir": "/tmp/results",
            "target_files_dir": "/tmp/targets",
            "supported_scan_binaries": ["masscan", "nmap"],
            "log_verbosity": 3,
            "number_of_threads": 0,
            "callback_interval_in_seconds": 60
        }"#,
    )
    .expect("write config");

    let output = run(&["-c", config_path.to_str().expect("utf-8 path")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("number_of_threads"),
        "stderr should name the invalid field: {stderr}"
    );
}

#[test]
fn help_names_the_config_flag() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("-c"), "help should list -c: {stdout}");
    assert!(
        stdout.contains("agent_config.json"),
        "help should show the default config path: {stdout}"
    );
}
