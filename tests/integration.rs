//! End-to-end integration tests for the UI-test runner
//!
//! These tests drive whole scripts through the library against in-memory
//! documents, and run the `uitest` binary against the login fixture in
//! `tests/fixtures/login`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use uitest::common::config::{load_script, RunnerConfig};
use uitest::driver::Page;
use uitest::runner::{parse, RunState};
use uitest::{Error, ExecutionEngine, MemoryDocument, RunReport};

/// Directory holding the login fixture
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("login")
}

fn login_page() -> Page {
    Page::load(&fixtures_dir().join("page.yaml")).expect("Failed to load page fixture")
}

fn login_config() -> RunnerConfig {
    RunnerConfig::load(&fixtures_dir().join("testingLib.config.json"))
        .expect("Failed to load config fixture")
}

/// Run `lines` against a fresh copy of `page`
async fn run_script(
    page: &Page,
    config: &RunnerConfig,
    lines: &[&str],
) -> (MemoryDocument, Option<RunReport>) {
    let doc = MemoryDocument::from_page(page);
    let mut engine = ExecutionEngine::new(Arc::new(doc.clone()), config);
    engine.load(lines).expect("Failed to load script");
    let report = engine.run().await.expect("Run failed");
    assert_eq!(engine.state(), RunState::Reported);
    (doc, report)
}

fn status_page() -> Page {
    Page::from_yaml(
        r##"
body:
  - tag: button
    id: go
    on_click:
      - target: "#status"
        action: set_value
        value: ready
  - tag: input
    id: status
"##,
    )
    .expect("Failed to parse page")
}

fn commands(report: &RunReport) -> Vec<&str> {
    report.outcomes.iter().map(|o| o.command.as_str()).collect()
}

// ============== Library Runs ==============

#[tokio::test]
async fn test_click_then_assert() {
    let config = RunnerConfig {
        timeout: 1000,
        delay_between: 0,
        ..RunnerConfig::default()
    };

    let (_doc, report) = run_script(
        &status_page(),
        &config,
        &["click(#go)", "assertEquals(#status, ready)"],
    )
    .await;
    let report = report.expect("Expected a report");

    assert_eq!(report.passed_count(), 2);
    assert_eq!(report.failed_count(), 0);
    assert!(report.incomplete.is_empty());
    assert!(report.is_success());
}

#[tokio::test]
async fn test_missing_element_times_out() {
    let config = RunnerConfig {
        timeout: 50,
        ..RunnerConfig::default()
    };

    let (doc, report) = run_script(&status_page(), &config, &["click(#missing)"]).await;
    let report = report.expect("Expected a report");

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.failed_count(), 1);
    assert!(report.outcomes[0].message.contains("Could not find #missing"));
    assert!(report.incomplete.is_empty());
    assert!(doc.activations().is_empty());
    assert_eq!(doc.observer_count(), 0);
}

#[tokio::test]
async fn test_login_flow() {
    let config = login_config();
    let lines = config.load_script().expect("Failed to load script");
    assert_eq!(lines.len(), 9);

    let doc = MemoryDocument::from_page(&login_page());
    let mut engine = ExecutionEngine::new(Arc::new(doc.clone()), &config);
    engine.load(lines.as_slice()).expect("Failed to load script");
    let report = engine.run().await.expect("Run failed").expect("Expected a report");

    for outcome in &report.outcomes {
        assert!(outcome.succeeded, "{} failed: {}", outcome.command, outcome.message);
    }
    assert_eq!(report.passed_count(), 9);
    assert!(report.incomplete.is_empty());
    assert!(report.aborted.is_none());

    // One delay after every command, plus one after the focus check
    assert_eq!(report.delays_ms, 100);
    assert!(report.elapsed_ms >= report.delays_ms);

    // Shift, h, i on the keyboard, then the submit button
    let clicked = doc.activations();
    let expected = ["#key-shift", "#key-h", "#key-i", "#submit"]
        .iter()
        .map(|s| doc.find(s).expect("fixture element"))
        .collect::<Vec<_>>();
    assert_eq!(clicked, expected);

    assert_eq!(doc.key_downs(), vec![40]);
    assert_eq!(doc.value_of("#username").as_deref(), Some("admin"));
    assert_eq!(doc.value_of("#password").as_deref(), Some("secret"));
    assert!(doc.local_storage().is_empty());
}

#[tokio::test]
async fn test_focus_lost_leaves_rest_incomplete() {
    let config = login_config();
    let lines = load_script(&fixtures_dir().join("focus-lost.json")).expect("Failed to load script");

    let doc = MemoryDocument::from_page(&login_page());
    let mut engine = ExecutionEngine::new(Arc::new(doc.clone()), &config);
    engine.load(lines.as_slice()).expect("Failed to load script");
    let report = engine.run().await.expect("Run failed").expect("Expected a report");

    assert_eq!(commands(&report), vec!["type(#username, admin)", "keyPress(escape)"]);
    assert_eq!(report.passed_count(), 2);
    assert_eq!(
        report.incomplete,
        vec!["type(#password, secret)", "click(#submit)"]
    );
    assert_eq!(
        report.aborted.as_deref(),
        Some("Focus lost after pressing escape")
    );
    assert!(!report.is_success());

    assert!(doc.activations().is_empty());
    assert_eq!(doc.value_of("#password").as_deref(), Some(""));

    let rendered = report.render();
    assert!(rendered.contains("Unable to complete the following tests"));
    assert!(rendered.contains("click(#submit)"));
}

#[tokio::test]
async fn test_failure_does_not_stop_run() {
    let config = RunnerConfig {
        timeout: 30,
        ..login_config()
    };

    let (doc, report) = run_script(
        &login_page(),
        &config,
        &[
            "typeWithKeyboard(#keyboard, Hq)",
            "click(#nope)",
            "type(#username, admin)",
            "assertEquals(#username, root)",
        ],
    )
    .await;
    let report = report.expect("Expected a report");

    assert_eq!(report.outcomes.len(), 4);
    assert_eq!(report.failed_count(), 3);
    assert!(report.outcomes[0].message.starts_with("[typeWithKeyboard]"));
    assert!(report.outcomes[2].succeeded);
    assert!(report.incomplete.is_empty());

    // The unknown glyph rejected the whole string before any click
    assert!(doc.activations().is_empty());
    assert_eq!(doc.value_of("#username").as_deref(), Some("admin"));
}

#[tokio::test]
async fn test_wait_for_element_added_later() {
    let config = RunnerConfig {
        timeout: 1000,
        ..RunnerConfig::default()
    };

    let (doc, report) = run_script(
        &login_page(),
        &config,
        &["click(#submit)", "waitForElement(#welcome)"],
    )
    .await;
    let report = report.expect("Expected a report");

    assert_eq!(report.passed_count(), 2);
    assert!(doc.find("#welcome").is_some());
    assert_eq!(doc.observer_count(), 0);
}

#[tokio::test]
async fn test_unreported_script_yields_no_report() {
    let config = login_config();
    let (doc, report) = run_script(&login_page(), &config, &["wait(5)", "generateReport()"]).await;

    assert!(report.is_none());
    // Local storage is still cleared at the end of the run
    assert!(doc.local_storage().is_empty());
}

#[test]
fn test_load_reports_bad_line() {
    let doc = MemoryDocument::new();
    let mut engine = ExecutionEngine::new(Arc::new(doc), &RunnerConfig::default());

    let err = engine
        .load(&["click(#a)", "wait(soon)"])
        .expect_err("Expected a load error");
    assert!(matches!(err, Error::ScriptLine { line: 2, .. }));
}

#[test]
fn test_parsed_commands_print_back() {
    for line in ["click(#go)", "type(#name,Ada)", "beaconStart()"] {
        let command = parse(line).expect("Failed to parse");
        assert_eq!(command.to_string(), line);
    }
}

// ============== Configuration ==============

#[test]
fn test_config_resolves_script_next_to_config() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config_path = dir.path().join("testingLib.config.json");
    fs::write(
        &config_path,
        r#"{ "keyMap": { "ok": 13 }, "testFile": "smoke.json" }"#,
    )
    .expect("Failed to write config");
    fs::write(dir.path().join("smoke.json"), r#"["keyPress(ok)", "wait(10)"]"#)
        .expect("Failed to write script");

    let config = RunnerConfig::load(&config_path).expect("Failed to load config");
    assert_eq!(config.timeout, 5000);
    assert_eq!(config.key_map.get("ok"), Some(&13));
    assert_eq!(config.script_path(), dir.path().join("smoke.json"));
    assert_eq!(
        config.load_script().expect("Failed to load script"),
        vec!["keyPress(ok)", "wait(10)"]
    );
}

#[test]
fn test_config_missing_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    assert!(RunnerConfig::load(&dir.path().join("absent.json")).is_err());
}

// ============== Binary ==============

fn uitest(args: &[&str], cwd: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_uitest"))
        .args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run uitest")
}

#[test]
fn test_cli_run_login_fixture() {
    let dir = fixtures_dir();
    let output = uitest(
        &["run", "-c", "testingLib.config.json", "-p", "page.yaml", "--json"],
        &dir,
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Expected JSON report");
    assert_eq!(report["outcomes"].as_array().map(Vec::len), Some(9));
    assert_eq!(report["incomplete"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_cli_run_exits_nonzero_on_abort() {
    let dir = fixtures_dir();
    let output = uitest(
        &[
            "run",
            "-c",
            "testingLib.config.json",
            "-p",
            "page.yaml",
            "--script",
            "focus-lost.json",
        ],
        &dir,
    );
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Testing Report"));
    assert!(stdout.contains("type(#password, secret)"));
}

#[test]
fn test_cli_check_rejects_unknown_command() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let script = dir.path().join("bad.json");
    fs::write(&script, r#"["click(#a)", "hover(#b)"]"#).expect("Failed to write script");

    let output = uitest(&["check", script.to_str().expect("utf-8 path")], dir.path());
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Script line 2"), "stderr: {}", stderr);
}

#[test]
fn test_cli_lists_commands() {
    let output = uitest(&["commands", "--json"], &fixtures_dir());
    assert!(output.status.success());

    let list: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Expected JSON list");
    let names: Vec<&str> = list
        .as_array()
        .expect("Expected array")
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert!(names.contains(&"typeWithKeyboard"));
    assert!(names.contains(&"checkFocus"));
}
