//! Exit status and output of the mockery-harness binary

use std::io::Write;
use std::process::{Command, Output};

fn harness(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mockery-harness"))
        .args(args)
        .env_remove("MOCKERY_HEAP_LIMIT")
        .env_remove("MOCKERY_REPORT_FORMAT")
        .env_remove("MOCKERY_QUIET")
        .env_remove("MOCKERY_ALLOC_FILL")
        .output()
        .unwrap()
}

#[test]
fn test_list_names_every_suite() {
    let output = harness(&["list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["user_age", "linked_list", "fixture", "calculator", "forward_progress"] {
        assert!(stdout.contains(name), "missing {name} in {stdout}");
    }
}

#[test]
fn test_passing_suites_exit_zero() {
    let output = harness(&["run", "user_age", "fixture"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("get_user_age_success: Test completed successfully."));
    assert!(stdout.contains("All 3 tests passed"));
}

#[test]
fn test_failing_suite_exits_one() {
    let output = harness(&["run", "forward_progress", "--quiet"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("5 out of 9 tests failed!"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Starting test"));
}

#[test]
fn test_json_report() {
    let output = harness(&["run", "calculator", "--format", "json"]);
    assert_eq!(output.status.code(), Some(0));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["reports"][0]["suite"], "calculator");
    assert_eq!(summary["reports"][0]["tests_executed"], 7);
}

#[test]
fn test_config_file_heap_limit() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "heap_limit = 16\nquiet = true").unwrap();
    let path = file.path().to_str().unwrap();

    let output = harness(&["--config", path, "run", "linked_list"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("out of tracked memory"));
}

#[test]
fn test_unknown_suite_is_an_error() {
    let output = harness(&["run", "does_not_exist"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no demo suite named does_not_exist"));
}
