// Integration tests for the miniprof binary
// Each test writes a trace file with the library, then inspects it via the CLI.

use assert_cmd::Command;
use miniprof::event::Event;
use miniprof::persistence;
use miniprof::time::Timestamp;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn us(n: u64) -> Timestamp {
    Timestamp::from_duration(Duration::from_micros(n))
}

/// outer(0x10) calls inner(0x20) twice
fn write_trace(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("trace.bin");
    let events = [
        Event::entry(0x10, 0, us(0)),
        Event::entry(0x20, 1, us(100)),
        Event::exit(0x20, 1, us(300)),
        Event::entry(0x20, 1, us(400)),
        Event::exit(0x20, 1, us(500)),
        Event::exit(0x10, 0, us(1000)),
    ];
    persistence::save(&path, &events).unwrap();
    path
}

fn miniprof() -> Command {
    Command::cargo_bin("miniprof").unwrap()
}

// ============================================================================
// report
// ============================================================================

#[test]
fn test_report_text_table() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    miniprof()
        .arg("report")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("self(us)"))
        .stdout(predicate::str::contains("0x10"))
        .stdout(predicate::str::contains("700.000"))
        .stdout(predicate::str::contains("max depth 2"));
}

#[test]
fn test_report_json() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    let output = miniprof()
        .args(["report", "--format", "json", "--unit", "ms"])
        .arg(&trace)
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["format"], "miniprof-json-v1");
    assert_eq!(value["unit"], "ms");
    assert_eq!(value["functions"][0]["address"], "0x10");
    assert_eq!(value["functions"][0]["self"], 0.7);
    assert_eq!(value["functions"][1]["count"], 2);
}

#[test]
fn test_report_csv() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    miniprof()
        .args(["report", "--format", "csv", "--unit", "ns"])
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "address,name,count,completed,total_ns,children_ns,self_ns,min_ns,max_ns",
        ))
        .stdout(predicate::str::contains("0x20,,2,2,300000,0,300000,100000,200000"));
}

#[test]
fn test_report_filter_by_address() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    miniprof()
        .args(["report", "--format", "csv", "--filter", "^0x20$"])
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("0x20,"))
        .stdout(predicate::str::contains("0x10,").not());
}

#[test]
fn test_report_invalid_filter() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    miniprof()
        .args(["report", "--filter", "("])
        .arg(&trace)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --filter regex"));
}

#[test]
fn test_report_corrupt_trace_prints_partial_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.bin");
    let events = [
        Event::entry(0x10, 0, us(0)),
        Event::exit(0x10, 0, us(50)),
        Event::exit(0x30, 0, us(60)),
    ];
    persistence::save(&path, &events).unwrap();

    miniprof()
        .arg("report")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("0x10"))
        .stderr(predicate::str::contains("partial"));
}

// ============================================================================
// dump / symbols
// ============================================================================

#[test]
fn test_dump_text() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    miniprof()
        .arg("dump")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("> entry"))
        .stdout(predicate::str::contains("< exit"))
        .stdout(predicate::str::contains("0.000100000"))
        .stdout(predicate::str::contains("6 events, max depth 1"));
}

#[test]
fn test_dump_csv() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    miniprof()
        .args(["dump", "--format", "csv"])
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("exit,1,0x20,0x0,0.000300000,200.000,"));
}

#[test]
fn test_dump_json() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    let output = miniprof()
        .args(["dump", "--format", "json"])
        .arg(&trace)
        .output()
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["events"].as_array().unwrap().len(), 6);
    assert_eq!(value["max_depth"], 1);
}

#[test]
fn test_symbols_lists_distinct_functions() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    let output = miniprof().arg("symbols").arg(&trace).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 3);
    assert!(stdout.contains("0x10"));
    assert!(stdout.contains("0x20"));
}

// ============================================================================
// errors
// ============================================================================

#[test]
fn test_missing_trace_file() {
    miniprof()
        .args(["report", "/nonexistent/trace.bin"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load trace file"));
}

#[test]
fn test_garbage_trace_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.bin");
    fs::write(&path, b"\x02").unwrap();

    miniprof()
        .arg("dump")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt"));
}

#[test]
fn test_missing_binary_for_names() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    miniprof()
        .arg("symbols")
        .arg(&trace)
        .args(["--binary", "/nonexistent/app"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Binary does not exist"));
}

#[test]
fn test_debug_flag_logs_to_stderr() {
    let dir = TempDir::new().unwrap();
    let trace = write_trace(&dir);

    miniprof()
        .args(["--debug", "dump"])
        .arg(&trace)
        .assert()
        .success()
        .stderr(predicate::str::contains("trace loaded"));
}
