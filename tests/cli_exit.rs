//! Exit codes of the compiled binary, as seen by the scheduled job.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_walmart-liquidations"));
    cmd.env_remove("RUST_LOG").env_remove("LIQUIDATIONS_OUTPUT");
    cmd
}

fn tmp_dir(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("walmart_liquidations_cli_{name}"));
    let _ = fs::remove_dir_all(&p);
    fs::create_dir_all(&p).unwrap();
    p
}

#[test]
fn demo_run_exits_zero_and_writes_json() {
    let out = tmp_dir("demo").join("data").join("liquidations.json");
    let status = bin().arg("--demo").arg("--output").arg(&out).status().unwrap();
    assert!(status.success());

    let doc: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert!(!doc["items"].as_array().unwrap().is_empty());
    assert_eq!(doc["source"], "demo");
}

#[test]
fn demo_without_output_prints_json() {
    let output = bin().arg("--demo").output().unwrap();
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["stores"].as_array().unwrap().len(), 2);
}

#[test]
fn write_failure_exits_non_zero() {
    let dir = tmp_dir("blocked");
    let out = dir.join("liquidations.json");
    fs::write(&out, "previous run").unwrap();
    fs::create_dir_all(dir.join("liquidations.json.tmp")).unwrap();

    let status = bin().arg("--demo").arg("--output").arg(&out).status().unwrap();
    assert_eq!(status.code(), Some(1));
    assert_eq!(fs::read_to_string(&out).unwrap(), "previous run");
}

#[test]
fn missing_output_is_a_usage_error() {
    let status = bin().status().unwrap();
    assert!(!status.success());
}

#[test]
fn empty_result_exits_two_only_when_asked() {
    let out = tmp_dir("empty").join("liquidations.json");
    // nothing listens on port 9; every store fails fast
    let args = [
        "--endpoint",
        "http://127.0.0.1:9/api/seo/catalog/search",
        "--retries",
        "0",
        "--timeout",
        "2",
        "--delay",
        "0",
    ];

    let status = bin().args(args).arg("--output").arg(&out).status().unwrap();
    assert_eq!(status.code(), Some(0));
    let doc: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert!(doc["items"].as_array().unwrap().is_empty());

    let status = bin()
        .args(args)
        .arg("--output")
        .arg(&out)
        .arg("--fail-on-empty")
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
}
