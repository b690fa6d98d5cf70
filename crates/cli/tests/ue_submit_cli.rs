// SPDX-License-Identifier: Apache-2.0
//! Process-level checks for the `ue-submit` binary's JSON-line contract.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;

#[test]
fn missing_spec_file_exits_nonzero_with_json_error() {
    let mut cmd = Command::cargo_bin("ue-submit").unwrap();
    let assert = cmd.args(["submit", "--spec", "/nonexistent/submit_spec.json"]).assert().failure();
    let output = assert.get_output();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().expect("one JSON line on stdout");
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(value["ok"], serde_json::json!(false));
    assert!(value["error"].as_str().unwrap().contains("not found"));
}

#[test]
fn submit_without_subcommand_exits_nonzero() {
    let mut cmd = Command::cargo_bin("ue-submit").unwrap();
    cmd.assert().failure();
}
