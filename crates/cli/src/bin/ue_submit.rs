// SPDX-License-Identifier: Apache-2.0
//! Submitter-side entrypoint: validates a `submit_spec.json` against the
//! documented schema and probes Cuebot connectivity.
//!
//! Actual job dispatch to Cuebot goes through PyOutline/gRPC on the
//! Cuebot side and is out of scope here (see the system overview) — this
//! binary's contract is schema validation plus the connectivity probe
//! the outer scheduler uses before handing a job to the real submitter.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "opencue-ue-submit", about = "Submit UE render jobs to OpenCue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a job using submit_spec.json.
    Submit {
        #[arg(long)]
        spec: String,
    },
    /// Test connection to Cuebot.
    Test {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 8443)]
        port: u16,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (result, ok) = match cli.command {
        Command::Submit { spec } => cmd_submit(&spec),
        Command::Test { host, port } => cmd_test(&host, port),
    };

    println!("{result}");
    if ok {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    }
}

fn ok_result(job_id: Option<String>, opencue_job_ids: Vec<String>) -> Value {
    let mut body = json!({ "ok": true });
    if let Some(id) = job_id {
        body["job_id"] = json!(id);
    }
    if !opencue_job_ids.is_empty() {
        body["opencue_job_ids"] = json!(opencue_job_ids);
    }
    body
}

fn error_result(error: impl Into<String>, hint: impl Into<String>) -> Value {
    json!({ "ok": false, "error": error.into(), "hint": hint.into() })
}

fn cmd_submit(spec_path: &str) -> (Value, bool) {
    let path = Path::new(spec_path);
    if !path.exists() {
        let result = error_result(
            format!("Spec file not found: {}", path.display()),
            "Ensure the submit_spec.json file exists at the specified path.",
        );
        return (result, false);
    }

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            let result = error_result(
                format!("Failed to read spec file: {err}"),
                "Check file permissions for submit_spec.json.",
            );
            return (result, false);
        }
    };

    let spec: Value = match serde_json::from_str(&text) {
        Ok(spec) => spec,
        Err(err) => {
            let result = error_result(
                format!("Invalid JSON in spec file: {err}"),
                "Check the submit_spec.json for syntax errors.",
            );
            return (result, false);
        }
    };

    if let Some(err) = validate_spec(&spec) {
        let result = error_result(err, "Check submit_spec.json against the schema.");
        return (result, false);
    }

    // Cuebot job dispatch itself runs through PyOutline/gRPC on the
    // scheduler side; this binary only validates the spec and resolves
    // the job id the outer system already assigned via the plan uri.
    let job_id = job_id_from_plan_uri(&spec);
    let result = ok_result(job_id, Vec::new());
    (result, true)
}

fn cmd_test(host: &str, port: u16) -> (Value, bool) {
    let addr = format!("{host}:{port}");
    let resolved = match addr.to_socket_addrs() {
        Ok(mut addrs) => addrs.next(),
        Err(_) => None,
    };

    let Some(addr) = resolved else {
        let result = error_result(
            format!("Failed to resolve Cuebot host {host}:{port}"),
            "Verify Cuebot host/port and network connectivity.",
        );
        return (result, false);
    };

    match TcpStream::connect_timeout(&addr, Duration::from_secs(5)) {
        Ok(_) => {
            let mut body = ok_result(None, Vec::new());
            body["hint"] = json!(format!("Connected to {host}:{port}."));
            (body, true)
        }
        Err(err) => {
            let result = error_result(
                format!("Failed to connect to Cuebot at {host}:{port}: {err}"),
                "Verify Cuebot host/port and network connectivity.",
            );
            (result, false)
        }
    }
}

/// Mirrors the required-field checks the original submitter applied
/// before handing the spec to PyOutline.
fn validate_spec(spec: &Value) -> Option<String> {
    for key in ["cuebot", "show", "user", "job", "plan", "opencue"] {
        if spec.get(key).is_none() {
            return Some(format!("Missing required field: {key}"));
        }
    }

    let cuebot = &spec["cuebot"];
    if cuebot.get("host").is_none() || cuebot.get("port").is_none() {
        return Some("cuebot must have 'host' and 'port'".to_string());
    }

    if spec["job"].get("name").is_none() {
        return Some("job must have 'name'".to_string());
    }

    if spec["plan"].get("plan_uri").is_none() {
        return Some("plan must have 'plan_uri'".to_string());
    }

    let opencue = &spec["opencue"];
    for key in ["layer_name", "task_count", "cmd"] {
        if opencue.get(key).is_none() {
            return Some(format!("opencue must have '{key}'"));
        }
    }

    let task_count = opencue["task_count"].as_i64().unwrap_or(0);
    if task_count < 1 {
        return Some("task_count must be >= 1".to_string());
    }

    None
}

/// Extracts a job id from `plan.plan_uri` when its file stem looks like
/// a UUID, matching the original submitter's heuristic.
fn job_id_from_plan_uri(spec: &Value) -> Option<String> {
    let plan_uri = spec.get("plan")?.get("plan_uri")?.as_str()?;
    let file_name = plan_uri.rsplit(['/', '\\']).next().unwrap_or(plan_uri);
    let candidate = file_name.strip_suffix(".json").unwrap_or(file_name);
    if candidate.len() == 36 && candidate.contains('-') {
        Some(candidate.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_spec() -> Value {
        json!({
            "cuebot": { "host": "cuebot.internal", "port": 8443 },
            "show": "testshow",
            "user": "artist",
            "job": { "name": "render-job" },
            "plan": { "plan_uri": "file:///plans/123e4567-e89b-12d3-a456-426614174000.json" },
            "opencue": { "layer_name": "render", "task_count": 10, "cmd": "ue-agent run-one-shot-plan" }
        })
    }

    #[test]
    fn validates_complete_spec() {
        assert!(validate_spec(&valid_spec()).is_none());
    }

    #[test]
    fn rejects_spec_missing_top_level_field() {
        let mut spec = valid_spec();
        spec.as_object_mut().unwrap().remove("opencue");
        assert_eq!(validate_spec(&spec), Some("Missing required field: opencue".to_string()));
    }

    #[test]
    fn rejects_zero_task_count() {
        let mut spec = valid_spec();
        spec["opencue"]["task_count"] = json!(0);
        assert_eq!(validate_spec(&spec), Some("task_count must be >= 1".to_string()));
    }

    #[test]
    fn extracts_uuid_job_id_from_plan_uri() {
        let spec = valid_spec();
        assert_eq!(job_id_from_plan_uri(&spec), Some("123e4567-e89b-12d3-a456-426614174000".to_string()));
    }

    #[test]
    fn missing_spec_file_is_reported_and_fails() {
        let (result, ok) = cmd_submit("/nonexistent/submit_spec.json");
        assert!(!ok);
        assert_eq!(result["ok"], json!(false));
        assert!(result["error"].as_str().unwrap().contains("not found"));
    }

    #[test]
    fn submit_with_valid_spec_resolves_job_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submit_spec.json");
        std::fs::write(&path, serde_json::to_string(&valid_spec()).unwrap()).unwrap();
        let (result, ok) = cmd_submit(path.to_str().unwrap());
        assert!(ok);
        assert_eq!(result["job_id"], json!("123e4567-e89b-12d3-a456-426614174000"));
    }
}
