// SPDX-License-Identifier: Apache-2.0
//! Worker DTOs for the worker pool's HTTP surface.

use opencue_ue_core::{Worker, WorkerStatus};
use serde::{Deserialize, Serialize};

/// Full worker representation returned by `GET /workers`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerResponse {
    pub worker_id: String,
    pub status: WorkerStatus,
    pub process_id: Option<u32>,
    pub host: String,
    pub current_task_id: Option<String>,
    pub last_heartbeat_ms: u64,
    pub heartbeat_count: u64,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub stopped_at_ms: Option<u64>,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
}

impl From<&Worker> for WorkerResponse {
    fn from(worker: &Worker) -> Self {
        Self {
            worker_id: worker.worker_id.as_str().to_string(),
            status: worker.status,
            process_id: worker.process_id,
            host: worker.host.clone(),
            current_task_id: worker.current_task_id.map(|t| t.to_string()),
            last_heartbeat_ms: worker.last_heartbeat_ms,
            heartbeat_count: worker.heartbeat_count,
            created_at_ms: worker.created_at_ms,
            started_at_ms: worker.started_at_ms,
            stopped_at_ms: worker.stopped_at_ms,
            tasks_completed: worker.tasks_completed,
            tasks_failed: worker.tasks_failed,
        }
    }
}

/// Accepts either a JSON boolean or the strings `"busy"`/`"idle"`
/// (case-insensitive), normalized to a single internal boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyFlag(pub bool);

impl<'de> Deserialize<'de> for BusyFlag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(BusyFlag(b)),
            Raw::Str(s) => match s.to_ascii_lowercase().as_str() {
                "busy" => Ok(BusyFlag(true)),
                "idle" => Ok(BusyFlag(false)),
                other => Err(serde::de::Error::custom(format!(
                    "expected a bool or \"busy\"/\"idle\", got {other:?}"
                ))),
            },
        }
    }
}

impl Serialize for BusyFlag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bool(self.0)
    }
}

/// Body of `POST /workers/{id}/heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub status: Option<BusyFlag>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Body of `POST /workers/{id}/done`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoneRequest {
    pub task_id: String,
    pub success: bool,
    #[serde(default)]
    pub video_directory: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Query parameters accepted by `DELETE /workers/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteWorkerQuery {
    #[serde(default)]
    pub graceful: bool,
}

/// Query parameters accepted by `POST /workers/scale`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScaleQuery {
    pub target: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_flag_accepts_bool_and_strings() {
        assert_eq!(serde_json::from_str::<BusyFlag>("true").unwrap(), BusyFlag(true));
        assert_eq!(serde_json::from_str::<BusyFlag>("\"busy\"").unwrap(), BusyFlag(true));
        assert_eq!(serde_json::from_str::<BusyFlag>("\"IDLE\"").unwrap(), BusyFlag(false));
    }

    #[test]
    fn busy_flag_rejects_unknown_string() {
        assert!(serde_json::from_str::<BusyFlag>("\"huh\"").is_err());
    }
}
