// SPDX-License-Identifier: Apache-2.0
//! Task DTOs for the worker pool's HTTP surface.

use std::collections::HashMap;

use opencue_ue_core::{NewTask, Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

fn default_movie_quality() -> u8 {
    1
}

fn default_movie_format() -> String {
    "mp4".to_string()
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTaskRequest {
    pub job_id: String,
    pub level_sequence: String,
    #[serde(default)]
    pub map_path: String,
    #[serde(default = "default_movie_quality")]
    pub movie_quality: u8,
    #[serde(default = "default_movie_format")]
    pub movie_format: String,
    #[serde(default)]
    pub extra_params: HashMap<String, String>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(req: CreateTaskRequest) -> Self {
        NewTask {
            job_id: req.job_id,
            level_sequence: req.level_sequence,
            map_path: req.map_path,
            movie_quality: req.movie_quality,
            movie_format: req.movie_format,
            extra_params: req.extra_params,
        }
    }
}

/// Response of `POST /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTaskResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

/// Full task representation returned by `GET /tasks/{id}` and `GET /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResponse {
    pub task_id: TaskId,
    pub job_id: String,
    pub level_sequence: String,
    pub map_path: String,
    pub movie_quality: u8,
    pub movie_format: String,
    pub extra_params: HashMap<String, String>,
    pub status: TaskStatus,
    pub assigned_worker_id: Option<String>,
    pub progress_percent: f64,
    pub progress_eta_seconds: i64,
    pub created_at_ms: u64,
    pub assigned_at_ms: Option<u64>,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub success: bool,
    pub error_message: Option<String>,
    pub video_directory: Option<String>,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id,
            job_id: task.job_id.clone(),
            level_sequence: task.level_sequence.clone(),
            map_path: task.map_path.clone(),
            movie_quality: task.movie_quality,
            movie_format: task.movie_format.clone(),
            extra_params: task.extra_params.clone(),
            status: task.status,
            assigned_worker_id: task.assigned_worker_id.as_ref().map(|w| w.as_str().to_string()),
            progress_percent: task.progress_percent,
            progress_eta_seconds: task.progress_eta_seconds,
            created_at_ms: task.created_at_ms,
            assigned_at_ms: task.assigned_at_ms,
            started_at_ms: task.started_at_ms,
            completed_at_ms: task.completed_at_ms,
            success: task.success,
            error_message: task.error_message.clone(),
            video_directory: task.video_directory.clone(),
        }
    }
}

/// Task-lease object returned to workers by `GET /workers/{id}/lease`.
///
/// `map` (not `map_path`) is the wire field name, kept for compatibility
/// with the UE-side `FOpenCueTaskInfo` struct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskLease {
    pub task_id: TaskId,
    pub job_id: String,
    pub level_sequence: String,
    pub map: String,
    pub movie_quality: u8,
    pub movie_format: String,
    pub extra_params: HashMap<String, String>,
}

impl From<&Task> for TaskLease {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.task_id,
            job_id: task.job_id.clone(),
            level_sequence: task.level_sequence.clone(),
            map: task.map_path.clone(),
            movie_quality: task.movie_quality,
            movie_format: task.movie_format.clone(),
            extra_params: task.extra_params.clone(),
        }
    }
}

/// Query parameters accepted by `GET /tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_task_request_fills_defaults() {
        let json = serde_json::json!({ "job_id": "j1", "level_sequence": "/Game/Seqs/S.S" });
        let req: CreateTaskRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.movie_quality, 1);
        assert_eq!(req.movie_format, "mp4");
    }
}
