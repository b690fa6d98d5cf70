// SPDX-License-Identifier: Apache-2.0
//! Render task state.

use crate::worker_id::WorkerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a render task.
    pub struct TaskId("tsk-");
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, waiting for a worker.
    Pending,
    /// Assigned to a worker, not yet started.
    Assigned,
    /// Actively rendering.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Canceled before completion.
    Canceled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

/// A single render unit, corresponding to one frame or shot of a UE
/// Movie Render Queue job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub job_id: String,
    pub level_sequence: String,
    #[serde(default)]
    pub map_path: String,
    pub movie_quality: u8,
    pub movie_format: String,
    #[serde(default)]
    pub extra_params: HashMap<String, String>,

    pub status: TaskStatus,
    pub assigned_worker_id: Option<WorkerId>,
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

/// Inputs accepted when creating a new task; everything else starts at
/// its lifecycle default.
pub struct NewTask {
    pub job_id: String,
    pub level_sequence: String,
    pub map_path: String,
    pub movie_quality: u8,
    pub movie_format: String,
    pub extra_params: HashMap<String, String>,
}

impl Task {
    pub fn new(input: NewTask, created_at_ms: u64) -> Self {
        Self {
            task_id: TaskId::new(),
            job_id: input.job_id,
            level_sequence: input.level_sequence,
            map_path: input.map_path,
            movie_quality: input.movie_quality,
            movie_format: input.movie_format,
            extra_params: input.extra_params,
            status: TaskStatus::Pending,
            assigned_worker_id: None,
            progress_percent: 0.0,
            progress_eta_seconds: -1,
            created_at_ms,
            assigned_at_ms: None,
            started_at_ms: None,
            completed_at_ms: None,
            success: false,
            error_message: None,
            video_directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_pending_with_no_assignment() {
        let task = Task::new(
            NewTask {
                job_id: "j1".into(),
                level_sequence: "/Game/Seqs/S.S".into(),
                map_path: String::new(),
                movie_quality: 1,
                movie_format: "mp4".into(),
                extra_params: HashMap::new(),
            },
            1_000,
        );
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.assigned_worker_id.is_none());
        assert_eq!(task.progress_eta_seconds, -1);
    }

    #[test]
    fn terminal_statuses_are_recognized() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Assigned.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
