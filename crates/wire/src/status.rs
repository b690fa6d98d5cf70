// SPDX-License-Identifier: Apache-2.0
//! Aggregate status DTOs for `GET /health` and `GET /status`.

use opencue_ue_core::{Task, TaskStatus, Worker, WorkerStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self { status: "healthy" }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorkerCounts {
    pub total: usize,
    pub idle: usize,
    pub busy: usize,
    pub starting: usize,
    pub dead: usize,
}

impl From<&[Worker]> for WorkerCounts {
    fn from(workers: &[Worker]) -> Self {
        let mut counts = WorkerCounts { total: workers.len(), ..Default::default() };
        for w in workers {
            match w.status {
                WorkerStatus::Idle => counts.idle += 1,
                WorkerStatus::Busy => counts.busy += 1,
                WorkerStatus::Starting => counts.starting += 1,
                WorkerStatus::Dead => counts.dead += 1,
                WorkerStatus::Stopping => {}
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub assigned: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl From<&[Task]> for TaskCounts {
    fn from(tasks: &[Task]) -> Self {
        let mut counts = TaskCounts { total: tasks.len(), ..Default::default() };
        for t in tasks {
            match t.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Assigned => counts.assigned += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Canceled => {}
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub host_ip: String,
    pub workers: WorkerCounts,
    pub tasks: TaskCounts,
}

/// Generic `{"status": "ok"}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OkResponse {
    pub status: &'static str,
}

impl Default for OkResponse {
    fn default() -> Self {
        Self { status: "ok" }
    }
}

/// Body returned by `POST /tasks/{id}/cancel` on success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanceledResponse {
    pub status: &'static str,
}

impl Default for CanceledResponse {
    fn default() -> Self {
        Self { status: "canceled" }
    }
}

/// Body returned for 4xx/404 responses across the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencue_ue_core::{NewTask, Task};
    use std::collections::HashMap;

    #[test]
    fn task_counts_tally_by_status() {
        let mut t1 = Task::new(
            NewTask {
                job_id: "j".into(),
                level_sequence: "s".into(),
                map_path: String::new(),
                movie_quality: 1,
                movie_format: "mp4".into(),
                extra_params: HashMap::new(),
            },
            0,
        );
        t1.status = TaskStatus::Completed;
        let t2 = Task::new(
            NewTask {
                job_id: "j".into(),
                level_sequence: "s".into(),
                map_path: String::new(),
                movie_quality: 1,
                movie_format: "mp4".into(),
                extra_params: HashMap::new(),
            },
            0,
        );
        let counts = TaskCounts::from(&[t1, t2][..]);
        assert_eq!(counts.total, 2);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.pending, 1);
    }
}
