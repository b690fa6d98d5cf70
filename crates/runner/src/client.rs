// SPDX-License-Identifier: Apache-2.0
//! Persistent-mode HTTP client: the bridge between an outer-scheduler
//! entrypoint and the local UE worker pool daemon.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use opencue_ue_wire::{CreateTaskRequest, StatusResponse, TaskResponse};
use reqwest::Client;

use crate::error::ClientError;

/// Thin HTTP client for the worker pool's submitter-facing endpoints.
pub struct WorkerPoolClient {
    base_url: String,
    http: Client,
}

impl WorkerPoolClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), http: Client::new() }
    }

    pub async fn create_task(
        &self,
        job_id: &str,
        level_sequence: &str,
        map_path: &str,
        movie_quality: u8,
        movie_format: &str,
        extra_params: HashMap<String, String>,
    ) -> Result<opencue_ue_core::TaskId, ClientError> {
        let body = CreateTaskRequest {
            job_id: job_id.to_string(),
            level_sequence: level_sequence.to_string(),
            map_path: map_path.to_string(),
            movie_quality,
            movie_format: movie_format.to_string(),
            extra_params,
        };
        let response = self.http.post(format!("{}/tasks", self.base_url)).json(&body).send().await?;
        let created: opencue_ue_wire::CreateTaskResponse = response.error_for_status()?.json().await?;
        Ok(created.task_id)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskResponse, ClientError> {
        let response = self.http.get(format!("{}/tasks/{task_id}", self.base_url)).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn cancel_task(&self, task_id: &str) -> bool {
        self.http
            .post(format!("{}/tasks/{task_id}/cancel", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub async fn get_status(&self) -> Result<StatusResponse, ClientError> {
        let response = self.http.get(format!("{}/status", self.base_url)).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }
}

/// Polls `GET /tasks/{id}` until the task reaches a terminal state,
/// logging progress changes as they're observed. Cancels the task and
/// returns `Err` if `timeout` elapses first.
pub async fn wait_for_task_completion(
    client: &WorkerPoolClient,
    task_id: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<TaskResponse, ClientError> {
    let start = Instant::now();
    let mut last_progress = -1.0;

    loop {
        if start.elapsed() > timeout {
            return Err(ClientError::Timeout { task_id: task_id.to_string(), timeout_secs: timeout.as_secs_f64() });
        }

        let task = match client.get_task(task_id).await {
            Ok(task) => task,
            Err(err) => {
                tracing::warn!(task_id, error = %err, "failed to get task status");
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };

        if task.progress_percent != last_progress {
            let (phase, pct) = if task.progress_percent <= 1.0 {
                ("rendering", task.progress_percent * 100.0)
            } else {
                ("encoding", (task.progress_percent - 1.0) * 100.0)
            };
            let eta = if task.progress_eta_seconds >= 0 {
                format!("ETA: {}s", task.progress_eta_seconds)
            } else {
                String::new()
            };
            tracing::info!(task_id, status = ?task.status, phase, pct, eta, "task progress");
            last_progress = task.progress_percent;
        }

        use opencue_ue_core::TaskStatus;
        match task.status {
            TaskStatus::Completed => {
                tracing::info!(task_id, "task completed successfully");
                return Ok(task);
            }
            TaskStatus::Failed => {
                tracing::error!(task_id, error = ?task.error_message, "task failed");
                return Ok(task);
            }
            TaskStatus::Canceled => {
                tracing::warn!(task_id, "task was canceled");
                return Ok(task);
            }
            _ => {}
        }

        tokio::time::sleep(poll_interval).await;
    }
}
