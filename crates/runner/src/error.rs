// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the one-shot runner and the persistent-mode client.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("render plan not found at {path}")]
    PlanNotFound { path: PathBuf },

    #[error("failed to read render plan {path}: {source}")]
    PlanRead { path: PathBuf, source: std::io::Error },

    #[error("failed to parse render plan {path}: {source}")]
    PlanParse { path: PathBuf, source: serde_json::Error },

    #[error("plan checksum mismatch: expected {expected} actual {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("no task found for task_index={index}")]
    TaskIndexNotFound { index: i64 },

    #[error("CUE_IFRAME/CUE_FRAME is not set and no --task-index was given")]
    MissingTaskIndex,

    #[error("invalid task index env (CUE_IFRAME={iframe:?}, CUE_FRAME={frame:?})")]
    InvalidTaskIndex { iframe: String, frame: String },

    #[error("uproject not found, checked: {candidates:?}")]
    UprojectNotFound { candidates: Vec<String> },

    #[error("UnrealEditor-Cmd not found, checked: {candidates:?}")]
    UeCmdNotFound { candidates: Vec<String> },

    #[error("failed to launch UE command {path}: {source}")]
    Launch { path: PathBuf, source: std::io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("task {task_id} did not complete within {timeout_secs}s")]
    Timeout { task_id: String, timeout_secs: f64 },
}
