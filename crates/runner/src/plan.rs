// SPDX-License-Identifier: Apache-2.0
//! `render_plan.json` parsing and the outer scheduler's per-frame task index.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RunnerError;

#[derive(Debug, Clone, Deserialize)]
pub struct RenderPlan {
    pub job_id: String,
    pub map_asset_path: String,
    pub level_sequence_asset_path: String,
    pub executor_class: String,
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub render: RenderSection,
    pub tasks: Vec<PlanTask>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSection {
    pub uproject_hint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderSection {
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default = "default_format")]
    pub format: String,
    pub game_mode_class: Option<String>,
    #[serde(default)]
    pub additional_ue_args: Vec<String>,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            format: default_format(),
            game_mode_class: None,
            additional_ue_args: Vec::new(),
        }
    }
}

fn default_quality() -> u8 {
    1
}

fn default_format() -> String {
    "mp4".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanTask {
    pub task_index: i64,
    #[serde(default)]
    pub shot: ShotSection,
    #[serde(default)]
    pub frame_range: FrameRange,
    #[serde(default)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShotSection {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FrameRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Extensions {
    #[serde(default)]
    pub disable_shot_filter: bool,
}

/// Verifies `path`'s contents against `expected` (lowercase hex sha256).
/// An empty `expected` skips verification entirely.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), RunnerError> {
    if expected.is_empty() {
        return Ok(());
    }
    let bytes = std::fs::read(path).map_err(|source| RunnerError::PlanRead { path: path.to_path_buf(), source })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let actual = hasher.finalize().iter().map(|b| format!("{b:02x}")).collect::<String>();
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(RunnerError::ChecksumMismatch { expected: expected.to_string(), actual })
    }
}

/// Loads and parses a render plan, verifying its checksum first.
pub fn load_plan(path: &Path, expected_sha256: &str) -> Result<RenderPlan, RunnerError> {
    if !path.exists() {
        return Err(RunnerError::PlanNotFound { path: path.to_path_buf() });
    }
    verify_sha256(path, expected_sha256)?;
    let text = std::fs::read_to_string(path).map_err(|source| RunnerError::PlanRead { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| RunnerError::PlanParse { path: path.to_path_buf(), source })
}

impl RenderPlan {
    pub fn task_by_index(&self, index: i64) -> Option<&PlanTask> {
        self.tasks.iter().find(|t| t.task_index == index)
    }
}

/// Resolves the frame/task index the outer scheduler assigned this
/// process: an explicit CLI override wins, then `CUE_IFRAME`, then
/// `CUE_FRAME` (which may carry a `-`-separated prefix, e.g. "12-of-40").
pub fn resolve_task_index(explicit: Option<i64>) -> Result<i64, RunnerError> {
    if let Some(index) = explicit {
        return Ok(index);
    }

    let iframe = std::env::var("CUE_IFRAME").unwrap_or_default().trim().to_string();
    if !iframe.is_empty() {
        if let Ok(index) = iframe.parse() {
            return Ok(index);
        }
    }

    let frame = std::env::var("CUE_FRAME").unwrap_or_default().trim().to_string();
    if frame.is_empty() {
        return Err(RunnerError::MissingTaskIndex);
    }

    if let Some((prefix, _)) = frame.split_once('-') {
        if let Ok(index) = prefix.trim().parse() {
            return Ok(index);
        }
    }
    frame
        .parse()
        .map_err(|_| RunnerError::InvalidTaskIndex { iframe, frame })
}

/// Resolves a plan path argument to a filesystem path. A thin wrapper
/// today; kept separate so Windows-local-path quirks have one seam.
pub fn resolve_plan_path(plan_path_arg: &str) -> PathBuf {
    PathBuf::from(plan_path_arg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn sample_json() -> &'static str {
        r#"{
            "job_id": "job-1",
            "map_asset_path": "/Game/Maps/M.M",
            "level_sequence_asset_path": "/Game/Seqs/S.S",
            "executor_class": "/Script/Foo.Executor",
            "render": { "quality": 2, "format": "mov" },
            "tasks": [
                { "task_index": 0, "shot": { "name": "sh010" } },
                { "task_index": 1, "frame_range": { "start": 10, "end": 20 } }
            ]
        }"#
    }

    #[test]
    fn parses_tasks_and_defaults() {
        let plan: RenderPlan = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(plan.render.quality, 2);
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.task_by_index(1).unwrap().frame_range.start, Some(10));
    }

    #[test]
    fn empty_checksum_skips_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, sample_json()).unwrap();
        assert!(verify_sha256(&path, "").is_ok());
    }

    #[test]
    fn mismatched_checksum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, sample_json()).unwrap();
        assert!(verify_sha256(&path, "0000").is_err());
    }

    #[test]
    #[serial]
    fn task_index_prefers_explicit_override() {
        std::env::remove_var("CUE_IFRAME");
        std::env::remove_var("CUE_FRAME");
        assert_eq!(resolve_task_index(Some(7)).unwrap(), 7);
    }

    #[test]
    #[serial]
    fn task_index_falls_back_to_cue_frame_prefix() {
        std::env::remove_var("CUE_IFRAME");
        std::env::set_var("CUE_FRAME", "12-of-40");
        let result = resolve_task_index(None).unwrap();
        std::env::remove_var("CUE_FRAME");
        assert_eq!(result, 12);
    }
}
