// SPDX-License-Identifier: Apache-2.0
//! Resolves the UE project file and command-line binary for a one-shot run.

use std::path::{Path, PathBuf};

use opencue_ue_core::WorkerPoolConfig;

use crate::error::RunnerError;
use crate::plan::RenderPlan;

fn uproject_hint(plan: &RenderPlan) -> Option<&str> {
    plan.project.uproject_hint.as_deref().filter(|s| !s.is_empty())
}

/// Tries, in order: explicit CLI path, `UE_UPROJECT`, the configured
/// default, the plan's hint, and the hint resolved under
/// `UE_PROJECT_ROOT`. The first candidate that exists on disk wins.
pub fn resolve_uproject(explicit: &str, config: &WorkerPoolConfig, plan: &RenderPlan) -> Result<PathBuf, RunnerError> {
    let mut candidates = Vec::new();

    if !explicit.is_empty() {
        candidates.push(explicit.to_string());
    }
    if let Ok(env_uproject) = std::env::var("UE_UPROJECT") {
        if !env_uproject.trim().is_empty() {
            candidates.push(env_uproject);
        }
    }
    if let Some(uproject) = &config.uproject {
        candidates.push(uproject.display().to_string());
    }
    if let Some(hint) = uproject_hint(plan) {
        candidates.push(hint.to_string());
        if let Ok(project_root) = std::env::var("UE_PROJECT_ROOT") {
            if !project_root.trim().is_empty() {
                candidates.push(Path::new(&project_root).join(hint).display().to_string());
            }
        }
    }

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or(RunnerError::UprojectNotFound { candidates })
}

/// Normalizes a UE engine root (or an already-resolved command path) to
/// the platform's `UnrealEditor-Cmd` binary path.
fn cmd_from_root(root_or_cmd: &str) -> Option<PathBuf> {
    if root_or_cmd.is_empty() {
        return None;
    }
    let path = PathBuf::from(root_or_cmd);
    let is_exe = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
    if is_exe {
        return Some(path);
    }
    if cfg!(target_os = "windows") {
        Some(path.join("Engine/Binaries/Win64/UnrealEditor-Cmd.exe"))
    } else {
        Some(path.join("Engine/Binaries/Linux/UnrealEditor-Cmd"))
    }
}

/// Tries, in order: explicit CLI cmd, `UE_CMD_PATH`, then each of
/// (explicit root, `UE_ROOT`, configured root) normalized to a binary
/// path. The first candidate that exists wins.
pub fn resolve_ue_cmd(explicit_cmd: &str, explicit_root: &str, config: &WorkerPoolConfig) -> Result<PathBuf, RunnerError> {
    let mut candidates = Vec::new();

    if !explicit_cmd.is_empty() {
        candidates.push(explicit_cmd.to_string());
    }
    if let Ok(env_cmd) = std::env::var("UE_CMD_PATH") {
        if !env_cmd.trim().is_empty() {
            candidates.push(env_cmd);
        }
    }

    let env_root = std::env::var("UE_ROOT").unwrap_or_default();
    let config_root = config.ue_root.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
    for root in [explicit_root, env_root.as_str(), config_root.as_str()] {
        if let Some(cmd) = cmd_from_root(root) {
            candidates.push(cmd.display().to_string());
        }
    }

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or(RunnerError::UeCmdNotFound { candidates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ProjectSection, RenderSection};

    fn empty_plan() -> RenderPlan {
        RenderPlan {
            job_id: "j".into(),
            map_asset_path: String::new(),
            level_sequence_asset_path: String::new(),
            executor_class: String::new(),
            project: ProjectSection { uproject_hint: None },
            render: RenderSection::default(),
            tasks: Vec::new(),
        }
    }

    #[test]
    fn cmd_from_root_appends_linux_binary_when_not_windows() {
        if cfg!(target_os = "windows") {
            return;
        }
        let cmd = cmd_from_root("/opt/ue").unwrap();
        assert_eq!(cmd, PathBuf::from("/opt/ue/Engine/Binaries/Linux/UnrealEditor-Cmd"));
    }

    #[test]
    fn cmd_from_root_passes_through_explicit_exe() {
        let cmd = cmd_from_root("C:/ue/UnrealEditor-Cmd.exe").unwrap();
        assert_eq!(cmd, PathBuf::from("C:/ue/UnrealEditor-Cmd.exe"));
    }

    #[test]
    fn resolve_uproject_reports_all_candidates_on_failure() {
        let config = WorkerPoolConfig::default();
        let err = resolve_uproject("/nonexistent.uproject", &config, &empty_plan()).unwrap_err();
        assert!(matches!(err, RunnerError::UprojectNotFound { .. }));
    }

    #[test]
    fn resolve_uproject_accepts_explicit_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Game.uproject");
        std::fs::write(&path, "{}").unwrap();
        let config = WorkerPoolConfig::default();
        let resolved = resolve_uproject(path.to_str().unwrap(), &config, &empty_plan()).unwrap();
        assert_eq!(resolved, path);
    }
}
