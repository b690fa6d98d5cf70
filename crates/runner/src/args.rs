// SPDX-License-Identifier: Apache-2.0
//! Assembles the UE command-line argument vector for a one-shot render.

use std::path::Path;

use crate::plan::{PlanTask, RenderPlan};

fn headless_enabled() -> bool {
    let value = std::env::var("UE_WRAPPER_HEADLESS").unwrap_or_else(|_| "1".to_string());
    !matches!(value.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off")
}

fn map_url(plan: &RenderPlan) -> String {
    let map_url = plan.map_asset_path.trim().to_string();
    let game_mode = plan.render.game_mode_class.as_deref().unwrap_or("").trim();
    if map_url.is_empty() || game_mode.is_empty() || map_url.to_lowercase().contains("?game=") {
        return map_url;
    }
    if map_url.ends_with('?') {
        format!("{map_url}game={game_mode}")
    } else {
        format!("{map_url}?game={game_mode}")
    }
}

/// Builds the UE argument vector (everything after the project path).
pub fn build_ue_args(plan: &RenderPlan, task: &PlanTask, ue_log_path: &Path) -> Vec<String> {
    let mut args = vec![
        map_url(plan),
        format!("-AbsLog={}", ue_log_path.display()),
        "-forcelogflush".to_string(),
        "-stdout".to_string(),
        "-FullStdOutLogOutput".to_string(),
        "-game".to_string(),
        format!("-MoviePipelineLocalExecutorClass={}", plan.executor_class),
        format!("-JobId={}", plan.job_id),
        format!("-LevelSequence={}", plan.level_sequence_asset_path),
        format!("-MovieQuality={}", plan.render.quality),
        format!("-MovieFormat={}", plan.render.format),
    ];

    if headless_enabled() {
        args.extend([
            "-RenderOffscreen".to_string(),
            "-Unattended".to_string(),
            "-NOSPLASH".to_string(),
            "-NoLoadingScreen".to_string(),
            "-notexturestreaming".to_string(),
        ]);
    }

    let shot_name = task.shot.name.as_deref().unwrap_or("").trim();
    if !task.extensions.disable_shot_filter && !shot_name.is_empty() {
        args.push(format!("-ShotName={shot_name}"));
    }

    if let (Some(start), Some(end)) = (task.frame_range.start, task.frame_range.end) {
        args.push(format!("-CustomStartFrame={start}"));
        args.push(format!("-CustomEndFrame={end}"));
    }

    for extra in &plan.render.additional_ue_args {
        let trimmed = extra.trim();
        if !trimmed.is_empty() {
            args.push(trimmed.to_string());
        }
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Extensions, FrameRange, ProjectSection, RenderSection, ShotSection};
    use serial_test::serial;
    use std::path::PathBuf;

    fn plan() -> RenderPlan {
        RenderPlan {
            job_id: "job-1".into(),
            map_asset_path: "/Game/Maps/M.M".into(),
            level_sequence_asset_path: "/Game/Seqs/S.S".into(),
            executor_class: "/Script/Foo.Executor".into(),
            project: ProjectSection { uproject_hint: None },
            render: RenderSection {
                quality: 2,
                format: "mov".into(),
                game_mode_class: Some("/Script/Foo.GameMode".into()),
                additional_ue_args: vec!["-ExtraFlag".into()],
            },
            tasks: Vec::new(),
        }
    }

    fn task() -> PlanTask {
        PlanTask {
            task_index: 0,
            shot: ShotSection { name: Some("sh010".into()) },
            frame_range: FrameRange { start: Some(10), end: Some(20) },
            extensions: Extensions { disable_shot_filter: false },
        }
    }

    #[test]
    #[serial]
    fn appends_game_mode_query_to_map_url() {
        std::env::remove_var("UE_WRAPPER_HEADLESS");
        let args = build_ue_args(&plan(), &task(), &PathBuf::from("/tmp/ue.log"));
        assert_eq!(args[0], "/Game/Maps/M.M?game=/Script/Foo.GameMode");
    }

    #[test]
    #[serial]
    fn includes_headless_flags_by_default() {
        std::env::remove_var("UE_WRAPPER_HEADLESS");
        let args = build_ue_args(&plan(), &task(), &PathBuf::from("/tmp/ue.log"));
        assert!(args.contains(&"-RenderOffscreen".to_string()));
    }

    #[test]
    #[serial]
    fn omits_headless_flags_when_disabled() {
        std::env::set_var("UE_WRAPPER_HEADLESS", "0");
        let args = build_ue_args(&plan(), &task(), &PathBuf::from("/tmp/ue.log"));
        std::env::remove_var("UE_WRAPPER_HEADLESS");
        assert!(!args.contains(&"-RenderOffscreen".to_string()));
    }

    #[test]
    #[serial]
    fn shot_filter_suppressed_when_extension_disables_it() {
        std::env::remove_var("UE_WRAPPER_HEADLESS");
        let mut t = task();
        t.extensions.disable_shot_filter = true;
        let args = build_ue_args(&plan(), &t, &PathBuf::from("/tmp/ue.log"));
        assert!(!args.iter().any(|a| a.starts_with("-ShotName=")));
    }

    #[test]
    #[serial]
    fn frame_range_appends_custom_start_end() {
        std::env::remove_var("UE_WRAPPER_HEADLESS");
        let args = build_ue_args(&plan(), &task(), &PathBuf::from("/tmp/ue.log"));
        assert!(args.contains(&"-CustomStartFrame=10".to_string()));
        assert!(args.contains(&"-CustomEndFrame=20".to_string()));
    }
}
