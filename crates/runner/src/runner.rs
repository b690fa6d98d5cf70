// SPDX-License-Identifier: Apache-2.0
//! Orchestrates a single one-shot render: resolve plan, launch UE, tail
//! its log, and report the exit code back to the outer scheduler.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use opencue_ue_core::WorkerPoolConfig;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::args::build_ue_args;
use crate::error::RunnerError;
use crate::plan::{load_plan, resolve_plan_path, resolve_task_index, FrameRange};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::resolve::{resolve_ue_cmd, resolve_uproject};
use crate::tail::LogTailer;

pub struct OneShotArgs {
    pub plan_path: String,
    pub plan_sha256: String,
    pub work_root: PathBuf,
    pub uproject_path: String,
    pub ue_cmd_path: String,
    pub ue_root: String,
    pub task_index: Option<i64>,
}

#[derive(Debug, Serialize)]
struct RuntimeSummary<'a> {
    job_id: &'a str,
    task_index: i64,
    shot_name: Option<&'a str>,
    frame_range: &'a FrameRange,
    plan_path: String,
    uproject: String,
    ue_cmd: String,
    ue_log_path: String,
    ue_args: &'a [String],
    start_time: String,
    end_time: String,
    exit_code: i32,
}

/// Runs one frame's render and returns UE's exit code.
pub async fn run_one_shot_plan<S: ProgressSink + Send + 'static>(
    args: OneShotArgs,
    config: &WorkerPoolConfig,
    progress_sink: Option<S>,
) -> Result<i32, RunnerError> {
    tokio::fs::create_dir_all(&args.work_root)
        .await
        .map_err(|source| RunnerError::Write { path: args.work_root.clone(), source })?;

    let task_index = resolve_task_index(args.task_index)?;
    let plan_path = resolve_plan_path(&args.plan_path);
    let plan = load_plan(&plan_path, &args.plan_sha256)?;
    let task = plan.task_by_index(task_index).ok_or(RunnerError::TaskIndexNotFound { index: task_index })?;

    let uproject_path = resolve_uproject(&args.uproject_path, config, &plan)?;
    let ue_cmd_path = resolve_ue_cmd(&args.ue_cmd_path, &args.ue_root, config)?;

    let log_dir = args.work_root.join(&plan.job_id);
    tokio::fs::create_dir_all(&log_dir).await.map_err(|source| RunnerError::Write { path: log_dir.clone(), source })?;
    let log_path = log_dir.join(format!("task_{task_index}.log"));
    let ue_log_path = log_dir.join(format!("task_{task_index}.ue.log"));
    let runtime_path = log_dir.join(format!("task_{task_index}.runtime.json"));

    let ue_args = build_ue_args(&plan, task, &ue_log_path);
    tracing::info!(ue_cmd = %ue_cmd_path.display(), ue_args = ue_args.join(" "), "launching UE");

    let start_time = Utc::now().to_rfc3339();
    let reporter = Arc::new(Mutex::new(ProgressReporter::new(progress_sink)));

    let tailer_reporter = Arc::clone(&reporter);
    let tailer = LogTailer::spawn(ue_log_path.clone(), move |line: &str| {
        if let Ok(mut reporter) = tailer_reporter.lock() {
            reporter.report_from_line(line);
        }
    });

    let exit_code = launch_and_stream(&ue_cmd_path, &uproject_path, &ue_args, &log_path, &reporter).await;
    tailer.stop().await;
    let exit_code = exit_code?;
    let end_time = Utc::now().to_rfc3339();

    let summary = RuntimeSummary {
        job_id: &plan.job_id,
        task_index,
        shot_name: task.shot.name.as_deref(),
        frame_range: &task.frame_range,
        plan_path: plan_path.display().to_string(),
        uproject: uproject_path.display().to_string(),
        ue_cmd: ue_cmd_path.display().to_string(),
        ue_log_path: ue_log_path.display().to_string(),
        ue_args: &ue_args,
        start_time,
        end_time,
        exit_code,
    };
    if let Ok(json) = serde_json::to_string_pretty(&summary) {
        if let Err(err) = tokio::fs::write(&runtime_path, json).await {
            tracing::warn!(path = %runtime_path.display(), error = %err, "failed to write runtime summary");
        }
    }

    tracing::info!(exit_code, "UE exited");
    Ok(exit_code)
}

/// Launches UE, copying its stdout to the console and the per-task log
/// file while feeding each line to the shared progress reporter (UE's
/// `-stdout` flag duplicates everything the absolute-log tailer also
/// sees, so both paths report through the same reporter instance).
async fn launch_and_stream<S: ProgressSink>(
    ue_cmd_path: &Path,
    uproject_path: &Path,
    ue_args: &[String],
    log_path: &Path,
    reporter: &Mutex<ProgressReporter<S>>,
) -> Result<i32, RunnerError> {
    let mut log_file = tokio::fs::File::create(log_path)
        .await
        .map_err(|source| RunnerError::Write { path: log_path.to_path_buf(), source })?;

    let mut child = Command::new(ue_cmd_path)
        .arg(uproject_path)
        .args(ue_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| RunnerError::Launch { path: ue_cmd_path.to_path_buf(), source })?;

    let Some(stdout) = child.stdout.take() else {
        return Err(RunnerError::Launch {
            path: ue_cmd_path.to_path_buf(),
            source: std::io::Error::other("child stdout was not piped"),
        });
    };
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        println!("{line}");
        let _ = log_file.write_all(line.as_bytes()).await;
        let _ = log_file.write_all(b"\n").await;
        if let Ok(mut reporter) = reporter.lock() {
            reporter.report_from_line(&line);
        }
    }

    let status = child.wait().await.map_err(|source| RunnerError::Launch { path: ue_cmd_path.to_path_buf(), source })?;
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Stage;

    struct NullSink;
    impl ProgressSink for NullSink {
        fn set_frame_state_override(&mut self, _text: &str, _color: (u8, u8, u8)) -> Result<(), String> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_plan_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkerPoolConfig::default();
        let args = OneShotArgs {
            plan_path: dir.path().join("missing.json").display().to_string(),
            plan_sha256: String::new(),
            work_root: dir.path().join("work"),
            uproject_path: String::new(),
            ue_cmd_path: String::new(),
            ue_root: String::new(),
            task_index: Some(0),
        };
        let result = run_one_shot_plan::<NullSink>(args, &config, None).await;
        assert!(matches!(result, Err(RunnerError::PlanNotFound { .. })));
    }

    #[test]
    fn progress_stage_round_trips_through_reporter() {
        let mut reporter = ProgressReporter::new(Some(NullSink));
        reporter.report(Stage::Rendering, 10.0);
        assert!(reporter.is_enabled());
    }
}
