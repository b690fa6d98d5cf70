// SPDX-License-Identifier: Apache-2.0
//! Execution-side entrypoint for OpenCue + Unreal Engine integration.
//!
//! Three subcommands: `service` runs the persistent worker pool daemon;
//! `run-task` is the RQD entrypoint that submits one task to a local pool
//! and waits for it; `run-one-shot-plan` is the RQD entrypoint that runs
//! a single render-plan task directly, with no pool involved.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use opencue_ue_core::{Queue, WorkerPoolConfig};
use opencue_ue_pool::{router, PoolManager};
use opencue_ue_runner::{run_one_shot_plan, wait_for_task_completion, OneShotArgs, ProgressSink, WorkerPoolClient};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "opencue-ue-agent", about = "Execution-side tools for OpenCue + Unreal Engine integration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the UE worker pool service (persistent mode).
    Service {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 9100)]
        port: u16,
    },
    /// Submit a task to the local worker pool and wait (RQD entrypoint).
    RunTask {
        #[arg(long)]
        job_id: String,
        #[arg(long)]
        level_sequence: String,
        #[arg(long, default_value = "")]
        map_path: String,
        #[arg(long, default_value_t = 1)]
        movie_quality: u8,
        #[arg(long, default_value = "mp4")]
        movie_format: String,
        #[arg(long, default_value = "http://127.0.0.1:9100/")]
        worker_pool_url: String,
        #[arg(long, default_value_t = 5.0)]
        poll_interval: f64,
        #[arg(long, default_value_t = 3600.0)]
        timeout: f64,
        #[arg(long, default_value = "{}")]
        extra_params: String,
    },
    /// Run one render-plan task in one-shot mode (RQD entrypoint).
    RunOneShotPlan {
        #[arg(long)]
        plan_path: String,
        #[arg(long, default_value = "")]
        plan_sha256: String,
        #[arg(long, default_value = "")]
        work_root: String,
        #[arg(long, default_value = "")]
        uproject_path: String,
        #[arg(long, default_value = "")]
        ue_cmd_path: String,
        #[arg(long, default_value = "")]
        ue_root: String,
        #[arg(long)]
        task_index: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = WorkerPoolConfig::from_env();

    let code = match cli.command {
        Command::Service { host, port } => run_service(config, host, port).await,
        Command::RunTask {
            job_id,
            level_sequence,
            map_path,
            movie_quality,
            movie_format,
            worker_pool_url,
            poll_interval,
            timeout,
            extra_params,
        } => {
            run_task(
                &config,
                job_id,
                level_sequence,
                map_path,
                movie_quality,
                movie_format,
                worker_pool_url,
                poll_interval,
                timeout,
                extra_params,
            )
            .await
        }
        Command::RunOneShotPlan {
            plan_path,
            plan_sha256,
            work_root,
            uproject_path,
            ue_cmd_path,
            ue_root,
            task_index,
        } => run_one_shot(&config, plan_path, plan_sha256, work_root, uproject_path, ue_cmd_path, ue_root, task_index).await,
    };

    ExitCode::from(code)
}

/// Resolves a guess at this host's routable IP, used to build worker ids
/// (`<host_ip>-w<index>`) and reported in `/status`. Never touches the
/// network: connecting a UDP socket only picks a local route.
fn resolve_host_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn init_logging(log_root: &Path, file_name: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let _ = std::fs::create_dir_all(log_root);
    let file_appender = tracing_appender::rolling::daily(log_root, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init();

    guard
}

async fn run_service(mut config: WorkerPoolConfig, host: String, port: u16) -> u8 {
    config.host = host;
    config.port = port;
    let _guard = init_logging(&config.log_root, "service.log");

    let host_ip = resolve_host_ip();
    let queue = Arc::new(Queue::new());
    let manager = Arc::new(PoolManager::new(config.clone(), host_ip, queue));

    manager.startup().await;
    let reconcile_handle = manager.spawn_reconcile_loop();

    let app = router(Arc::clone(&manager));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %addr, error = %err, "failed to bind worker pool listener");
            return 1;
        }
    };
    info!(addr = %addr, "worker pool service listening");

    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %err, "worker pool service exited with error");
    }

    manager.shutdown(reconcile_handle).await;
    0
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler, relying on Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown signal received");
}

struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {
    fn set_frame_state_override(&mut self, _text: &str, _color: (u8, u8, u8)) -> Result<(), String> {
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_task(
    config: &WorkerPoolConfig,
    job_id: String,
    level_sequence: String,
    map_path: String,
    movie_quality: u8,
    movie_format: String,
    worker_pool_url: String,
    poll_interval: f64,
    timeout: f64,
    extra_params: String,
) -> u8 {
    let _guard = init_logging(&config.log_root, "run_task.log");

    let extra_params = match serde_json::from_str(&extra_params) {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(extra_params = %extra_params, "invalid extra_params JSON, ignoring");
            Default::default()
        }
    };

    let client = WorkerPoolClient::new(worker_pool_url.clone());

    match client.get_status().await {
        Ok(status) => info!(?status, "worker pool status"),
        Err(err) => {
            error!(worker_pool_url = %worker_pool_url, error = %err, "cannot connect to worker pool");
            return 1;
        }
    }

    info!(job_id = %job_id, "creating task");
    let task_id = match client
        .create_task(&job_id, &level_sequence, &map_path, movie_quality, &movie_format, extra_params)
        .await
    {
        Ok(id) => id,
        Err(err) => {
            error!(job_id = %job_id, error = %err, "failed to create task");
            return 1;
        }
    };
    info!(task_id = %task_id, "task created");

    let poll_interval = Duration::from_secs_f64(poll_interval.max(0.1));
    let timeout = Duration::from_secs_f64(timeout.max(0.0));

    let wait = wait_for_task_completion(&client, task_id.as_str(), poll_interval, timeout);
    tokio::pin!(wait);

    tokio::select! {
        result = &mut wait => match result {
            Ok(task) if matches!(task.status, opencue_ue_core::TaskStatus::Completed) && task.success => {
                info!(task_id = %task_id, video_directory = ?task.video_directory, "render complete");
                0
            }
            Ok(task) => {
                error!(task_id = %task_id, error = ?task.error_message, "render failed");
                1
            }
            Err(err) => {
                error!(task_id = %task_id, error = %err, "task did not complete");
                client.cancel_task(task_id.as_str()).await;
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!(task_id = %task_id, "interrupted by user");
            client.cancel_task(task_id.as_str()).await;
            130
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one_shot(
    config: &WorkerPoolConfig,
    plan_path: String,
    plan_sha256: String,
    work_root: String,
    uproject_path: String,
    ue_cmd_path: String,
    ue_root: String,
    task_index: Option<i64>,
) -> u8 {
    let work_root = if work_root.is_empty() {
        opencue_ue_core::config::agent_home().join("logs").join("one_shot")
    } else {
        PathBuf::from(work_root)
    };
    let _guard = init_logging(&work_root, "run_one_shot_plan.log");

    let args = OneShotArgs { plan_path, plan_sha256, work_root, uproject_path, ue_cmd_path, ue_root, task_index };

    match run_one_shot_plan(args, config, Some(NoOpProgressSink)).await {
        Ok(exit_code) => exit_code.clamp(0, 255) as u8,
        Err(err) => {
            error!(error = %err, "one-shot render failed");
            1
        }
    }
}
