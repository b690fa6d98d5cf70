// SPDX-License-Identifier: Apache-2.0
//! Worker pool configuration.
//!
//! Resolution order for any individual field: CLI flag > JSON file >
//! environment variable > built-in default. Paths left unset derive from
//! the resolved "agent home" directory.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_executor_class() -> String {
    "/Script/OpenCueForUnreal.MoviePipelineOpenCuePIEExecutor".to_string()
}

fn default_game_mode_class() -> String {
    "/Script/MovieRenderPipelineCore.MoviePipelineGameMode".to_string()
}

/// Resolves the agent's runtime home directory.
///
/// Honors `AGENT_HOME` if set; otherwise falls back to the directory
/// containing the running executable, mirroring the original Python
/// `get_agent_home()`.
pub fn agent_home() -> PathBuf {
    if let Ok(home) = env::var("AGENT_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn duration_secs(v: f64) -> Duration {
    Duration::from_secs_f64(v.max(0.0))
}

/// Worker pool configuration.
///
/// `worker_startup_timeout` and `heartbeat_timeout` feed both the pool's
/// STARTING-state timeout and the IDLE/BUSY heartbeat-staleness check
/// (see the reconciliation loop in `opencue-ue-pool`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub host: String,
    pub port: u16,

    pub ue_root: Option<PathBuf>,
    pub uproject: Option<PathBuf>,
    pub executor_class: String,
    pub game_mode_class: Option<String>,

    pub min_workers: usize,
    pub max_workers: usize,

    pub worker_startup_timeout_secs: f64,
    pub worker_idle_timeout_secs: f64,
    pub heartbeat_timeout_secs: f64,
    pub task_timeout_secs: f64,

    pub data_root: PathBuf,
    pub log_root: PathBuf,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        let home = agent_home();
        Self {
            host: "0.0.0.0".to_string(),
            port: 9100,
            ue_root: None,
            uproject: None,
            executor_class: default_executor_class(),
            game_mode_class: Some(default_game_mode_class()),
            min_workers: 1,
            max_workers: 4,
            worker_startup_timeout_secs: 300.0,
            worker_idle_timeout_secs: 300.0,
            heartbeat_timeout_secs: 60.0,
            task_timeout_secs: 3600.0,
            data_root: home.join("data").join("worker_pool"),
            log_root: home.join("logs").join("worker_pool"),
        }
    }
}

impl WorkerPoolConfig {
    pub fn worker_startup_timeout(&self) -> Duration {
        duration_secs(self.worker_startup_timeout_secs)
    }

    pub fn worker_idle_timeout(&self) -> Duration {
        duration_secs(self.worker_idle_timeout_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        duration_secs(self.heartbeat_timeout_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        duration_secs(self.task_timeout_secs)
    }

    /// Overlays recognized environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var("WORKER_POOL_HOST") {
            self.host = v;
        }
        if let Some(v) = env_parse::<u16>("WORKER_POOL_PORT") {
            self.port = v;
        }
        if let Ok(v) = env::var("UE_ROOT") {
            self.ue_root = Some(PathBuf::from(v));
        }
        if let Ok(v) = env::var("UPROJECT") {
            self.uproject = Some(PathBuf::from(v));
        }
        if let Ok(v) = env::var("EXECUTOR_CLASS") {
            self.executor_class = v;
        }
        if let Ok(v) = env::var("GAME_MODE_CLASS") {
            self.game_mode_class = Some(v);
        }
        if let Some(v) = env_parse::<usize>("MIN_WORKERS") {
            self.min_workers = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_WORKERS") {
            self.max_workers = v;
        }
        if let Some(v) = env_parse::<f64>("WORKER_STARTUP_TIMEOUT") {
            self.worker_startup_timeout_secs = v;
        }
        if let Some(v) = env_parse::<f64>("WORKER_IDLE_TIMEOUT") {
            self.worker_idle_timeout_secs = v;
        }
        if let Some(v) = env_parse::<f64>("HEARTBEAT_TIMEOUT") {
            self.heartbeat_timeout_secs = v;
        }
        if let Some(v) = env_parse::<f64>("TASK_TIMEOUT") {
            self.task_timeout_secs = v;
        }
        if let Ok(v) = env::var("DATA_ROOT") {
            self.data_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var("LOG_ROOT") {
            self.log_root = PathBuf::from(v);
        }
    }

    /// Merges a `worker_pool` JSON object over the current values.
    pub fn merge_json(&mut self, value: &serde_json::Value) {
        let section = value.get("worker_pool").unwrap_or(value);
        if let Ok(patch) = serde_json::from_value::<WorkerPoolConfigPatch>(section.clone()) {
            patch.apply(self);
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// A partial config used to merge a JSON file's `worker_pool` object
/// over environment-derived defaults without clobbering unset fields.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkerPoolConfigPatch {
    host: Option<String>,
    port: Option<u16>,
    ue_root: Option<PathBuf>,
    uproject: Option<PathBuf>,
    executor_class: Option<String>,
    game_mode_class: Option<String>,
    min_workers: Option<usize>,
    max_workers: Option<usize>,
    worker_startup_timeout_secs: Option<f64>,
    worker_idle_timeout_secs: Option<f64>,
    heartbeat_timeout_secs: Option<f64>,
    task_timeout_secs: Option<f64>,
    data_root: Option<PathBuf>,
    log_root: Option<PathBuf>,
}

impl WorkerPoolConfigPatch {
    fn apply(self, cfg: &mut WorkerPoolConfig) {
        if let Some(v) = self.host {
            cfg.host = v;
        }
        if let Some(v) = self.port {
            cfg.port = v;
        }
        if let Some(v) = self.ue_root {
            cfg.ue_root = Some(v);
        }
        if let Some(v) = self.uproject {
            cfg.uproject = Some(v);
        }
        if let Some(v) = self.executor_class {
            cfg.executor_class = v;
        }
        if let Some(v) = self.game_mode_class {
            cfg.game_mode_class = Some(v);
        }
        if let Some(v) = self.min_workers {
            cfg.min_workers = v;
        }
        if let Some(v) = self.max_workers {
            cfg.max_workers = v;
        }
        if let Some(v) = self.worker_startup_timeout_secs {
            cfg.worker_startup_timeout_secs = v;
        }
        if let Some(v) = self.worker_idle_timeout_secs {
            cfg.worker_idle_timeout_secs = v;
        }
        if let Some(v) = self.heartbeat_timeout_secs {
            cfg.heartbeat_timeout_secs = v;
        }
        if let Some(v) = self.task_timeout_secs {
            cfg.task_timeout_secs = v;
        }
        if let Some(v) = self.data_root {
            cfg.data_root = v;
        }
        if let Some(v) = self.log_root {
            cfg.log_root = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = WorkerPoolConfig::default();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.min_workers, 1);
        assert_eq!(cfg.max_workers, 4);
        assert_eq!(cfg.worker_startup_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn merge_json_overrides_only_present_fields() {
        let mut cfg = WorkerPoolConfig::default();
        let patch = serde_json::json!({ "worker_pool": { "max_workers": 8 } });
        cfg.merge_json(&patch);
        assert_eq!(cfg.max_workers, 8);
        assert_eq!(cfg.min_workers, 1);
    }
}
