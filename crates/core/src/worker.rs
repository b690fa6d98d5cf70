// SPDX-License-Identifier: Apache-2.0
//! Worker process state.

use crate::task::TaskId;
use crate::worker_id::WorkerId;
use serde::{Deserialize, Serialize};

/// Worker process status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// UE process launched, not yet reported ready.
    Starting,
    /// Ready for tasks.
    Idle,
    /// Processing a task.
    Busy,
    /// Graceful shutdown in progress.
    Stopping,
    /// Process terminated.
    Dead,
}

/// A long-lived UE Editor child process in worker mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,

    pub process_id: Option<u32>,
    pub host: String,

    pub current_task_id: Option<TaskId>,

    pub last_heartbeat_ms: u64,
    pub heartbeat_count: u64,

    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub stopped_at_ms: Option<u64>,

    pub tasks_completed: u64,
    pub tasks_failed: u64,
}

impl Worker {
    pub fn new(worker_id: WorkerId, host: String, created_at_ms: u64) -> Self {
        Self {
            worker_id,
            status: WorkerStatus::Starting,
            process_id: None,
            host,
            current_task_id: None,
            last_heartbeat_ms: created_at_ms,
            heartbeat_count: 0,
            created_at_ms,
            started_at_ms: None,
            stopped_at_ms: None,
            tasks_completed: 0,
            tasks_failed: 0,
        }
    }

    /// Whether the worker is still considered alive for heartbeat purposes.
    /// `Stopping` and `Dead` workers are never alive regardless of heartbeat age.
    pub fn is_alive(&self, now_ms: u64, timeout_ms: u64) -> bool {
        if matches!(self.status, WorkerStatus::Stopping | WorkerStatus::Dead) {
            return false;
        }
        now_ms.saturating_sub(self.last_heartbeat_ms) < timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_worker_starts_in_starting_state() {
        let w = Worker::new(WorkerId::new("h-w0"), "h".into(), 0);
        assert_eq!(w.status, WorkerStatus::Starting);
        assert!(w.current_task_id.is_none());
    }

    #[test]
    fn is_alive_respects_heartbeat_timeout() {
        let mut w = Worker::new(WorkerId::new("h-w0"), "h".into(), 0);
        w.status = WorkerStatus::Idle;
        w.last_heartbeat_ms = 1_000;
        assert!(w.is_alive(1_500, 1_000));
        assert!(!w.is_alive(2_500, 1_000));
    }

    #[test]
    fn stopping_or_dead_workers_are_never_alive() {
        let mut w = Worker::new(WorkerId::new("h-w0"), "h".into(), 0);
        w.last_heartbeat_ms = 1_000;
        w.status = WorkerStatus::Dead;
        assert!(!w.is_alive(1_000, 1_000_000));
    }
}
