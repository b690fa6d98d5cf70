// SPDX-License-Identifier: Apache-2.0
//! Worker pool manager: sizing, reconciliation, leasing, and shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use opencue_ue_core::{
    Clock, NewTask, Queue, SystemClock, Task, TaskId, TaskStatus, WorkerId, WorkerPoolConfig, WorkerStatus,
};
use opencue_ue_supervisor::{self as supervisor, SupervisorError};
use opencue_ue_wire::{StatusResponse, TaskCounts, WorkerCounts};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::PoolError;

/// Fixed cadence of the background reconciliation sweep, independent of
/// HTTP traffic.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(10);

pub struct PoolManager<C: Clock = SystemClock> {
    queue: Arc<Queue<C>>,
    config: WorkerPoolConfig,
    host_ip: String,
}

impl<C: Clock + 'static> PoolManager<C> {
    pub fn new(config: WorkerPoolConfig, host_ip: String, queue: Arc<Queue<C>>) -> Self {
        Self { queue, config, host_ip }
    }

    pub fn queue(&self) -> &Arc<Queue<C>> {
        &self.queue
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    pub fn status(&self) -> StatusResponse {
        let workers = self.queue.list_workers();
        let tasks = self.queue.list_tasks();
        StatusResponse {
            host_ip: self.host_ip.clone(),
            workers: WorkerCounts::from(&workers[..]),
            tasks: TaskCounts::from(&tasks[..]),
        }
    }

    // --- startup & shutdown ---

    /// Kills orphaned UE workers from a previous incarnation, then spawns
    /// up to `min_workers`.
    pub async fn startup(&self) {
        let killed = supervisor::orphan::sweep(self.config.port).await;
        if killed > 0 {
            info!(killed, "removed orphaned UE workers at startup");
        }
        self.spawn_replacements(self.config.min_workers).await;
    }

    /// Spawns the background reconciliation task on its own fixed cadence.
    pub fn spawn_reconcile_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(RECONCILE_INTERVAL).await;
                this.reconcile_once().await;
            }
        })
    }

    /// Cancels the reconcile task, then subtree-kills every tracked worker.
    pub async fn shutdown(&self, reconcile_handle: JoinHandle<()>) {
        reconcile_handle.abort();
        for worker in self.queue.list_workers() {
            if let Some(pid) = worker.process_id {
                supervisor::kill_tree(pid).await;
            }
        }
    }

    // --- reconciliation ---

    /// Runs one sweep of the five reconciliation steps. Idempotent; safe
    /// to call more than once or skip entirely.
    pub async fn reconcile_once(&self) {
        // 1. liveness
        for worker in self.queue.list_workers() {
            if matches!(worker.status, WorkerStatus::Dead | WorkerStatus::Stopping) {
                continue;
            }
            if let Some(pid) = worker.process_id {
                if !supervisor::is_alive(pid) {
                    warn!(worker = %worker.worker_id, pid, "worker process gone");
                    self.queue.mark_dead(&worker.worker_id);
                }
            }
        }

        let now = self.queue.clock().epoch_ms();
        let startup_timeout_ms = self.config.worker_startup_timeout().as_millis() as u64;
        let heartbeat_timeout_ms = self.config.heartbeat_timeout().as_millis() as u64;

        // 2. idle/busy heartbeat staleness, only once past the startup grace
        for worker in self.queue.list_workers() {
            if !matches!(worker.status, WorkerStatus::Idle | WorkerStatus::Busy) {
                continue;
            }
            let age = now.saturating_sub(worker.created_at_ms);
            let stale = now.saturating_sub(worker.last_heartbeat_ms) > heartbeat_timeout_ms;
            if age >= startup_timeout_ms && stale {
                warn!(worker = %worker.worker_id, "heartbeat timeout, killing worker");
                if let Some(pid) = worker.process_id {
                    supervisor::kill_tree(pid).await;
                }
                self.queue.mark_dead(&worker.worker_id);
            }
        }

        // 3. starting-state timeout
        for worker in self.queue.list_workers() {
            if worker.status != WorkerStatus::Starting {
                continue;
            }
            if now.saturating_sub(worker.created_at_ms) > startup_timeout_ms {
                warn!(worker = %worker.worker_id, "startup timeout, killing worker");
                if let Some(pid) = worker.process_id {
                    supervisor::kill_tree(pid).await;
                }
                self.queue.mark_dead(&worker.worker_id);
            }
        }

        // 4. dead workers' bound tasks are re-queued inside mark_dead already.

        // 5. restore min_workers
        let live = self.queue.count_live_workers();
        if live < self.config.min_workers {
            self.spawn_replacements(self.config.min_workers - live).await;
        }
    }

    async fn spawn_replacements(&self, count: usize) {
        let mut reuse = self.queue.dead_worker_ids();
        let mut next_index = self.queue.list_workers().len();
        for _ in 0..count {
            let worker_id = match reuse.pop() {
                Some(id) => id,
                None => {
                    let id = WorkerId::for_slot(&self.host_ip, next_index);
                    next_index += 1;
                    id
                }
            };
            if let Err(source) = self.spawn_worker(worker_id.clone()).await {
                error!(worker = %worker_id, error = %source, "failed to spawn replacement worker");
            }
        }
    }

    fn worker_arg_vector(&self, worker_id: &WorkerId, log_path: &PathBuf) -> Vec<String> {
        let mut args = vec![
            "-MRQWorkerMode".to_string(),
            format!("-MRQWorkerId={worker_id}"),
            format!("-WorkerPoolBaseUrl=http://127.0.0.1:{}/", self.config.port),
            format!("-MoviePipelineLocalExecutorClass={}", self.config.executor_class),
            "-Unattended".to_string(),
            "-NoLoadingScreen".to_string(),
            "-notexturestreaming".to_string(),
            "-stdout".to_string(),
            format!("-ABSLOG={}", log_path.display()),
        ];
        args.shrink_to_fit();
        args
    }

    /// Launches a UE worker process for `worker_id` and records its pid.
    pub async fn spawn_worker(&self, worker_id: WorkerId) -> Result<(), SupervisorError> {
        let ue_root = self.config.ue_root.clone().ok_or_else(|| SupervisorError::ExecutableNotFound {
            root: PathBuf::from("<UE_ROOT unset>"),
        })?;
        let ue_cmd = supervisor::resolve_ue_cmd(&ue_root)?;

        std::fs::create_dir_all(&self.config.log_root).map_err(|source| SupervisorError::LogFile {
            path: self.config.log_root.clone(),
            source,
        })?;
        let log_path = self.config.log_root.join(format!("{worker_id}.log"));

        let project = self.config.uproject.clone().unwrap_or_default();
        let mut full_args = vec![project.display().to_string()];
        full_args.extend(self.worker_arg_vector(&worker_id, &log_path));

        let envs = vec![("NO_PROXY".to_string(), "localhost,127.0.0.1".to_string())];
        let launched = supervisor::spawn(&ue_cmd, &full_args, &envs, &log_path).await?;

        self.queue.reset_for_spawn(&worker_id, self.host_ip.clone(), launched.pid);
        // The child handle is intentionally dropped here: launch is
        // detached/fire-and-forget, the pid recorded above is the only
        // handle the pool keeps on the process.
        drop(launched.child);
        info!(worker = %worker_id, pid = launched.pid, "spawned UE worker");
        Ok(())
    }

    // --- request handlers (called by the HTTP layer) ---

    pub fn create_task(&self, input: NewTask) -> Task {
        self.queue.add_task(input)
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.queue.get_task(id)
    }

    pub fn list_tasks(&self, status: Option<TaskStatus>, limit: usize) -> Vec<Task> {
        let mut tasks = self.queue.list_tasks();
        tasks.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        if let Some(status) = status {
            tasks.retain(|t| t.status == status);
        }
        tasks.truncate(limit);
        tasks
    }

    pub fn cancel_task(&self, id: &TaskId) -> Result<(), PoolError> {
        if self.queue.get_task(id).is_none() {
            return Err(PoolError::UnknownTask(id.to_string()));
        }
        if self.queue.cancel_task(id) {
            Ok(())
        } else {
            Err(PoolError::InvalidTransition(format!("task {id} cannot be canceled in its current state")))
        }
    }

    pub fn mark_ready(&self, worker_id: &WorkerId) {
        self.queue.mark_ready(worker_id, self.host_ip.clone());
    }

    /// Refreshes the worker's heartbeat, then leases the oldest PENDING
    /// task if the worker is IDLE. Unknown worker ids are rejected.
    pub fn lease(&self, worker_id: &WorkerId) -> Result<Option<Task>, PoolError> {
        if self.queue.get_worker(worker_id).is_none() {
            return Err(PoolError::UnknownWorker(worker_id.to_string()));
        }
        self.queue.heartbeat(worker_id, None);
        Ok(self.queue.lease(worker_id))
    }

    /// Records a heartbeat. A `task_id` alongside the heartbeat reports
    /// that the worker has begun rendering, transitioning that task
    /// ASSIGNED -> RUNNING (a no-op if it isn't ASSIGNED).
    pub fn heartbeat(&self, worker_id: &WorkerId, busy: Option<bool>, task_id: Option<TaskId>) -> bool {
        let ok = self.queue.heartbeat(worker_id, busy);
        if ok {
            if let Some(task_id) = task_id {
                self.queue.start_task(&task_id);
            }
        }
        ok
    }

    pub fn done(
        &self,
        worker_id: &WorkerId,
        task_id: &TaskId,
        success: bool,
        video_directory: Option<String>,
        error_message: Option<String>,
    ) -> Result<(), PoolError> {
        if self.queue.complete_task(task_id, worker_id, success, video_directory, error_message) {
            Ok(())
        } else {
            Err(PoolError::InvalidTransition(format!(
                "task {task_id} is not assigned to worker {worker_id}"
            )))
        }
    }

    pub async fn kill_worker(&self, worker_id: &WorkerId, _graceful: bool) -> Result<(), PoolError> {
        let worker = self
            .queue
            .get_worker(worker_id)
            .ok_or_else(|| PoolError::UnknownWorker(worker_id.to_string()))?;
        if let Some(pid) = worker.process_id {
            supervisor::kill_tree(pid).await;
        }
        self.queue.mark_dead(worker_id);
        Ok(())
    }

    /// Scales the live worker count to `target`, clamped to
    /// `[min_workers, max_workers]`. Scaling down kills idle workers,
    /// oldest first; busy workers are never preempted.
    pub async fn scale(&self, target: usize) -> usize {
        let target = target.clamp(self.config.min_workers, self.config.max_workers);
        let live = self.queue.count_live_workers();

        if live < target {
            self.spawn_replacements(target - live).await;
        } else if live > target {
            let mut excess = live - target;
            for worker in self.queue.idle_workers_oldest_first() {
                if excess == 0 {
                    break;
                }
                if let Some(pid) = worker.process_id {
                    supervisor::kill_tree(pid).await;
                }
                self.queue.mark_dead(&worker.worker_id);
                excess -= 1;
            }
        }

        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencue_ue_core::{FakeClock, Worker};
    use std::collections::HashMap;

    fn manager() -> PoolManager<FakeClock> {
        let queue = Arc::new(Queue::with_clock(FakeClock::new()));
        let config = WorkerPoolConfig { min_workers: 0, ..WorkerPoolConfig::default() };
        PoolManager::new(config, "10.0.0.1".into(), queue)
    }

    fn sample_task() -> NewTask {
        NewTask {
            job_id: "j1".into(),
            level_sequence: "/Game/Seqs/S.S".into(),
            map_path: String::new(),
            movie_quality: 1,
            movie_format: "mp4".into(),
            extra_params: HashMap::new(),
        }
    }

    #[test]
    fn lease_rejects_unknown_worker() {
        let m = manager();
        let worker_id = WorkerId::new("ghost-w0");
        assert!(m.lease(&worker_id).is_err());
    }

    #[test]
    fn cancel_running_task_returns_error() {
        let m = manager();
        let worker_id = WorkerId::new("10.0.0.1-w0");
        m.queue().register_worker(Worker { status: WorkerStatus::Idle, ..Worker::new(worker_id.clone(), "10.0.0.1".into(), 0) });
        let task = m.create_task(sample_task());
        m.lease(&worker_id).unwrap();
        m.heartbeat(&worker_id, None, Some(task.task_id));
        assert_eq!(m.get_task(&task.task_id).unwrap().status, TaskStatus::Running);
        assert!(m.cancel_task(&task.task_id).is_err());
    }

    #[test]
    fn cancel_pending_task_succeeds() {
        let m = manager();
        let task = m.create_task(sample_task());
        assert!(m.cancel_task(&task.task_id).is_ok());
        assert_eq!(m.get_task(&task.task_id).unwrap().status, TaskStatus::Canceled);
    }

    #[test]
    fn heartbeat_with_task_id_starts_assigned_task() {
        let m = manager();
        let worker_id = WorkerId::new("10.0.0.1-w0");
        m.queue().register_worker(Worker { status: WorkerStatus::Idle, ..Worker::new(worker_id.clone(), "10.0.0.1".into(), 0) });
        let task = m.create_task(sample_task());
        m.lease(&worker_id).unwrap();

        assert_eq!(m.get_task(&task.task_id).unwrap().status, TaskStatus::Assigned);
        m.heartbeat(&worker_id, None, Some(task.task_id));
        assert_eq!(m.get_task(&task.task_id).unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn list_tasks_filters_and_limits() {
        let m = manager();
        for _ in 0..3 {
            m.create_task(sample_task());
        }
        let tasks = m.list_tasks(Some(TaskStatus::Pending), 2);
        assert_eq!(tasks.len(), 2);
    }
}
