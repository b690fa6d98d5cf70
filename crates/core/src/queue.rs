// SPDX-License-Identifier: Apache-2.0
//! In-memory task/worker queue.
//!
//! All mutations go through a single mutex. Operations are short and
//! constant-time except listing, which is linear. The queue performs no
//! I/O and calls no external services, keeping the critical section thin.

use crate::clock::{Clock, SystemClock};
use crate::task::{NewTask, Task, TaskId, TaskStatus};
use crate::worker::{Worker, WorkerStatus};
use crate::worker_id::WorkerId;
use parking_lot::Mutex;
use std::collections::HashMap;

struct State {
    tasks: HashMap<TaskId, Task>,
    workers: HashMap<WorkerId, Worker>,
}

/// Guarded task/worker state, keyed by id.
///
/// Generic over a [`Clock`] so heartbeat and startup-timeout logic can be
/// driven deterministically in tests without sleeping.
pub struct Queue<C: Clock = SystemClock> {
    state: Mutex<State>,
    clock: C,
}

impl Queue<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for Queue<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Queue<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Mutex::new(State {
                tasks: HashMap::new(),
                workers: HashMap::new(),
            }),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // --- tasks ---

    pub fn add_task(&self, input: NewTask) -> Task {
        let task = Task::new(input, self.clock.epoch_ms());
        let mut state = self.state.lock();
        state.tasks.insert(task.task_id, task.clone());
        task
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.state.lock().tasks.get(id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.state.lock().tasks.values().cloned().collect()
    }

    /// Returns the oldest PENDING task, if any.
    pub fn oldest_pending_task(&self) -> Option<Task> {
        self.state
            .lock()
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .min_by_key(|t| t.created_at_ms)
            .cloned()
    }

    /// Leases the oldest PENDING task to `worker_id` iff the worker is IDLE.
    /// Returns the leased task on success.
    pub fn lease(&self, worker_id: &WorkerId) -> Option<Task> {
        let mut state = self.state.lock();

        let Some(worker) = state.workers.get_mut(worker_id) else {
            return None;
        };
        if worker.status != WorkerStatus::Idle {
            return None;
        }

        let task_id = state
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .min_by_key(|t| t.created_at_ms)
            .map(|t| t.task_id)?;

        let worker = state.workers.get_mut(worker_id)?;
        worker.status = WorkerStatus::Busy;
        worker.current_task_id = Some(task_id);

        let now = self.clock.epoch_ms();
        let task = state.tasks.get_mut(&task_id)?;
        task.status = TaskStatus::Assigned;
        task.assigned_worker_id = Some(worker_id.clone());
        task.assigned_at_ms = Some(now);

        Some(task.clone())
    }

    /// ASSIGNED -> RUNNING, reported by the worker once it begins rendering.
    pub fn start_task(&self, task_id: &TaskId) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();
        match state.tasks.get_mut(task_id) {
            Some(task) if task.status == TaskStatus::Assigned => {
                task.status = TaskStatus::Running;
                task.started_at_ms = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Completes a task owned by `worker_id`. Rejected if the task's
    /// assigned worker does not match.
    pub fn complete_task(
        &self,
        task_id: &TaskId,
        worker_id: &WorkerId,
        success: bool,
        video_directory: Option<String>,
        error_message: Option<String>,
    ) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();

        let owns = matches!(
            state.tasks.get(task_id).and_then(|t| t.assigned_worker_id.as_ref()),
            Some(assigned) if assigned == worker_id
        );
        if !owns {
            return false;
        }

        if let Some(task) = state.tasks.get_mut(task_id) {
            task.status = if success { TaskStatus::Completed } else { TaskStatus::Failed };
            task.success = success;
            task.completed_at_ms = Some(now);
            task.video_directory = video_directory;
            task.error_message = error_message;
        }

        if let Some(worker) = state.workers.get_mut(worker_id) {
            worker.current_task_id = None;
            worker.status = WorkerStatus::Idle;
            if success {
                worker.tasks_completed += 1;
            } else {
                worker.tasks_failed += 1;
            }
        }

        true
    }

    /// Cancels a PENDING or ASSIGNED task. Returns false (no-op) for any
    /// other status, including RUNNING.
    pub fn cancel_task(&self, task_id: &TaskId) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();

        let cancelable = matches!(
            state.tasks.get(task_id).map(|t| t.status),
            Some(TaskStatus::Pending) | Some(TaskStatus::Assigned)
        );
        if !cancelable {
            return false;
        }

        let assigned_worker = state.tasks.get(task_id).and_then(|t| t.assigned_worker_id.clone());

        if let Some(task) = state.tasks.get_mut(task_id) {
            task.status = TaskStatus::Canceled;
            task.completed_at_ms = Some(now);
        }

        if let Some(worker_id) = assigned_worker {
            if let Some(worker) = state.workers.get_mut(&worker_id) {
                worker.current_task_id = None;
                worker.status = WorkerStatus::Idle;
            }
        }

        true
    }

    // --- workers ---

    pub fn register_worker(&self, worker: Worker) {
        let mut state = self.state.lock();
        state.workers.insert(worker.worker_id.clone(), worker);
    }

    /// Replaces (or creates) a worker record as STARTING with a fresh pid
    /// and spawn timestamp. Used when the pool spawns a new process for a
    /// logical slot, including a respawn of a previously-dead worker id;
    /// lifetime counters reset, matching a brand-new worker instance.
    pub fn reset_for_spawn(&self, worker_id: &WorkerId, host: String, pid: u32) {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();
        let mut worker = Worker::new(worker_id.clone(), host, now);
        worker.process_id = Some(pid);
        state.workers.insert(worker_id.clone(), worker);
    }

    pub fn get_worker(&self, id: &WorkerId) -> Option<Worker> {
        self.state.lock().workers.get(id).cloned()
    }

    pub fn list_workers(&self) -> Vec<Worker> {
        self.state.lock().workers.values().cloned().collect()
    }

    pub fn list_idle_workers(&self) -> Vec<Worker> {
        self.state
            .lock()
            .workers
            .values()
            .filter(|w| w.status == WorkerStatus::Idle)
            .cloned()
            .collect()
    }

    /// Idle workers ordered oldest-spawned-first, for scale-down selection.
    pub fn idle_workers_oldest_first(&self) -> Vec<Worker> {
        let mut idle = self.list_idle_workers();
        idle.sort_by_key(|w| w.created_at_ms);
        idle
    }

    /// Dead worker ids, for log-continuity reuse when spawning replacements.
    pub fn dead_worker_ids(&self) -> Vec<WorkerId> {
        self.state
            .lock()
            .workers
            .values()
            .filter(|w| w.status == WorkerStatus::Dead)
            .map(|w| w.worker_id.clone())
            .collect()
    }

    /// Workers counted toward `min_workers`: those not yet dead or stopping.
    pub fn count_live_workers(&self) -> usize {
        self.state
            .lock()
            .workers
            .values()
            .filter(|w| {
                matches!(
                    w.status,
                    WorkerStatus::Starting | WorkerStatus::Idle | WorkerStatus::Busy
                )
            })
            .count()
    }

    /// Marks a worker ready (STARTING -> IDLE). Auto-registers an IDLE
    /// worker if the id is unknown, matching UE launched outside the pool.
    pub fn mark_ready(&self, worker_id: &WorkerId, host: String) {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();
        match state.workers.get_mut(worker_id) {
            Some(worker) => {
                if worker.status == WorkerStatus::Starting {
                    worker.status = WorkerStatus::Idle;
                    worker.started_at_ms = Some(now);
                }
                worker.last_heartbeat_ms = now;
            }
            None => {
                let mut worker = Worker::new(worker_id.clone(), host, now);
                worker.status = WorkerStatus::Idle;
                worker.started_at_ms = Some(now);
                state.workers.insert(worker_id.clone(), worker);
            }
        }
    }

    /// Records a heartbeat. `busy` normalizes the wire `status` field
    /// (accepts a bool or `"busy"`/`"idle"`) into IDLE<->BUSY promotion.
    /// Returns false if the worker is unknown.
    pub fn heartbeat(&self, worker_id: &WorkerId, busy: Option<bool>) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();
        let Some(worker) = state.workers.get_mut(worker_id) else {
            return false;
        };

        worker.last_heartbeat_ms = now;
        worker.heartbeat_count += 1;

        match busy {
            Some(true) if worker.status == WorkerStatus::Idle => {
                worker.status = WorkerStatus::Busy;
            }
            Some(false) if worker.status == WorkerStatus::Busy => {
                worker.status = WorkerStatus::Idle;
                worker.current_task_id = None;
            }
            _ => {}
        }

        true
    }

    /// Marks a worker DEAD (pid gone, or a timeout fired). Re-queues any
    /// task still bound to it in ASSIGNED or RUNNING state.
    pub fn mark_dead(&self, worker_id: &WorkerId) {
        let mut state = self.state.lock();

        let bound_task = state.workers.get(worker_id).and_then(|w| w.current_task_id);

        if let Some(worker) = state.workers.get_mut(worker_id) {
            worker.status = WorkerStatus::Dead;
            worker.current_task_id = None;
            worker.process_id = None;
        }

        if let Some(task_id) = bound_task {
            if let Some(task) = state.tasks.get_mut(&task_id) {
                if matches!(task.status, TaskStatus::Assigned | TaskStatus::Running) {
                    task.status = TaskStatus::Pending;
                    task.assigned_worker_id = None;
                    task.assigned_at_ms = None;
                }
            }
        }
    }

    /// Scans all non-stopping workers whose heartbeat is stale and marks
    /// them DEAD, re-queueing their bound task. Returns the ids marked dead.
    pub fn reap_stale_workers(&self, timeout_ms: u64) -> Vec<WorkerId> {
        let now = self.clock.epoch_ms();
        let stale: Vec<WorkerId> = {
            let state = self.state.lock();
            state
                .workers
                .values()
                .filter(|w| !matches!(w.status, WorkerStatus::Stopping | WorkerStatus::Dead))
                .filter(|w| !w.is_alive(now, timeout_ms))
                .map(|w| w.worker_id.clone())
                .collect()
        };

        for id in &stale {
            self.mark_dead(id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use std::collections::HashMap as Map;

    fn new_task(job_id: &str) -> NewTask {
        NewTask {
            job_id: job_id.into(),
            level_sequence: "/Game/Seqs/S.S".into(),
            map_path: String::new(),
            movie_quality: 1,
            movie_format: "mp4".into(),
            extra_params: Map::new(),
        }
    }

    #[test]
    fn lease_assigns_oldest_pending_to_idle_worker() {
        let queue = Queue::with_clock(FakeClock::new());
        let worker_id = WorkerId::new("h-w0");
        queue.register_worker(Worker {
            status: WorkerStatus::Idle,
            ..Worker::new(worker_id.clone(), "h".into(), 0)
        });

        let t1 = queue.add_task(new_task("j1"));
        queue.clock().advance(std::time::Duration::from_secs(1));
        let _t2 = queue.add_task(new_task("j2"));

        let leased = queue.lease(&worker_id).expect("lease should succeed");
        assert_eq!(leased.task_id, t1.task_id);

        let worker = queue.get_worker(&worker_id).unwrap();
        assert_eq!(worker.status, WorkerStatus::Busy);
        assert_eq!(worker.current_task_id, Some(t1.task_id));
    }

    #[test]
    fn lease_rejects_busy_worker() {
        let queue = Queue::with_clock(FakeClock::new());
        let worker_id = WorkerId::new("h-w0");
        queue.register_worker(Worker::new(worker_id.clone(), "h".into(), 0));
        queue.add_task(new_task("j1"));
        assert!(queue.lease(&worker_id).is_none());
    }

    #[test]
    fn complete_rejects_mismatched_worker() {
        let queue = Queue::with_clock(FakeClock::new());
        let w1 = WorkerId::new("h-w0");
        let w2 = WorkerId::new("h-w1");
        queue.register_worker(Worker { status: WorkerStatus::Idle, ..Worker::new(w1.clone(), "h".into(), 0) });
        let task = queue.add_task(new_task("j1"));
        queue.lease(&w1).unwrap();

        assert!(!queue.complete_task(&task.task_id, &w2, true, None, None));
        assert!(queue.complete_task(&task.task_id, &w1, true, Some("/out".into()), None));

        let done = queue.get_task(&task.task_id).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        let worker = queue.get_worker(&w1).unwrap();
        assert_eq!(worker.status, WorkerStatus::Idle);
        assert_eq!(worker.tasks_completed, 1);
    }

    #[test]
    fn cancel_running_task_is_noop() {
        let queue = Queue::with_clock(FakeClock::new());
        let w1 = WorkerId::new("h-w0");
        queue.register_worker(Worker { status: WorkerStatus::Idle, ..Worker::new(w1.clone(), "h".into(), 0) });
        let task = queue.add_task(new_task("j1"));
        queue.lease(&w1).unwrap();
        queue.start_task(&task.task_id);

        assert!(!queue.cancel_task(&task.task_id));
        assert_eq!(queue.get_task(&task.task_id).unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn cancel_pending_is_idempotent_in_effect() {
        let queue = Queue::with_clock(FakeClock::new());
        let task = queue.add_task(new_task("j1"));
        assert!(queue.cancel_task(&task.task_id));
        assert!(!queue.cancel_task(&task.task_id));
        assert_eq!(queue.get_task(&task.task_id).unwrap().status, TaskStatus::Canceled);
    }

    #[test]
    fn mark_dead_requeues_bound_task() {
        let queue = Queue::with_clock(FakeClock::new());
        let w1 = WorkerId::new("h-w0");
        queue.register_worker(Worker { status: WorkerStatus::Idle, ..Worker::new(w1.clone(), "h".into(), 0) });
        let task = queue.add_task(new_task("j1"));
        queue.lease(&w1).unwrap();

        queue.mark_dead(&w1);

        assert_eq!(queue.get_task(&task.task_id).unwrap().status, TaskStatus::Pending);
        assert!(queue.get_task(&task.task_id).unwrap().assigned_worker_id.is_none());
        assert_eq!(queue.get_worker(&w1).unwrap().status, WorkerStatus::Dead);
    }

    #[test]
    fn reap_stale_workers_marks_dead_after_timeout() {
        let clock = FakeClock::new();
        let queue = Queue::with_clock(clock.clone());
        let w1 = WorkerId::new("h-w0");
        queue.register_worker(Worker { status: WorkerStatus::Idle, ..Worker::new(w1.clone(), "h".into(), 0) });

        clock.advance(std::time::Duration::from_secs(120));
        let dead = queue.reap_stale_workers(60_000);
        assert_eq!(dead, vec![w1.clone()]);
        assert_eq!(queue.get_worker(&w1).unwrap().status, WorkerStatus::Dead);
    }

    #[test]
    fn ready_auto_registers_unknown_worker() {
        let queue = Queue::with_clock(FakeClock::new());
        let w1 = WorkerId::new("external-w0");
        queue.mark_ready(&w1, "external".into());
        let worker = queue.get_worker(&w1).expect("auto-registered");
        assert_eq!(worker.status, WorkerStatus::Idle);
    }
}
