// SPDX-License-Identifier: Apache-2.0
//! Property-test harness for the queue invariants.
//!
//! Generates randomized sequences of queue operations and checks the
//! invariants hold after every step, not just at the end.
//!
//! Only compiled under the `test-support` feature, which no production
//! build enables; the `expect`s below are invariant assertions meant to
//! fail a property test, not error paths a running daemon can hit.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::clock::FakeClock;
use crate::queue::Queue;
use crate::task::{NewTask, TaskStatus};
use crate::worker::{Worker, WorkerStatus};
use crate::worker_id::WorkerId;
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Op {
    AddTask,
    RegisterWorker,
    Lease { worker: usize },
    Heartbeat { worker: usize, busy: Option<bool> },
    Complete { worker: usize, success: bool },
    Cancel { task: usize },
    MarkDead { worker: usize },
    Tick { secs: u64 },
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::AddTask),
        Just(Op::RegisterWorker),
        (0usize..6).prop_map(|worker| Op::Lease { worker }),
        (0usize..6, proptest::option::of(any::<bool>()))
            .prop_map(|(worker, busy)| Op::Heartbeat { worker, busy }),
        (0usize..6, any::<bool>()).prop_map(|(worker, success)| Op::Complete { worker, success }),
        (0usize..8).prop_map(|task| Op::Cancel { task }),
        (0usize..6).prop_map(|worker| Op::MarkDead { worker }),
        (0u64..120).prop_map(|secs| Op::Tick { secs }),
    ]
}

pub fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(op_strategy(), 0..max_len)
}

fn new_task(n: usize) -> NewTask {
    NewTask {
        job_id: format!("job-{n}"),
        level_sequence: "/Game/Seqs/S.S".into(),
        map_path: String::new(),
        movie_quality: 1,
        movie_format: "mp4".into(),
        extra_params: HashMap::new(),
    }
}

/// Applies `ops` to a fresh queue, asserting every invariant from the
/// testable-properties list after each step. Panics (via assert) on
/// violation, which is what proptest shrinks against.
pub fn run_and_check_invariants(ops: &[Op]) {
    let queue = Queue::with_clock(FakeClock::new());
    let mut task_ids = Vec::new();
    let mut worker_ids = Vec::new();

    for op in ops {
        match op {
            Op::AddTask => {
                let task = queue.add_task(new_task(task_ids.len()));
                task_ids.push(task.task_id);
            }
            Op::RegisterWorker => {
                let id = WorkerId::for_slot("test-host", worker_ids.len());
                queue.register_worker(Worker { status: WorkerStatus::Idle, ..Worker::new(id.clone(), "test-host".into(), queue.clock().epoch_ms()) });
                worker_ids.push(id);
            }
            Op::Lease { worker } => {
                if let Some(id) = worker_ids.get(*worker) {
                    queue.lease(id);
                }
            }
            Op::Heartbeat { worker, busy } => {
                if let Some(id) = worker_ids.get(*worker) {
                    queue.heartbeat(id, *busy);
                }
            }
            Op::Complete { worker, success } => {
                if let Some(id) = worker_ids.get(*worker) {
                    if let Some(w) = queue.get_worker(id) {
                        if let Some(task_id) = w.current_task_id {
                            queue.complete_task(&task_id, id, *success, None, None);
                        }
                    }
                }
            }
            Op::Cancel { task } => {
                if let Some(id) = task_ids.get(*task) {
                    queue.cancel_task(id);
                }
            }
            Op::MarkDead { worker } => {
                if let Some(id) = worker_ids.get(*worker) {
                    queue.mark_dead(id);
                }
            }
            Op::Tick { secs } => {
                queue.clock().advance(std::time::Duration::from_secs(*secs));
            }
        }

        check_invariants(&queue);
    }
}

fn check_invariants(queue: &Queue<FakeClock>) {
    let tasks = queue.list_tasks();
    let workers = queue.list_workers();
    let worker_by_id: HashMap<_, _> = workers.iter().map(|w| (w.worker_id.clone(), w)).collect();
    let task_by_id: HashMap<_, _> = tasks.iter().map(|t| (t.task_id, t)).collect();

    for task in &tasks {
        if matches!(task.status, TaskStatus::Assigned | TaskStatus::Running) {
            let worker_id = task.assigned_worker_id.clone().expect("invariant 1: assigned task has a worker");
            let worker = worker_by_id.get(&worker_id).expect("invariant 1: assigned worker exists");
            assert_eq!(worker.current_task_id, Some(task.task_id), "invariant 1: worker points back to task");
        }
        if task.status == TaskStatus::Pending {
            assert!(
                !workers.iter().any(|w| w.current_task_id == Some(task.task_id)),
                "invariant 3: no worker holds a pending task"
            );
        }
    }

    for worker in &workers {
        if worker.status == WorkerStatus::Busy {
            let task_id = worker.current_task_id.expect("invariant 2: busy worker has a task");
            let task = task_by_id.get(&task_id).expect("invariant 2: busy worker's task exists");
            assert_eq!(task.assigned_worker_id, Some(worker.worker_id.clone()), "invariant 2: task points back to worker");
        }
        if matches!(
            worker.status,
            WorkerStatus::Starting | WorkerStatus::Stopping | WorkerStatus::Dead
        ) {
            assert!(worker.current_task_id.is_none(), "starting/stopping/dead worker has no task");
        }
    }

    // At most one task may be assigned to any one worker at a time: the
    // task->worker and worker->task pointers above already enforce this
    // since current_task_id is a single Option, not a set.
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn queue_invariants_hold_under_random_operations(ops in ops_strategy(60)) {
            run_and_check_invariants(&ops);
        }
    }
}
