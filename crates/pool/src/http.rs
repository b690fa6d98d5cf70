// SPDX-License-Identifier: Apache-2.0
//! HTTP surface: worker-facing and submitter-facing endpoints.
//!
//! Each handler acquires the queue lock for exactly one operation. Long
//! operations (scale, kill) are still short in practice because launch is
//! detached and kill is a subtree signal plus a bounded wait.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use opencue_ue_core::{Clock, TaskId, WorkerId};
use opencue_ue_wire::{
    CanceledResponse, CreateTaskRequest, CreateTaskResponse, DeleteWorkerQuery, DoneRequest,
    HeartbeatRequest, HealthResponse, ListTasksQuery, OkResponse, ScaleQuery, TaskLease,
    TaskResponse, WorkerResponse,
};

use crate::error::PoolError;
use crate::manager::PoolManager;

type SharedManager<C> = Arc<PoolManager<C>>;

pub fn router<C: Clock + 'static>(manager: SharedManager<C>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status::<C>))
        .route("/workers", get(list_workers::<C>))
        .route("/workers/scale", post(scale::<C>))
        .route("/workers/:id", delete(kill_worker::<C>))
        .route("/workers/:id/ready", post(ready::<C>))
        .route("/workers/:id/lease", get(lease::<C>))
        .route("/workers/:id/heartbeat", post(heartbeat::<C>))
        .route("/workers/:id/done", post(done::<C>))
        .route("/tasks", post(create_task::<C>).get(list_tasks::<C>))
        .route("/tasks/:id", get(get_task::<C>))
        .route("/tasks/:id/cancel", post(cancel_task::<C>))
        .with_state(manager)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

async fn status<C: Clock + 'static>(State(manager): State<SharedManager<C>>) -> Json<opencue_ue_wire::StatusResponse> {
    Json(manager.status())
}

async fn list_workers<C: Clock + 'static>(State(manager): State<SharedManager<C>>) -> Json<Vec<WorkerResponse>> {
    let workers = manager.queue().list_workers();
    Json(workers.iter().map(WorkerResponse::from).collect())
}

async fn scale<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Query(query): Query<ScaleQuery>,
) -> Json<opencue_ue_wire::StatusResponse> {
    manager.scale(query.target).await;
    Json(manager.status())
}

async fn kill_worker<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Path(id): Path<String>,
    Query(query): Query<DeleteWorkerQuery>,
) -> Result<Json<OkResponse>, PoolError> {
    let worker_id = WorkerId::new(id);
    manager.kill_worker(&worker_id, query.graceful).await?;
    Ok(Json(OkResponse::default()))
}

async fn ready<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Path(id): Path<String>,
) -> Json<OkResponse> {
    let worker_id = WorkerId::new(id);
    manager.mark_ready(&worker_id);
    Json(OkResponse::default())
}

async fn lease<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Path(id): Path<String>,
) -> Result<Response, PoolError> {
    let worker_id = WorkerId::new(id);
    match manager.lease(&worker_id)? {
        Some(task) => Ok((StatusCode::OK, Json(TaskLease::from(&task))).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn heartbeat<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Path(id): Path<String>,
    Json(body): Json<HeartbeatRequest>,
) -> Result<Json<OkResponse>, PoolError> {
    let worker_id = WorkerId::new(id);
    let busy = body.status.map(|flag| flag.0);
    let task_id = body.task_id.map(TaskId::from_string);
    if manager.heartbeat(&worker_id, busy, task_id) {
        Ok(Json(OkResponse::default()))
    } else {
        Err(PoolError::UnknownWorker(worker_id.to_string()))
    }
}

async fn done<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Path(id): Path<String>,
    Json(body): Json<DoneRequest>,
) -> Result<Json<OkResponse>, PoolError> {
    let worker_id = WorkerId::new(id);
    let task_id = TaskId::from_string(&body.task_id);
    manager.done(&worker_id, &task_id, body.success, body.video_directory, body.error_message)?;
    Ok(Json(OkResponse::default()))
}

async fn create_task<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Json(body): Json<CreateTaskRequest>,
) -> (StatusCode, Json<CreateTaskResponse>) {
    let task = manager.create_task(body.into());
    (StatusCode::CREATED, Json(CreateTaskResponse { task_id: task.task_id, status: task.status }))
}

async fn get_task<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, PoolError> {
    let task_id = TaskId::from_string(&id);
    manager
        .get_task(&task_id)
        .map(|task| Json(TaskResponse::from(&task)))
        .ok_or_else(|| PoolError::UnknownTask(id))
}

async fn list_tasks<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Query(query): Query<ListTasksQuery>,
) -> Json<Vec<TaskResponse>> {
    let tasks = manager.list_tasks(query.status, query.limit);
    Json(tasks.iter().map(TaskResponse::from).collect())
}

async fn cancel_task<C: Clock + 'static>(
    State(manager): State<SharedManager<C>>,
    Path(id): Path<String>,
) -> Result<Json<CanceledResponse>, PoolError> {
    let task_id = TaskId::from_string(&id);
    manager.cancel_task(&task_id)?;
    Ok(Json(CanceledResponse::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use opencue_ue_core::{FakeClock, Queue, WorkerPoolConfig};
    use tower::ServiceExt;

    fn test_manager() -> SharedManager<FakeClock> {
        let queue = Arc::new(Queue::with_clock(FakeClock::new()));
        let config = WorkerPoolConfig { min_workers: 0, ..WorkerPoolConfig::default() };
        Arc::new(PoolManager::new(config, "127.0.0.1".into(), queue))
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let app = router(test_manager());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn lease_with_no_pending_tasks_returns_no_content() {
        let manager = test_manager();
        manager.queue().register_worker(opencue_ue_core::Worker {
            status: opencue_ue_core::WorkerStatus::Idle,
            ..opencue_ue_core::Worker::new(WorkerId::new("h-w0"), "h".into(), 0)
        });
        let app = router(manager);
        let response = app
            .oneshot(Request::builder().uri("/workers/h-w0/lease").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn create_task_returns_201() {
        let app = router(test_manager());
        let body = serde_json::json!({ "job_id": "j1", "level_sequence": "/Game/Seqs/S.S" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn cancel_unknown_task_is_404() {
        let app = router(test_manager());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/tasks/tsk-doesnotexist000000/cancel")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
