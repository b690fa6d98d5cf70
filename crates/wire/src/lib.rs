// SPDX-License-Identifier: Apache-2.0
//! JSON wire types shared between the worker pool's HTTP surface and its
//! clients (workers, the agent CLI, the submitter).

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod status;
mod task;
mod worker;

pub use status::{CanceledResponse, ErrorResponse, HealthResponse, OkResponse, StatusResponse, TaskCounts, WorkerCounts};
pub use task::{CreateTaskRequest, CreateTaskResponse, ListTasksQuery, TaskLease, TaskResponse};
pub use worker::{BusyFlag, DeleteWorkerQuery, DoneRequest, HeartbeatRequest, ScaleQuery, WorkerResponse};
