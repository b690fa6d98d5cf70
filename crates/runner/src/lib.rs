// SPDX-License-Identifier: Apache-2.0
//! The one-shot task runner: resolves a render-plan entry, launches UE
//! as a subprocess, tails its log for progress, and reports the result
//! back to the outer scheduler. Also hosts the persistent-mode client
//! used by the `run-task` entrypoint.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod args;
mod client;
mod error;
mod plan;
mod progress;
mod resolve;
mod runner;
mod tail;

pub use client::{wait_for_task_completion, WorkerPoolClient};
pub use error::{ClientError, RunnerError};
pub use plan::{load_plan, resolve_task_index, RenderPlan};
pub use progress::{ProgressReporter, ProgressSink, PROGRESS_COLOR};
pub use runner::{run_one_shot_plan, OneShotArgs};
