// SPDX-License-Identifier: Apache-2.0
//! UE child-process supervision: spawn, kill-tree, liveness, orphan sweep.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod error;
pub mod orphan;
pub mod process;

pub use error::SupervisorError;
pub use process::{is_alive, kill_tree, resolve_ue_cmd, spawn, Launched};
