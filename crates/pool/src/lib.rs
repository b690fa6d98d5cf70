// SPDX-License-Identifier: Apache-2.0
//! The UE worker pool daemon: process supervision, HTTP lease protocol,
//! and reconciliation over [`opencue_ue_core::Queue`].

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod error;
mod http;
mod manager;

pub use error::PoolError;
pub use http::router;
pub use manager::{PoolManager, RECONCILE_INTERVAL};
