// SPDX-License-Identifier: Apache-2.0
//! Process supervision error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("UE executable not found under engine root {root}")]
    ExecutableNotFound { root: PathBuf },

    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },
}
