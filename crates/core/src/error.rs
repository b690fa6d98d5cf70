// SPDX-License-Identifier: Apache-2.0
//! Core error taxonomy shared by queue and configuration operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown task id: {0}")]
    UnknownTask(String),

    #[error("unknown worker id: {0}")]
    UnknownWorker(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
