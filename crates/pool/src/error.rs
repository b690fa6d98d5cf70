// SPDX-License-Identifier: Apache-2.0
//! Pool error taxonomy, mapped to HTTP status codes at the handler boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use opencue_ue_wire::ErrorResponse;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unknown task id: {0}")]
    UnknownTask(String),

    #[error("unknown worker id: {0}")]
    UnknownWorker(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error(transparent)]
    Supervisor(#[from] opencue_ue_supervisor::SupervisorError),
}

impl IntoResponse for PoolError {
    fn into_response(self) -> Response {
        let status = match &self {
            PoolError::UnknownTask(_) | PoolError::UnknownWorker(_) => StatusCode::NOT_FOUND,
            PoolError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            PoolError::Supervisor(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse { detail: self.to_string() });
        (status, body).into_response()
    }
}
