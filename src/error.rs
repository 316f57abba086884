use std::{io, net::SocketAddr, path::PathBuf};

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

/// Failures that stop the process before it starts serving.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Another live process holds the instance lock.
    #[error("another instance is already running (lock file `{}`)", .0.display())]
    AlreadyRunning(PathBuf),
    /// A listener could not be bound.
    #[error("failed to bind {role} server on {addr}")]
    Bind {
        /// Which server failed: `api`, `karaoke` or `remote`.
        role: &'static str,
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
}
