use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Failures surfaced by the profile and health services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The profile store rejected or failed the operation.
    #[error("profile store unavailable")]
    Unavailable(#[source] StorageError),
    /// No profile store is installed or it failed its last health check.
    #[error("profile store unavailable (degraded mode)")]
    Degraded,
    /// No profile exists under this display name.
    #[error("profile `{name}` not found")]
    ProfileNotFound { name: String },
    /// The display name is already claimed.
    #[error("profile `{name}` already exists")]
    ProfileTaken { name: String },
    /// A profile update carried neither a status nor a country.
    #[error("nothing to update: provide status or country")]
    NothingToUpdate,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { name } => ServiceError::ProfileTaken { name },
            other => ServiceError::Unavailable(other),
        }
    }
}

/// HTTP-facing errors; each variant owns its status code.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or invalid request payload.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Request collides with existing data.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Client exhausted its rate-limit budget.
    #[error("too many requests")]
    TooManyRequests,
    /// Storage is unusable right now.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {err}"))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Unavailable(_) | ServiceError::Degraded => {
                AppError::ServiceUnavailable(message)
            }
            ServiceError::ProfileNotFound { .. } => AppError::NotFound(message),
            ServiceError::ProfileTaken { .. } => AppError::Conflict(message),
            ServiceError::NothingToUpdate => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = Json(ErrorBody {
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}
