//! API error types and their wire mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use updraft_service::ServiceError;
use updraft_storage::StorageError;

/// One field of a validation error response.
#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Body of a validation error: `{errors:[{field,message}]}`.
#[derive(Debug, Serialize)]
struct ValidationErrorBody {
    errors: Vec<FieldError>,
}

/// Body of a generic error: `{error}`.
#[derive(Debug, Serialize)]
struct GenericErrorBody {
    error: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// A single-field validation error.
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation(vec![FieldError {
            field: field.to_string(),
            message: message.to_string(),
        }])
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Storage(StorageError::UpdateTooLarge) => {
                Self::validation("file_metadata", "max update size is 100MB")
            }
            ServiceError::UpdateNotFound => Self::NotFound("update not found".to_string()),
            ServiceError::LaunchAssetMissing(update_id) => {
                Self::Conflict(format!("no launch asset found for update {update_id}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => Self::NotFound(format!("object not found: {key}")),
            StorageError::InvalidSignature(_) | StorageError::UrlExpired => {
                Self::Unauthorized("invalid asset URL".to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<updraft_core::Error> for ApiError {
    fn from(err: updraft_core::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::Validation(errors) => {
                (status, Json(ValidationErrorBody { errors })).into_response()
            }
            other => (
                status,
                Json(GenericErrorBody {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
