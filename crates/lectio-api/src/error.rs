//! API error types.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use lectio_models::TrackId;
use lectio_storage::{ManifestError, StorageError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Range not satisfiable for object of {size} bytes")]
    UnsatisfiableRange { size: u64 },

    #[error("Failed to sign {} track(s)", failing.len())]
    PartialFailure { failing: Vec<TrackId> },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::InvalidRange(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsatisfiableRange { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::PartialFailure { .. } => StatusCode::CONFLICT,
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::Transient(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ManifestError> for ApiError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::PartialFailure { failing } => ApiError::PartialFailure { failing },
            ManifestError::Storage(e) => ApiError::Storage(e),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PartialFailureResponse {
    error: String,
    failing_track_ids: Vec<TrackId>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match self {
            // 416 carries the total size and an empty body so seeking
            // clients can recover without a second round trip.
            ApiError::UnsatisfiableRange { size } => (
                status,
                [
                    (header::CONTENT_RANGE, format!("bytes */{}", size)),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
            )
                .into_response(),

            // Manifest clients get every failing track in one response.
            ApiError::PartialFailure { failing } => (
                status,
                Json(PartialFailureResponse {
                    error: format!("Failed to sign {} track(s)", failing.len()),
                    failing_track_ids: failing,
                }),
            )
                .into_response(),

            other => {
                // Don't expose internal error details in production
                let detail = match &other {
                    ApiError::Internal(_)
                    | ApiError::Storage(StorageError::Transient(_))
                    | ApiError::Storage(StorageError::ReadFailed(_))
                    | ApiError::Storage(StorageError::ListFailed(_))
                    | ApiError::Storage(StorageError::PresignFailed(_))
                    | ApiError::Storage(StorageError::ConfigError(_))
                    | ApiError::Storage(StorageError::InvalidUrl(_)) => {
                        if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                            "An internal error occurred".to_string()
                        } else {
                            other.to_string()
                        }
                    }
                    _ => other.to_string(),
                };

                (status, Json(ErrorResponse { detail })).into_response()
            }
        }
    }
}
