//! Error types for engage-submission

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ingest::IngestError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or unusable caller identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller's tier does not allow the operation (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Upload larger than the configured maximum (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Request understood but its content cannot be processed (422)
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Storage could not be reached or written (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::Unprocessable(_) => "UNPROCESSABLE",
            ApiError::Unavailable(_) => "UNAVAILABLE",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn into_message(self) -> String {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::Unavailable(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", self);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.into_message(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<engage_common::Error> for ApiError {
    fn from(err: engage_common::Error) -> Self {
        use engage_common::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Database(e) => ApiError::Unavailable(format!("Database error: {}", e)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::FileTooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            IngestError::TemplateNotFound(_) => ApiError::NotFound(err.to_string()),
            IngestError::EmptyFile => ApiError::BadRequest(err.to_string()),
            IngestError::StorageUnavailable(_) => ApiError::Unavailable(err.to_string()),
            IngestError::UnsupportedFormat(_)
            | IngestError::MalformedInput(_)
            | IngestError::RowLimitExceeded { .. } => ApiError::Unprocessable(err.to_string()),
        }
    }
}

impl From<engage_common::api::IdentityRejection> for ApiError {
    fn from(err: engage_common::api::IdentityRejection) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
