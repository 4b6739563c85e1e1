use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use queueline_core::{AuditError, QueueError};

/// Body of every API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable kind.
    pub code: String,
}

#[derive(Debug)]
pub enum ApiError {
    Queue(QueueError),
    Audit(AuditError),
    BadRequest(String),
    NotFound(String),
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<AuditError> for ApiError {
    fn from(e: AuditError) -> Self {
        Self::Audit(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Queue(QueueError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            Self::Queue(QueueError::FailedPrecondition(_)) => StatusCode::CONFLICT,
            Self::Queue(QueueError::Conflict | QueueError::Transient { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Queue(QueueError::TicketNotFound(_)) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Queue(QueueError::Database(_) | QueueError::Internal(_)) | Self::Audit(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Queue(e) => e.kind(),
            Self::Audit(_) => "internal",
            Self::BadRequest(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Queue(e) => e.to_string(),
            Self::Audit(e) => e.to_string(),
            Self::BadRequest(message) | Self::NotFound(message) => message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.message());
        }

        (
            status,
            Json(ErrorResponse {
                error: self.message(),
                code: self.code().to_string(),
            }),
        )
            .into_response()
    }
}
