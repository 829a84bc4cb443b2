use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::capture::CaptureError;
use crate::flow::machine::FlowError;
use crate::profile::dto::ValidationError;

/// Error surface of the HTTP API. Rendered as `{ "error": kind, "message": text }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    ValidationFailed(#[from] ValidationError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, "ValidationFailed"),
            ApiError::Capture(CaptureError::CameraUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "CameraUnavailable")
            }
            ApiError::Capture(CaptureError::InvalidUpload(_)) => {
                (StatusCode::BAD_REQUEST, "InvalidUpload")
            }
            ApiError::Capture(CaptureError::Encode(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CaptureFailed")
            }
            ApiError::Flow(FlowError::Busy) => (StatusCode::CONFLICT, "Busy"),
            ApiError::Flow(FlowError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, "InvalidTransition")
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.parts();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}
