pub mod camera;
pub mod handlers;
pub mod payload;
pub mod services;

use crate::state::AppState;
use axum::Router;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("failed to encode frame: {0}")]
    Encode(String),
}

pub fn router() -> Router<AppState> {
    handlers::capture_routes()
}
