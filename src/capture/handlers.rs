use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tracing::{instrument, warn};

use super::camera::Facing;
use super::payload::ImagePayload;
use super::services::{acquire_from_camera_blocking, acquire_from_file};
use super::CaptureError;
use crate::{
    error::ApiError,
    flow::handlers::{analyze_capture, detached},
    flow::machine::{Event, SessionView, CAMERA_UNAVAILABLE_NOTICE},
    state::AppState,
};

pub fn capture_routes() -> Router<AppState> {
    Router::new()
        .route("/capture/camera", post(capture_camera))
        .route("/capture/upload", post(capture_upload))
        .route("/capture/base64", post(capture_base64))
        .layer(DefaultBodyLimit::disable())
}

#[derive(Debug, Deserialize)]
pub struct Base64Upload {
    pub image: String,
}

/// POST /capture/camera: one frame from the rear camera.
#[instrument(skip(state))]
pub async fn capture_camera(State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let claim = state.claim_capture()?;
    let quality = state.config.camera.jpeg_quality;

    let view = detached(async move {
        let camera = state.camera.clone();
        let image = match acquire_from_camera_blocking(camera, Facing::Environment, quality).await {
            Ok(image) => image,
            Err(e @ CaptureError::CameraUnavailable(_)) => {
                warn!(error = %e, "camera unavailable; client should offer file upload");
                // Only lands if nothing else moved the session meanwhile.
                let _ = state
                    .session()
                    .apply(Event::CameraFailed(CAMERA_UNAVAILABLE_NOTICE.into()));
                return Err(ApiError::from(e));
            }
            Err(e) => return Err(ApiError::from(e)),
        };
        analyze_capture(state, claim, image).await
    })
    .await?;
    Ok(Json(view))
}

/// POST /capture/upload (multipart), field `file` or `image`.
#[instrument(skip(state, mp))]
pub async fn capture_upload(
    State(state): State<AppState>,
    mut mp: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    let claim = state.claim_capture()?;

    let mut image: Option<ImagePayload> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if !matches!(field.name(), Some("file" | "image")) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        image = Some(acquire_from_file(&data, content_type.as_deref()));
        break;
    }
    let image = image.ok_or_else(|| ApiError::BadRequest("file is required".into()))?;

    Ok(Json(detached(analyze_capture(state, claim, image)).await?))
}

/// POST /capture/base64 { "image": "data:image/png;base64,..." }
#[instrument(skip(state, body))]
pub async fn capture_base64(
    State(state): State<AppState>,
    Json(body): Json<Base64Upload>,
) -> Result<Json<SessionView>, ApiError> {
    let claim = state.claim_capture()?;
    let image = ImagePayload::from_data_url(&body.image)?;
    Ok(Json(detached(analyze_capture(state, claim, image)).await?))
}
