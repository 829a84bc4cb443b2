use std::future::Future;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::machine::{Event, EventKind, SessionView};
use crate::{
    analysis::ANALYSIS_FAILED_NOTICE,
    capture::payload::ImagePayload,
    error::ApiError,
    state::{AppState, CaptureClaim},
};

pub fn flow_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(get_session))
        .route("/retake", post(retake))
}

#[instrument(skip(state))]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session().view())
}

#[instrument(skip(state))]
pub async fn retake(State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let mut session = state.session();
    session.apply(Event::Retake)?;
    info!("retake: image and result discarded");
    Ok(Json(session.view()))
}

/// Runs `work` on its own task and waits for it. A client that hangs up only
/// drops the wait; the work still settles the session.
pub async fn detached<T, F>(work: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("capture task failed: {e}")))?
}

/// Moves the session to Loading, runs the one model call, then settles on
/// Analysis or back on Camera. A failed call is not an API error: the user
/// lands on the capture screen with a notice.
#[instrument(skip(state, claim, image), fields(capture_id = %image.id, mime = %image.mime_type))]
pub async fn analyze_capture(
    state: AppState,
    claim: CaptureClaim,
    image: ImagePayload,
) -> Result<SessionView, ApiError> {
    let profile = {
        let mut session = state.session();
        session.check(EventKind::CaptureStarted)?;
        let profile = session
            .profile()
            .cloned()
            .ok_or_else(|| ApiError::BadRequest("no profile yet".into()))?;
        session.apply(Event::CaptureStarted(image.clone()))?;
        profile
    };
    // Loading now keeps other captures out.
    drop(claim);
    info!(bytes = image.byte_len(), "analysis started");

    let mut pending = PendingAnalysis::new(state.clone());
    let outcome = state.analyzer.analyze(&image, &profile).await;
    pending.disarm();

    let mut session = state.session();
    match outcome {
        Ok(result) => {
            info!(food = %result.food_name, calories = result.calories, "analysis finished");
            session.apply(Event::AnalysisSucceeded(result))?;
        }
        Err(e) => {
            warn!(error = %e, "analysis failed; back to camera");
            session.apply(Event::AnalysisFailed(e.user_message().to_string()))?;
        }
    }
    Ok(session.view())
}

/// Sends the session back to Camera if the model call never returns normally.
struct PendingAnalysis {
    state: AppState,
    armed: bool,
}

impl PendingAnalysis {
    fn new(state: AppState) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingAnalysis {
    fn drop(&mut self) {
        if self.armed {
            warn!("analysis abandoned; back to camera");
            let _ = self
                .state
                .session()
                .apply(Event::AnalysisFailed(ANALYSIS_FAILED_NOTICE.into()));
        }
    }
}
