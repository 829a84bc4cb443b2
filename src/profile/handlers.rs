use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use super::dto::{ProfileForm, ResetRequest};
use crate::{
    error::ApiError,
    flow::machine::{Event, EventKind, SessionView},
    state::AppState,
};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", post(submit_profile))
        .route("/reset", post(reset_profile))
}

/// Onboarding submit: validate, persist, then move to the camera screen.
#[instrument(skip(state, form))]
pub async fn submit_profile(
    State(state): State<AppState>,
    Json(form): Json<ProfileForm>,
) -> Result<Json<SessionView>, ApiError> {
    state.session().check(EventKind::ProfileSubmitted)?;

    let profile = form.validate().map_err(|e| {
        warn!(fields = ?e.fields, "profile rejected");
        e
    })?;

    state.profiles.save(&profile).await?;

    let mut session = state.session();
    session.apply(Event::ProfileSubmitted(profile))?;
    info!("onboarding complete");
    Ok(Json(session.view()))
}

/// Destructive; does nothing unless `confirm` is true.
#[instrument(skip(state))]
pub async fn reset_profile(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<Json<SessionView>, ApiError> {
    if !req.confirm {
        let mut session = state.session();
        session.apply(Event::ResetDeclined)?;
        return Ok(Json(session.view()));
    }

    state.session().check(EventKind::ResetConfirmed)?;
    state.profiles.clear().await?;

    let mut session = state.session();
    session.apply(Event::ResetConfirmed)?;
    info!("profile cleared; back to onboarding");
    Ok(Json(session.view()))
}
