//! User routes: public profiles, follow toggles and the signed-in dashboard.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tokio::sync::watch;

use super::auth::RequestSession;
use super::{backend_failure, mutation_response};
use crate::backend::BackendError;
use crate::services::social::FollowState;
use crate::state::AppState;

/// `GET /api/users/:username`: public profile.
pub async fn user_profile(State(state): State<AppState>, Path(username): Path<String>) -> Response {
    match state.backend.user_profile(&username).await {
        Ok(profile) => Json(profile).into_response(),
        Err(e) => backend_failure((), &e),
    }
}

/// `GET /api/me`: the signed-in user's dashboard profile.
pub async fn dashboard(State(state): State<AppState>, session: RequestSession) -> Response {
    let result = match session.slot.bearer() {
        Some(token) => session.slot.guard(state.backend.dashboard(&token).await),
        None => Err(BackendError::Unauthorized),
    };
    let jar = session.response_jar(state.cookies());
    match result {
        Ok(profile) => (jar, Json(profile)).into_response(),
        Err(e) => backend_failure(jar, &e),
    }
}

#[derive(Deserialize)]
pub struct FollowBody {
    pub current: FollowState,
}

/// `POST /api/users/:id/follow`: follow or unfollow, based on `current`.
pub async fn toggle_follow(
    State(state): State<AppState>,
    session: RequestSession,
    Path(user_id): Path<String>,
    Json(body): Json<FollowBody>,
) -> Response {
    let (display, _view) = watch::channel(body.current);
    let outcome = state
        .social
        .toggle_follow(&session.slot, &display, &user_id, body.current)
        .await;
    mutation_response(session.response_jar(state.cookies()), outcome)
}

#[cfg(test)]
#[path = "users_test.rs"]
mod tests;
