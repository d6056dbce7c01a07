//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API and the Discord browser redirects under a
//! single Axum router. Handlers translate HTTP to service calls; the shared
//! helpers below turn backend errors and mutation outcomes into responses.

pub mod auth;
pub mod projects;
pub mod users;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, IntoResponseParts, Json, Response};
use axum::routing::{get, post};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::BackendError;
use crate::services::reconcile::{ActionError, Outcome};
use crate::state::AppState;

pub(crate) const REAUTH_REDIRECT: &str = "/login";

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/discord", get(auth::discord_redirect))
        .route("/auth/discord/callback", get(auth::discord_callback))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/google", post(auth::google))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/me", get(users::dashboard))
        .route("/api/projects", get(projects::list_projects))
        .route("/api/projects/{id}", get(projects::project_detail))
        .route("/api/projects/{id}/rating", post(projects::rate))
        .route(
            "/api/projects/{id}/comments",
            get(projects::list_comments).post(projects::post_comment),
        )
        .route("/api/projects/{id}/report", post(projects::report))
        .route("/api/users/{id}", get(users::user_profile))
        .route("/api/users/{id}/follow", post(users::toggle_follow))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// Status for a failed read-through call.
pub(crate) fn backend_error_to_status(err: &BackendError) -> StatusCode {
    match err {
        BackendError::Unauthorized => StatusCode::UNAUTHORIZED,
        BackendError::Api { status: status @ 400..=499, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
        }
        BackendError::Transport(_) | BackendError::Api { .. } | BackendError::Schema(_) => StatusCode::BAD_GATEWAY,
        BackendError::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn action_error_to_status(err: &ActionError) -> StatusCode {
    match err {
        ActionError::Unauthorized => StatusCode::UNAUTHORIZED,
        ActionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ActionError::Network(_) => StatusCode::BAD_GATEWAY,
        ActionError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error response for a read-through call. Cookies in `jar` are always sent
/// so an invalidated session is cleared in the browser; calls made without
/// a session pass `()`.
pub(crate) fn backend_failure(jar: impl IntoResponseParts, err: &BackendError) -> Response {
    let status = backend_error_to_status(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "backend call failed");
    }
    let redirect = matches!(err, BackendError::Unauthorized).then_some(REAUTH_REDIRECT);
    let body = serde_json::json!({ "error": err.to_string(), "redirect": redirect });
    (status, jar, Json(body)).into_response()
}

// =============================================================================
// MUTATION RESPONSES
// =============================================================================

/// Body returned by every optimistic mutation endpoint.
#[derive(Debug, Serialize)]
pub struct MutationResponse<T> {
    pub status: &'static str,
    pub displayed: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
}

pub(crate) fn outcome_to_status<T>(outcome: &Outcome<T>) -> StatusCode {
    match outcome {
        Outcome::Committed(_) => StatusCode::OK,
        Outcome::RolledBack { error, .. } => action_error_to_status(error),
        Outcome::Busy | Outcome::Discarded => StatusCode::CONFLICT,
    }
}

impl<T> MutationResponse<T> {
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        let redirect = outcome.requires_reauth().then_some(REAUTH_REDIRECT);
        match outcome {
            Outcome::Committed(value) => Self {
                status: "committed",
                displayed: Some(value),
                message: None,
                retryable: false,
                redirect,
            },
            Outcome::RolledBack { value, error } => Self {
                status: "rolled_back",
                displayed: Some(value),
                message: Some(error.to_string()),
                retryable: error.is_retryable(),
                redirect,
            },
            Outcome::Busy => Self {
                status: "busy",
                displayed: None,
                message: Some("another change to this item is still in progress".into()),
                retryable: true,
                redirect,
            },
            Outcome::Discarded => Self {
                status: "discarded",
                displayed: None,
                message: None,
                retryable: false,
                redirect,
            },
        }
    }
}

/// Turn a mutation outcome into a response carrying `jar`.
pub(crate) fn mutation_response<T: Serialize>(jar: SignedCookieJar, outcome: Outcome<T>) -> Response {
    let status = outcome_to_status(&outcome);
    (status, jar, Json(MutationResponse::from_outcome(outcome))).into_response()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
