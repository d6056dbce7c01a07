//! Project routes: listing, detail, comments, ratings and reports.
//!
//! Mutation endpoints receive the value the browser currently displays as
//! `current`. That value is the rollback target, so the response's
//! `displayed` is always either the backend's answer or exactly `current`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tokio::sync::watch;

use super::auth::RequestSession;
use super::{REAUTH_REDIRECT, action_error_to_status, backend_failure, mutation_response};
use crate::backend::types::{CommentPage, ListingQuery};
use crate::services::reconcile::ActionError;
use crate::services::social::{CommentDraft, RatingState};
use crate::state::AppState;

pub const MAX_PAGE_SIZE: u32 = 100;

/// Clamp paging so the backend never sees page 0 or an oversized page.
pub(crate) fn normalize_listing(mut query: ListingQuery) -> ListingQuery {
    query.page = query.page.map(|p| p.max(1));
    query.limit = query.limit.map(|l| l.clamp(1, MAX_PAGE_SIZE));
    for field in [&mut query.search, &mut query.category, &mut query.sort] {
        *field = field
            .take()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());
    }
    query
}

// =============================================================================
// READ-THROUGH
// =============================================================================

/// `GET /api/projects`: paged project listing.
pub async fn list_projects(State(state): State<AppState>, Query(query): Query<ListingQuery>) -> Response {
    match state.backend.list_projects(&normalize_listing(query)).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => backend_failure((), &e),
    }
}

/// `GET /api/projects/:slug`: project detail, personalized when signed in.
pub async fn project_detail(
    State(state): State<AppState>,
    session: RequestSession,
    Path(slug): Path<String>,
) -> Response {
    let token = session.slot.bearer();
    let result = session
        .slot
        .guard(state.backend.project_detail(&slug, token.as_deref()).await);
    let jar = session.response_jar(state.cookies());
    match result {
        Ok(detail) => (jar, Json(detail)).into_response(),
        Err(e) => backend_failure(jar, &e),
    }
}

#[derive(Deserialize)]
pub struct CommentsQuery {
    #[serde(default = "first_page")]
    page: u32,
}

fn first_page() -> u32 {
    1
}

/// `GET /api/projects/:id/comments`: one page of comments.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> Response {
    match state.backend.list_comments(&project_id, query.page.max(1)).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => backend_failure((), &e),
    }
}

// =============================================================================
// MUTATIONS
// =============================================================================

#[derive(Deserialize)]
pub struct RateBody {
    pub rating: u8,
    pub current: RatingState,
}

/// `POST /api/projects/:id/rating`: rate 1 to 5 stars.
pub async fn rate(
    State(state): State<AppState>,
    session: RequestSession,
    Path(project_id): Path<String>,
    Json(body): Json<RateBody>,
) -> Response {
    let (display, _view) = watch::channel(body.current);
    let outcome = state
        .social
        .rate(&session.slot, &display, &project_id, body.rating, body.current)
        .await;
    mutation_response(session.response_jar(state.cookies()), outcome)
}

#[derive(Deserialize)]
pub struct CommentBody {
    #[serde(flatten)]
    pub draft: CommentDraft,
    #[serde(default)]
    pub current: CommentPage,
}

/// `POST /api/projects/:id/comments`: post a comment or reply.
pub async fn post_comment(
    State(state): State<AppState>,
    session: RequestSession,
    Path(project_id): Path<String>,
    Json(body): Json<CommentBody>,
) -> Response {
    let (display, _view) = watch::channel(body.current.clone());
    let outcome = state
        .social
        .post_comment(&session.slot, &display, &project_id, body.draft, body.current)
        .await;
    mutation_response(session.response_jar(state.cookies()), outcome)
}

#[derive(Deserialize)]
pub struct ReportBody {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// `POST /api/projects/:id/report`: report a project to moderators.
pub async fn report(
    State(state): State<AppState>,
    session: RequestSession,
    Path(project_id): Path<String>,
    Json(body): Json<ReportBody>,
) -> Response {
    let result = state
        .social
        .report_project(&session.slot, &project_id, &body.reason, body.details)
        .await;
    let jar = session.response_jar(state.cookies());
    match result {
        Ok(()) => (jar, StatusCode::NO_CONTENT).into_response(),
        Err(e) => {
            let redirect = matches!(e, ActionError::Unauthorized).then_some(REAUTH_REDIRECT);
            let body = serde_json::json!({
                "error": e.to_string(),
                "retryable": e.is_retryable(),
                "redirect": redirect,
            });
            (action_error_to_status(&e), jar, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
#[path = "projects_test.rs"]
mod tests;
