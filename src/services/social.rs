//! Rating, follow, comment and report actions.
//!
//! Each optimistic action derives its speculative value from the caller's
//! current view, validates input locally, and hands a backend call to the
//! [`Reconciler`]. Reports are not optimistic: they have no displayed state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use uuid::Uuid;

use super::reconcile::{ActionError, OptimisticMutation, Outcome, Reconciler};
use super::session::SessionSlot;
use crate::backend::Backend;
use crate::backend::types::{Comment, CommentPage, FollowSummary, RatingSummary, ReportRequest};

pub const MIN_STARS: u8 = 1;
pub const MAX_STARS: u8 = 5;
pub const MAX_COMMENT_CHARS: usize = 2000;
pub const MAX_REPORT_REASON_CHARS: usize = 500;

// =============================================================================
// TARGETS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Rating,
    Follow,
    Comment,
}

/// What a mutation is serialized on: one session acting on one thing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationTarget {
    pub subject: String,
    pub kind: TargetKind,
    pub id: String,
}

impl MutationTarget {
    /// The subject is the bearer token's digest, the credential the backend
    /// actually acts on. The identity cookie plays no part. Anonymous
    /// callers get a unique subject so they never contend.
    #[must_use]
    pub fn for_slot(slot: &SessionSlot, kind: TargetKind, id: &str) -> Self {
        let subject = slot.token_digest().map_or_else(
            || format!("anonymous:{}", Uuid::new_v4()),
            |digest| format!("token:{digest}"),
        );
        Self { subject, kind, id: id.to_owned() }
    }
}

// =============================================================================
// DISPLAYED STATES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingState {
    pub rating_avg: f64,
    pub rating_count: u64,
    #[serde(default)]
    pub user_rating: Option<u8>,
}

impl RatingState {
    /// Highlight the caller's vote; aggregates wait for the backend.
    #[must_use]
    pub fn with_vote(self, stars: u8) -> Self {
        Self { user_rating: Some(stars), ..self }
    }

    #[must_use]
    pub fn reconciled(summary: RatingSummary, stars: u8) -> Self {
        Self { rating_avg: summary.rating_avg, rating_count: summary.rating_count, user_rating: Some(stars) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowState {
    pub following: bool,
    pub followers_count: u64,
}

impl FollowState {
    #[must_use]
    pub fn toggled(self) -> Self {
        let followers_count = if self.following {
            self.followers_count.saturating_sub(1)
        } else {
            self.followers_count.saturating_add(1)
        };
        Self { following: !self.following, followers_count }
    }
}

impl From<FollowSummary> for FollowState {
    fn from(summary: FollowSummary) -> Self {
        Self { following: summary.following, followers_count: summary.followers_count }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDraft {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

fn appended(page: &CommentPage, comment: Comment) -> CommentPage {
    let mut next = page.clone();
    next.comments.push(comment);
    next.total = next.total.saturating_add(1);
    next
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

// =============================================================================
// VALIDATION
// =============================================================================

pub(crate) fn validate_stars(stars: u8) -> Result<u8, ActionError> {
    if (MIN_STARS..=MAX_STARS).contains(&stars) {
        Ok(stars)
    } else {
        Err(ActionError::Validation(format!("rating must be between {MIN_STARS} and {MAX_STARS} stars")))
    }
}

pub(crate) fn validate_comment(content: &str) -> Result<String, ActionError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ActionError::Validation("comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(ActionError::Validation(format!("comment is longer than {MAX_COMMENT_CHARS} characters")));
    }
    Ok(content.to_owned())
}

pub(crate) fn validate_reason(reason: &str) -> Result<String, ActionError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ActionError::Validation("a report needs a reason".into()));
    }
    if reason.chars().count() > MAX_REPORT_REASON_CHARS {
        return Err(ActionError::Validation(format!(
            "report reason is longer than {MAX_REPORT_REASON_CHARS} characters"
        )));
    }
    Ok(reason.to_owned())
}

/// Refuse locally: the view never leaves `previous`.
fn refused<T: Clone>(display: &watch::Sender<T>, previous: T, error: ActionError) -> Outcome<T> {
    display.send_replace(previous.clone());
    Outcome::RolledBack { value: previous, error }
}

// =============================================================================
// SERVICE
// =============================================================================

#[derive(Clone)]
pub struct Social {
    backend: Arc<dyn Backend>,
    reconciler: Reconciler<MutationTarget>,
}

impl Social {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend, reconciler: Reconciler::new() }
    }

    /// Rate a project 1–5 stars.
    pub async fn rate(
        &self,
        slot: &SessionSlot,
        display: &watch::Sender<RatingState>,
        project_id: &str,
        stars: u8,
        previous: RatingState,
    ) -> Outcome<RatingState> {
        let stars = match validate_stars(stars) {
            Ok(stars) => stars,
            Err(e) => return refused(display, previous, e),
        };

        let backend = self.backend.clone();
        let token = slot.bearer();
        let id = project_id.to_owned();
        let action = async move {
            let token = token.ok_or(ActionError::Unauthorized)?;
            let summary = backend.rate_project(&token, &id, stars).await?;
            Ok::<_, ActionError>(RatingState::reconciled(summary, stars))
        };

        let target = MutationTarget::for_slot(slot, TargetKind::Rating, project_id);
        let mutation = OptimisticMutation::begin(previous, previous.with_vote(stars));
        self.reconciler
            .apply(target, mutation, display, slot, action)
            .await
    }

    /// Follow or unfollow a user, depending on `previous.following`.
    pub async fn toggle_follow(
        &self,
        slot: &SessionSlot,
        display: &watch::Sender<FollowState>,
        user_id: &str,
        previous: FollowState,
    ) -> Outcome<FollowState> {
        if slot.user().is_some_and(|u| u.subject_id == user_id) {
            return refused(display, previous, ActionError::Validation("you cannot follow yourself".into()));
        }

        let backend = self.backend.clone();
        let token = slot.bearer();
        let id = user_id.to_owned();
        let action = async move {
            let token = token.ok_or(ActionError::Unauthorized)?;
            let summary = backend.toggle_follow(&token, &id).await?;
            Ok::<_, ActionError>(FollowState::from(summary))
        };

        let target = MutationTarget::for_slot(slot, TargetKind::Follow, user_id);
        let mutation = OptimisticMutation::begin(previous, previous.toggled());
        self.reconciler
            .apply(target, mutation, display, slot, action)
            .await
    }

    /// Post a comment (or reply) on a project.
    pub async fn post_comment(
        &self,
        slot: &SessionSlot,
        display: &watch::Sender<CommentPage>,
        project_id: &str,
        draft: CommentDraft,
        previous: CommentPage,
    ) -> Outcome<CommentPage> {
        let content = match validate_comment(&draft.content) {
            Ok(content) => content,
            Err(e) => return refused(display, previous, e),
        };

        let staged = Comment {
            id: format!("pending-{}", Uuid::new_v4()),
            author: slot
                .user()
                .map_or_else(|| "you".to_owned(), |u| u.display_name),
            content: content.clone(),
            created_at: now_rfc3339(),
            parent_id: draft.parent_id.clone(),
            pending: true,
        };
        let speculative = appended(&previous, staged);

        let backend = self.backend.clone();
        let token = slot.bearer();
        let id = project_id.to_owned();
        let base = previous.clone();
        let parent_id = draft.parent_id;
        let action = async move {
            let token = token.ok_or(ActionError::Unauthorized)?;
            let created = backend
                .post_comment(&token, &id, &content, parent_id.as_deref())
                .await?;
            Ok::<_, ActionError>(appended(&base, Comment { pending: false, ..created }))
        };

        let target = MutationTarget::for_slot(slot, TargetKind::Comment, project_id);
        self.reconciler
            .apply(target, OptimisticMutation::begin(previous, speculative), display, slot, action)
            .await
    }

    /// Report a project to moderators.
    ///
    /// # Errors
    ///
    /// `Unauthorized` without a session (or when the backend rejects it, which
    /// also invalidates `slot`), `Validation` for a bad reason, and the mapped
    /// backend error otherwise.
    pub async fn report_project(
        &self,
        slot: &SessionSlot,
        project_id: &str,
        reason: &str,
        details: Option<String>,
    ) -> Result<(), ActionError> {
        let reason = validate_reason(reason)?;
        let token = slot.bearer().ok_or(ActionError::Unauthorized)?;
        let report = ReportRequest {
            target_type: "project".into(),
            target_id: project_id.to_owned(),
            reason,
            details: details
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty()),
        };
        slot.guard(self.backend.report(&token, &report).await)?;
        tracing::info!(%project_id, "project reported");
        Ok(())
    }
}

#[cfg(test)]
#[path = "social_test.rs"]
mod tests;
