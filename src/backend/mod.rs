//! Backend: typed access to the external marketplace REST API.
//!
//! DESIGN
//! ======
//! All persistence (users, projects, ratings, comments, follows) lives in the
//! backend. This crate only calls it. Services depend on the [`Backend`]
//! trait so they can run against [`client::BackendClient`] in production and
//! an in-memory double in tests.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use client::BackendClient;
pub use types::BackendError;
use types::{
    BackendUser, Comment, CommentPage, FollowSummary, ListingQuery, LoginGrant, ProjectDetail, ProjectPage,
    RatingSummary, ReportRequest, UserProfile,
};

/// Operations this service consumes from the backend.
///
/// Methods taking `token` attach it as `Authorization: Bearer <token>`.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// `POST /auth/login`
    async fn login_password(&self, email: &str, password: &str) -> Result<LoginGrant, BackendError>;

    /// `POST /auth/google`
    async fn exchange_google(&self, id_token: &str) -> Result<LoginGrant, BackendError>;

    /// `POST /auth/discord`
    async fn exchange_discord(&self, code: &str, redirect_uri: &str) -> Result<LoginGrant, BackendError>;

    /// `GET /me`: identity behind a bearer token.
    async fn me(&self, token: &str) -> Result<BackendUser, BackendError>;

    /// `GET /me` with the dashboard payload (profile plus own projects).
    async fn dashboard(&self, token: &str) -> Result<UserProfile, BackendError>;

    /// `GET /projects`
    async fn list_projects(&self, query: &ListingQuery) -> Result<ProjectPage, BackendError>;

    /// `GET /projects/{slug}`
    async fn project_detail(&self, slug: &str, token: Option<&str>) -> Result<ProjectDetail, BackendError>;

    /// `POST /projects/{id}/rating`
    async fn rate_project(&self, token: &str, project_id: &str, stars: u8) -> Result<RatingSummary, BackendError>;

    /// `GET /projects/{id}/comments`
    async fn list_comments(&self, project_id: &str, page: u32) -> Result<CommentPage, BackendError>;

    /// `POST /projects/{id}/comments`
    async fn post_comment(
        &self,
        token: &str,
        project_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, BackendError>;

    /// `POST /users/follow`: toggles the follow relation.
    async fn toggle_follow(&self, token: &str, user_id: &str) -> Result<FollowSummary, BackendError>;

    /// `POST /reports`
    async fn report(&self, token: &str, report: &ReportRequest) -> Result<(), BackendError>;

    /// `GET /users/{username}`
    async fn user_profile(&self, username: &str) -> Result<UserProfile, BackendError>;
}
