//! reqwest client for the backend REST API.
//!
//! Thin HTTP wrapper: builds URLs, attaches bearer tokens, and hands the raw
//! status and body to [`parse_envelope`] so parsing stays testable without a
//! network.

use std::time::Duration;

use reqwest::Url;
use serde::de::{DeserializeOwned, IgnoredAny};

use super::Backend;
use super::types::{
    BackendError, BackendUser, Comment, CommentPage, FollowSummary, ListingQuery, LoginGrant, ProjectDetail,
    ProjectPage, RatingSummary, ReportRequest, UserProfile, parse_envelope,
};
use crate::config::BackendTimeouts;

// =============================================================================
// CLIENT
// =============================================================================

pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    /// Build a client rooted at `base_url` (for example `https://api.example.com/v1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot carry path segments or the HTTP
    /// client fails to build.
    pub fn new(base_url: &str, timeouts: BackendTimeouts) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url).map_err(|e| BackendError::HttpClientBuild(format!("BACKEND_URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::HttpClientBuild(format!("BACKEND_URL is not a base URL: {base_url}")));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| BackendError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    /// Join percent-encoded path segments onto the base URL.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let result = parse_envelope(status, &text);
        if let Err(e) = &result {
            tracing::debug!(%status, error = %e, "backend call failed");
        }
        result
    }

    async fn exchange(&self, segments: &[&str], body: serde_json::Value) -> Result<LoginGrant, BackendError> {
        let grant: Option<LoginGrant> = self
            .send(self.http.post(self.endpoint(segments)).json(&body))
            .await?;
        Ok(grant.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl Backend for BackendClient {
    async fn login_password(&self, email: &str, password: &str) -> Result<LoginGrant, BackendError> {
        self.exchange(&["auth", "login"], serde_json::json!({ "email": email, "password": password }))
            .await
    }

    async fn exchange_google(&self, id_token: &str) -> Result<LoginGrant, BackendError> {
        self.exchange(&["auth", "google"], serde_json::json!({ "idToken": id_token }))
            .await
    }

    async fn exchange_discord(&self, code: &str, redirect_uri: &str) -> Result<LoginGrant, BackendError> {
        self.exchange(&["auth", "discord"], serde_json::json!({ "code": code, "redirectUri": redirect_uri }))
            .await
    }

    async fn me(&self, token: &str) -> Result<BackendUser, BackendError> {
        self.send(self.http.get(self.endpoint(&["me"])).bearer_auth(token))
            .await
    }

    async fn dashboard(&self, token: &str) -> Result<UserProfile, BackendError> {
        self.send(self.http.get(self.endpoint(&["me"])).bearer_auth(token))
            .await
    }

    async fn list_projects(&self, query: &ListingQuery) -> Result<ProjectPage, BackendError> {
        self.send(self.http.get(self.endpoint(&["projects"])).query(query))
            .await
    }

    async fn project_detail(&self, slug: &str, token: Option<&str>) -> Result<ProjectDetail, BackendError> {
        let mut request = self.http.get(self.endpoint(&["projects", slug]));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    async fn rate_project(&self, token: &str, project_id: &str, stars: u8) -> Result<RatingSummary, BackendError> {
        self.send(
            self.http
                .post(self.endpoint(&["projects", project_id, "rating"]))
                .bearer_auth(token)
                .json(&serde_json::json!({ "rating": stars })),
        )
        .await
    }

    async fn list_comments(&self, project_id: &str, page: u32) -> Result<CommentPage, BackendError> {
        self.send(
            self.http
                .get(self.endpoint(&["projects", project_id, "comments"]))
                .query(&[("page", page)]),
        )
        .await
    }

    async fn post_comment(
        &self,
        token: &str,
        project_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, BackendError> {
        self.send(
            self.http
                .post(self.endpoint(&["projects", project_id, "comments"]))
                .bearer_auth(token)
                .json(&serde_json::json!({ "content": content, "parentId": parent_id })),
        )
        .await
    }

    async fn toggle_follow(&self, token: &str, user_id: &str) -> Result<FollowSummary, BackendError> {
        self.send(
            self.http
                .post(self.endpoint(&["users", "follow"]))
                .bearer_auth(token)
                .json(&serde_json::json!({ "userId": user_id })),
        )
        .await
    }

    async fn report(&self, token: &str, report: &ReportRequest) -> Result<(), BackendError> {
        // The ack may or may not echo the stored report; only success matters.
        let _: IgnoredAny = self
            .send(
                self.http
                    .post(self.endpoint(&["reports"]))
                    .bearer_auth(token)
                    .json(report),
            )
            .await?;
        Ok(())
    }

    async fn user_profile(&self, username: &str) -> Result<UserProfile, BackendError> {
        self.send(self.http.get(self.endpoint(&["users", username])))
            .await
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
