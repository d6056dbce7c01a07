//! In-memory [`Backend`] double for service and route tests.
//!
//! Each operation answers with a scripted JSON value (or error) keyed by the
//! operation name, falling back to a sensible default. Every call is recorded
//! with the bearer token it carried.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::de::{DeserializeOwned, IgnoredAny};
use tokio::sync::Notify;

use super::Backend;
use super::types::{
    BackendError, BackendUser, Comment, CommentPage, FollowSummary, ListingQuery, LoginGrant, ProjectDetail,
    ProjectPage, RatingSummary, ReportRequest, UserProfile,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub token: Option<String>,
    pub arg: String,
}

#[derive(Default)]
pub struct MockBackend {
    scripted: Mutex<HashMap<&'static str, Result<serde_json::Value, BackendError>>>,
    calls: Mutex<Vec<Call>>,
    redeemed_discord_codes: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the `data` payload returned by `op`.
    #[must_use]
    pub fn with_data(self, op: &'static str, data: serde_json::Value) -> Self {
        self.scripted.lock().unwrap().insert(op, Ok(data));
        self
    }

    /// Script an error returned by `op`.
    #[must_use]
    pub fn with_error(self, op: &'static str, err: BackendError) -> Self {
        self.scripted.lock().unwrap().insert(op, Err(err));
        self
    }

    /// Hold every `op` call until `gate` is notified, once per call.
    #[must_use]
    pub fn with_gate(self, op: &'static str, gate: Arc<Notify>) -> Self {
        self.gates.lock().unwrap().insert(op, gate);
        self
    }

    async fn pass_gate(&self, op: &'static str) {
        let gate = self.gates.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.op == op)
            .count()
    }

    fn respond<T: DeserializeOwned>(&self, op: &'static str, token: Option<&str>, arg: String) -> Result<T, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call { op, token: token.map(str::to_owned), arg });
        let scripted = self.scripted.lock().unwrap().get(op).cloned();
        let value = match scripted {
            Some(result) => result?,
            None => default_data(op),
        };
        serde_json::from_value(value).map_err(|e| BackendError::Schema(e.to_string()))
    }
}

#[must_use]
pub fn user_json(id: &str, username: &str) -> serde_json::Value {
    serde_json::json!({ "id": id, "username": username, "email": format!("{username}@example.com") })
}

#[must_use]
pub fn grant_json(token: &str) -> serde_json::Value {
    serde_json::json!({ "token": token, "user": user_json("u1", "steve") })
}

fn default_data(op: &str) -> serde_json::Value {
    match op {
        "login_password" | "exchange_google" | "exchange_discord" => grant_json("tok-default"),
        "me" => user_json("u1", "steve"),
        "dashboard" | "user_profile" => serde_json::json!({ "id": "u1", "username": "steve", "followersCount": 2 }),
        "list_projects" => serde_json::json!({ "projects": [], "total": 0, "page": 1, "totalPages": 0 }),
        "project_detail" => {
            serde_json::json!({ "id": "p1", "slug": "p1", "title": "Project", "type": "addon", "author": "steve" })
        }
        "rate_project" => serde_json::json!({ "ratingAvg": 5.0, "ratingCount": 1 }),
        "list_comments" => serde_json::json!({ "comments": [], "total": 0 }),
        "post_comment" => serde_json::json!({
            "id": "c-server",
            "author": "steve",
            "content": "hello",
            "createdAt": "2024-01-01T00:00:00Z"
        }),
        "toggle_follow" => serde_json::json!({ "following": true, "followersCount": 1 }),
        _ => serde_json::Value::Null,
    }
}

#[async_trait::async_trait]
impl Backend for MockBackend {
    async fn login_password(&self, email: &str, _password: &str) -> Result<LoginGrant, BackendError> {
        self.respond("login_password", None, email.to_owned())
    }

    async fn exchange_google(&self, id_token: &str) -> Result<LoginGrant, BackendError> {
        self.respond("exchange_google", None, id_token.to_owned())
    }

    async fn exchange_discord(&self, code: &str, _redirect_uri: &str) -> Result<LoginGrant, BackendError> {
        // Discord codes are single-use upstream as well.
        if !self
            .redeemed_discord_codes
            .lock()
            .unwrap()
            .insert(code.to_owned())
        {
            return Err(BackendError::Api { status: 400, message: "invalid_grant".into() });
        }
        self.respond("exchange_discord", None, code.to_owned())
    }

    async fn me(&self, token: &str) -> Result<BackendUser, BackendError> {
        self.respond("me", Some(token), String::new())
    }

    async fn dashboard(&self, token: &str) -> Result<UserProfile, BackendError> {
        self.respond("dashboard", Some(token), String::new())
    }

    async fn list_projects(&self, query: &ListingQuery) -> Result<ProjectPage, BackendError> {
        self.respond("list_projects", None, query.search.clone().unwrap_or_default())
    }

    async fn project_detail(&self, slug: &str, token: Option<&str>) -> Result<ProjectDetail, BackendError> {
        self.respond("project_detail", token, slug.to_owned())
    }

    async fn rate_project(&self, token: &str, project_id: &str, stars: u8) -> Result<RatingSummary, BackendError> {
        self.pass_gate("rate_project").await;
        self.respond("rate_project", Some(token), format!("{project_id}:{stars}"))
    }

    async fn list_comments(&self, project_id: &str, _page: u32) -> Result<CommentPage, BackendError> {
        self.respond("list_comments", None, project_id.to_owned())
    }

    async fn post_comment(
        &self,
        token: &str,
        project_id: &str,
        content: &str,
        _parent_id: Option<&str>,
    ) -> Result<Comment, BackendError> {
        self.respond("post_comment", Some(token), format!("{project_id}:{content}"))
    }

    async fn toggle_follow(&self, token: &str, user_id: &str) -> Result<FollowSummary, BackendError> {
        self.pass_gate("toggle_follow").await;
        self.respond("toggle_follow", Some(token), user_id.to_owned())
    }

    async fn report(&self, token: &str, report: &ReportRequest) -> Result<(), BackendError> {
        let arg = format!("{}:{}", report.target_id, report.reason);
        let _: IgnoredAny = self.respond("report", Some(token), arg)?;
        Ok(())
    }

    async fn user_profile(&self, username: &str) -> Result<UserProfile, BackendError> {
        self.respond("user_profile", None, username.to_owned())
    }
}
