//! Backend wire types and envelope parsing.
//!
//! Every backend response is `{ "status": "success", "data": ... }` or
//! `{ "status": "error", "message": ... }`. One schema is accepted; any other
//! shape is a `Schema` error rather than a guess.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by backend calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("backend unreachable: {0}")]
    Transport(String),

    /// The backend answered 401 for the presented bearer token.
    #[error("backend rejected credentials")]
    Unauthorized,

    /// The backend returned a non-success status or an error envelope.
    #[error("backend error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the canonical envelope.
    #[error("unexpected backend response: {0}")]
    Schema(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl BackendError {
    /// True for 5xx responses and transport failures.
    #[must_use]
    pub fn is_upstream_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Api { status: 500..=599, .. })
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

const STATUS_SUCCESS: &str = "success";
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Parse a backend response body into `T`.
///
/// A missing `data` field deserializes as JSON `null`, so `Option<T>` and `()`
/// targets accept acknowledgements without payload while struct targets
/// reject them.
pub fn parse_envelope<T: DeserializeOwned>(http_status: u16, body: &str) -> Result<T, BackendError> {
    if http_status == 401 {
        return Err(BackendError::Unauthorized);
    }
    let success_status = (200..300).contains(&http_status);

    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if success_status => return Err(BackendError::Schema(e.to_string())),
        Err(_) => {
            return Err(BackendError::Api { status: http_status, message: truncate(body, MAX_ERROR_BODY_CHARS) });
        }
    };

    if !success_status || envelope.status != STATUS_SUCCESS {
        let message = envelope
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("request failed with status '{}'", envelope.status));
        return Err(BackendError::Api { status: http_status, message });
    }

    let data = envelope.data.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(data).map_err(|e| BackendError::Schema(e.to_string()))
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "empty response body".into();
    }
    trimmed.chars().take(max_chars).collect()
}

// =============================================================================
// AUTH
// =============================================================================

/// Minimal user identity returned by the auth endpoints and `/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Result of exchanging a proof. Both fields may be absent on a malformed
/// success; the session bridge decides what that means.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginGrant {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<BackendUser>,
}

// =============================================================================
// PROJECTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// Add-on category such as `"addon"`, `"map"`, `"texture-pack"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub author: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub rating_avg: f64,
    #[serde(default)]
    pub rating_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    pub projects: Vec<ProjectSummary>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub game_versions: Vec<String>,
    pub download_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub summary: ProjectSummary,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub versions: Vec<ProjectVersion>,
    #[serde(default)]
    pub gallery: Vec<String>,
    /// The caller's own vote, filled only for authenticated requests.
    #[serde(default)]
    pub user_rating: Option<u8>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub following_author: Option<bool>,
}

/// Query for `GET /projects`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

// =============================================================================
// SOCIAL
// =============================================================================

/// Aggregate returned after a rating is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub rating_avg: f64,
    pub rating_count: u64,
}

/// Follow relation returned after a follow toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowSummary {
    pub following: bool,
    pub followers_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub content: String,
    pub created_at: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Set only on locally staged comments that the backend has not confirmed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub target_type: String,
    pub target_id: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// =============================================================================
// PROFILES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub projects: Vec<ProjectSummary>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
