use super::*;

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request};
use tower::ServiceExt;

use crate::backend::mock::MockBackend;
use crate::state::test_helpers::{test_app_state, test_key};

// =============================================================================
// request helpers shared by the route tests
// =============================================================================

pub(crate) struct Sent {
    pub status: StatusCode,
    pub set_cookies: Vec<String>,
    pub location: Option<String>,
    pub body: serde_json::Value,
}

impl Sent {
    /// Verified value of the `Set-Cookie` for `name`, with its header.
    fn signed_cookie(&self, name: &str) -> Option<(String, &str)> {
        self.set_cookies.iter().find_map(|c| {
            let pair = c.split(';').next()?;
            if !pair.starts_with(&format!("{name}=")) {
                return None;
            }
            let mut headers = HeaderMap::new();
            headers.insert(COOKIE, pair.parse().ok()?);
            let jar = SignedCookieJar::from_headers(&headers, test_key());
            jar.get(name).map(|cookie| (cookie.value().to_owned(), c.as_str()))
        })
    }

    /// Value the response sets for `name`, after signature verification.
    pub fn cookie_value(&self, name: &str) -> Option<String> {
        self.signed_cookie(name).map(|(value, _)| value)
    }

    /// True when a `Set-Cookie` header removes `name`.
    pub fn clears_cookie(&self, name: &str) -> bool {
        self.signed_cookie(name)
            .is_some_and(|(value, header)| value.is_empty() && header.contains("Max-Age=0"))
    }

    pub fn sets_cookie(&self, name: &str) -> bool {
        self.signed_cookie(name)
            .is_some_and(|(value, header)| !value.is_empty() && !header.contains("Max-Age=0"))
    }
}

pub(crate) async fn send(router: Router, request: Request<Body>) -> Sent {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let set_cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_owned())
        .collect();
    let location = response
        .headers()
        .get(LOCATION)
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Sent { status, set_cookies, location, body }
}

pub(crate) fn json_request(method: Method, uri: &str, cookie: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub(crate) fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

// =============================================================================
// backend_error_to_status
// =============================================================================

#[test]
fn backend_errors_map_to_statuses() {
    assert_eq!(backend_error_to_status(&BackendError::Unauthorized), StatusCode::UNAUTHORIZED);
    assert_eq!(
        backend_error_to_status(&BackendError::Api { status: 404, message: "no such project".into() }),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        backend_error_to_status(&BackendError::Api { status: 503, message: "down".into() }),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(backend_error_to_status(&BackendError::Transport("reset".into())), StatusCode::BAD_GATEWAY);
    assert_eq!(backend_error_to_status(&BackendError::Schema("shape".into())), StatusCode::BAD_GATEWAY);
    assert_eq!(
        backend_error_to_status(&BackendError::HttpClientBuild("tls".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn action_errors_map_to_statuses() {
    assert_eq!(action_error_to_status(&ActionError::Unauthorized), StatusCode::UNAUTHORIZED);
    assert_eq!(action_error_to_status(&ActionError::Validation("x".into())), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(action_error_to_status(&ActionError::Network("x".into())), StatusCode::BAD_GATEWAY);
    assert_eq!(action_error_to_status(&ActionError::Unknown("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// MutationResponse
// =============================================================================

#[test]
fn committed_outcome_serializes_without_message() {
    let body = serde_json::to_value(MutationResponse::from_outcome(Outcome::Committed(7))).unwrap();
    assert_eq!(body, serde_json::json!({ "status": "committed", "displayed": 7, "retryable": false }));
    assert_eq!(outcome_to_status(&Outcome::Committed(7)), StatusCode::OK);
}

#[test]
fn unauthorized_rollback_requests_login_redirect() {
    let outcome = Outcome::RolledBack { value: false, error: ActionError::Unauthorized };
    assert_eq!(outcome_to_status(&outcome), StatusCode::UNAUTHORIZED);
    let body = serde_json::to_value(MutationResponse::from_outcome(outcome)).unwrap();
    assert_eq!(body["status"], "rolled_back");
    assert_eq!(body["displayed"], false);
    assert_eq!(body["redirect"], "/login");
    assert_eq!(body["retryable"], false);
}

#[test]
fn network_rollback_is_retryable_without_redirect() {
    let outcome = Outcome::RolledBack { value: 1, error: ActionError::Network("timeout".into()) };
    assert_eq!(outcome_to_status(&outcome), StatusCode::BAD_GATEWAY);
    let body = serde_json::to_value(MutationResponse::from_outcome(outcome)).unwrap();
    assert_eq!(body["retryable"], true);
    assert!(body.get("redirect").is_none());
}

#[test]
fn busy_outcome_is_conflict_without_displayed_value() {
    assert_eq!(outcome_to_status(&Outcome::<u8>::Busy), StatusCode::CONFLICT);
    let body = serde_json::to_value(MutationResponse::from_outcome(Outcome::<u8>::Busy)).unwrap();
    assert_eq!(body["status"], "busy");
    assert!(body["displayed"].is_null());
}

// =============================================================================
// router
// =============================================================================

#[tokio::test]
async fn healthz_responds_ok() {
    let sent = send(app(test_app_state(Arc::new(MockBackend::new()))), get_request("/healthz", None)).await;
    assert_eq!(sent.status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let sent = send(app(test_app_state(Arc::new(MockBackend::new()))), get_request("/api/nope", None)).await;
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mutation_without_current_state_is_rejected_by_extractor() {
    let router = app(test_app_state(Arc::new(MockBackend::new())));
    let sent = send(
        router,
        json_request(Method::POST, "/api/projects/p1/rating", None, &serde_json::json!({ "rating": 4 })),
    )
    .await;
    assert_eq!(sent.status, StatusCode::UNPROCESSABLE_ENTITY);
}
