//! Auth routes: password, Google and Discord logins, session cookies.
//!
//! Every login flow ends in the same pair of session cookies written by
//! [`session::write_session`]. A failed login never writes a cookie.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use serde::Deserialize;
use time::Duration;

use crate::config::CookieSettings;
use crate::services::auth::{AuthError, AuthProof, LoginAttempt};
use crate::services::session::{self, SessionSlot, SessionUser};
use crate::state::AppState;

const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;
const LOGIN_PATH: &str = "/login";

pub(crate) fn auth_error_to_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials | AuthError::InvalidProof => StatusCode::UNAUTHORIZED,
        AuthError::UpstreamUnavailable(_) | AuthError::MissingToken => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// EXTRACTORS
// =============================================================================

/// The caller's session, possibly anonymous. Never rejects: cookies with a
/// bad signature or a mismatched identity read as no session.
pub struct RequestSession {
    pub slot: SessionSlot,
    pub jar: SignedCookieJar,
}

impl RequestSession {
    /// Response cookies for this request: removal cookies if a backend 401
    /// invalidated the session while handling it.
    #[must_use]
    pub fn response_jar(self, settings: CookieSettings) -> SignedCookieJar {
        self.slot.sync_cookies(self.jar, settings)
    }
}

impl<S> FromRequestParts<S> for RequestSession
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(state));
        Ok(Self { slot: SessionSlot::from_jar(&jar), jar })
    }
}

/// Signed-in user extracted from the session cookies.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: SessionUser,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Key: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(state));
        let session = session::read_session(&jar).ok_or(StatusCode::UNAUTHORIZED)?;
        Ok(Self { user: session.user })
    }
}

// =============================================================================
// CREDENTIAL LOGINS
// =============================================================================

#[derive(Deserialize)]
pub struct PasswordLoginBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginBody {
    /// Google Identity Services posts the ID token as `credential`.
    #[serde(default, alias = "credential")]
    pub id_token: String,
}

async fn complete_login(state: &AppState, jar: SignedCookieJar, proof: AuthProof) -> Response {
    let mut attempt = LoginAttempt::new(proof);
    let result = state.bridge.authenticate(&mut attempt).await;
    tracing::debug!(state = ?attempt.state(), "login attempt settled");
    match result {
        Ok(session) => {
            let jar = session::write_session(jar, &session, state.cookies());
            (jar, Json(session.user)).into_response()
        }
        Err(e) => {
            let body = serde_json::json!({ "error": e.to_string(), "state": attempt.state() });
            (auth_error_to_status(&e), Json(body)).into_response()
        }
    }
}

/// `POST /api/auth/login`: email + password login.
pub async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(body): Json<PasswordLoginBody>,
) -> Response {
    complete_login(&state, jar, AuthProof::Password { email: body.email, password: body.password }).await
}

/// `POST /api/auth/google`: exchange a Google ID token.
pub async fn google(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(body): Json<GoogleLoginBody>,
) -> Response {
    complete_login(&state, jar, AuthProof::Google { id_token: body.id_token }).await
}

// =============================================================================
// DISCORD
// =============================================================================

fn oauth_state_cookie(value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// `GET /auth/discord`: redirect to Discord's authorization page.
pub async fn discord_redirect(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    let Some(config) = &state.config.discord else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Discord login not configured").into_response();
    };

    let oauth_state = session::generate_token();
    let cookie = oauth_state_cookie(
        oauth_state.clone(),
        state.cookies().secure,
        Duration::minutes(OAUTH_STATE_TTL_MINUTES),
    );
    (jar.add(cookie), Redirect::temporary(&config.authorize_url(&oauth_state))).into_response()
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn login_failed(jar: SignedCookieJar, reason: &str) -> Response {
    (jar, Redirect::temporary(&format!("{LOGIN_PATH}?error={reason}"))).into_response()
}

/// `GET /auth/discord/callback`: verify state, exchange code, set cookies.
pub async fn discord_callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Query(params): Query<CallbackQuery>,
) -> Response {
    if state.config.discord.is_none() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Discord login not configured").into_response();
    }

    let expected_state = jar
        .get(OAUTH_STATE_COOKIE_NAME)
        .map(|c| c.value().to_owned())
        .unwrap_or_default();
    let jar = jar.add(oauth_state_cookie(String::new(), state.cookies().secure, Duration::ZERO));

    if let Some(error) = params.error.as_deref() {
        tracing::warn!(%error, "discord authorization denied");
        return login_failed(jar, "discord_denied");
    }
    let callback_state = params.state.as_deref().unwrap_or_default();
    if expected_state.is_empty() || expected_state != callback_state {
        tracing::warn!("discord callback with invalid oauth state");
        return login_failed(jar, "invalid_state");
    }

    let mut attempt = LoginAttempt::new(AuthProof::Discord { code: params.code.unwrap_or_default() });
    match state.bridge.authenticate(&mut attempt).await {
        Ok(session) => {
            let jar = session::write_session(jar, &session, state.cookies());
            (jar, Redirect::temporary("/")).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, state = ?attempt.state(), "discord login failed");
            login_failed(jar, "discord")
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// `GET /api/auth/me`: return the identity stored in the session cookies.
pub async fn me(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: clear session cookies. Works without a session.
pub async fn logout(State(state): State<AppState>, session: RequestSession) -> impl IntoResponse {
    if let Some(current) = session.slot.current() {
        tracing::info!(subject = %current.user.subject_id, "logout");
    }
    (session::clear_session(session.jar, state.cookies()), StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
