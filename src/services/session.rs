//! Session cookies and the request-scoped session slot.
//!
//! ARCHITECTURE
//! ============
//! The backend issues the bearer token; this service never stores sessions
//! itself. A session lives in two signed, HTTP-only cookies: `session_token`
//! holds the bearer token and `session_user` holds the hex-encoded JSON
//! identity together with a digest of that token. Each request builds a
//! [`SessionSlot`] from its cookies and threads it through handlers and
//! services; there is no process-wide auth state.
//!
//! TRUST
//! =====
//! Cookies that fail signature verification are dropped by the jar. An
//! identity whose token digest does not match the token cookie is treated
//! as no session at all, so identities cannot be swapped between tokens.
//!
//! INVALIDATION
//! ============
//! A backend 401 empties the slot before the error propagates. The route
//! layer then writes removal cookies, so a stale token is never replayed.

use std::fmt::Write;
use std::sync::{Mutex, PoisonError};

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::Duration;

use crate::backend::BackendError;
use crate::config::CookieSettings;

pub const SESSION_COOKIE: &str = "session_token";
pub const IDENTITY_COOKIE: &str = "session_user";

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

pub(crate) fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Hex SHA-256 of `input`.
pub(crate) fn sha256_hex(input: &str) -> String {
    bytes_to_hex(&Sha256::digest(input.as_bytes()))
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// SESSION
// =============================================================================

/// Identity half of a session. Safe to expose to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub subject_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Normalized login: backend bearer token plus minimal identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user: SessionUser,
    pub bearer_token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

fn base_cookie(name: &'static str, value: String, settings: CookieSettings) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure)
        .build()
}

/// Identity cookie payload: the user plus the digest of the token it was
/// issued with.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityCookie {
    #[serde(flatten)]
    user: SessionUser,
    token_digest: String,
}

/// Add both session cookies to `jar`.
#[must_use]
pub fn write_session(jar: SignedCookieJar, session: &Session, settings: CookieSettings) -> SignedCookieJar {
    let identity = IdentityCookie { user: session.user.clone(), token_digest: sha256_hex(&session.bearer_token) };
    let identity = serde_json::to_vec(&identity).unwrap_or_default();
    let max_age = Duration::seconds(settings.max_age_secs);

    let mut token_cookie = base_cookie(SESSION_COOKIE, session.bearer_token.clone(), settings);
    token_cookie.set_max_age(max_age);
    let mut identity_cookie = base_cookie(IDENTITY_COOKIE, bytes_to_hex(&identity), settings);
    identity_cookie.set_max_age(max_age);

    jar.add(token_cookie).add(identity_cookie)
}

/// Add removal cookies for both session cookies to `jar`.
#[must_use]
pub fn clear_session(jar: SignedCookieJar, settings: CookieSettings) -> SignedCookieJar {
    let mut token_cookie = base_cookie(SESSION_COOKIE, String::new(), settings);
    token_cookie.set_max_age(Duration::ZERO);
    let mut identity_cookie = base_cookie(IDENTITY_COOKIE, String::new(), settings);
    identity_cookie.set_max_age(Duration::ZERO);

    jar.add(token_cookie).add(identity_cookie)
}

/// Rebuild a session from request cookies. Both cookies must carry a valid
/// signature, be well-formed, and belong to each other.
#[must_use]
pub fn read_session(jar: &SignedCookieJar) -> Option<Session> {
    let token = jar.get(SESSION_COOKIE)?.value().to_owned();
    if token.is_empty() {
        return None;
    }
    let identity = jar.get(IDENTITY_COOKIE)?;
    let identity: IdentityCookie = serde_json::from_slice(&hex_to_bytes(identity.value())?).ok()?;
    if identity.token_digest != sha256_hex(&token) {
        tracing::warn!(subject = %identity.user.subject_id, "identity cookie does not match session token");
        return None;
    }
    Some(Session { user: identity.user, bearer_token: token })
}

// =============================================================================
// SESSION SLOT
// =============================================================================

#[derive(Debug, Default)]
struct SlotState {
    session: Option<Session>,
    invalidated: bool,
}

/// Request-scoped holder of the caller's session.
#[derive(Debug, Default)]
pub struct SessionSlot {
    state: Mutex<SlotState>,
}

impl SessionSlot {
    #[must_use]
    pub fn new(session: Option<Session>) -> Self {
        Self { state: Mutex::new(SlotState { session, invalidated: false }) }
    }

    #[must_use]
    pub fn from_jar(jar: &SignedCookieJar) -> Self {
        Self::new(read_session(jar))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    #[must_use]
    pub fn bearer(&self) -> Option<String> {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.bearer_token.clone())
    }

    /// Stable key for the bearer token, safe to log or use in maps.
    #[must_use]
    pub fn token_digest(&self) -> Option<String> {
        self.lock()
            .session
            .as_ref()
            .map(|s| sha256_hex(&s.bearer_token))
    }

    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.lock().session.as_ref().map(|s| s.user.clone())
    }

    /// Drop the session. Returns `true` if a session was present; calling it
    /// again, or on an anonymous slot, does nothing further.
    pub fn invalidate(&self) -> bool {
        let mut state = self.lock();
        state.invalidated = true;
        let dropped = state.session.take();
        if let Some(session) = &dropped {
            tracing::info!(subject = %session.user.subject_id, "session invalidated");
        }
        dropped.is_some()
    }

    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.lock().invalidated
    }

    /// Pass a backend result through, invalidating the session on 401.
    pub fn guard<T>(&self, result: Result<T, BackendError>) -> Result<T, BackendError> {
        if matches!(result, Err(BackendError::Unauthorized)) {
            self.invalidate();
        }
        result
    }

    /// Write removal cookies when the slot was invalidated during the request.
    #[must_use]
    pub fn sync_cookies(&self, jar: SignedCookieJar, settings: CookieSettings) -> SignedCookieJar {
        if self.is_invalidated() { clear_session(jar, settings) } else { jar }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
