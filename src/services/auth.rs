//! Session bridge: exchanges password, Google and Discord proofs for one
//! backend bearer token.
//!
//! DESIGN
//! ======
//! Each flow has its own backend exchange endpoint, but all of them end in
//! the same [`Session`]. Proof verification belongs to the identity provider
//! and the backend; this module only validates shape, forwards the proof and
//! refuses any success that carries no usable token.
//!
//! Discord authorization codes are single-use. A process-local ledger claims
//! each code (by SHA-256 digest) before it is exchanged, so a replayed
//! callback fails with `InvalidProof` without reaching the backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::Url;
use serde::Serialize;

use super::session::{Session, SessionUser, sha256_hex};
use crate::backend::types::{BackendUser, LoginGrant};
use crate::backend::{Backend, BackendError};

const DISCORD_AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
const DISCORD_SCOPES: &str = "identify email";

// =============================================================================
// DISCORD CONFIG
// =============================================================================

/// Discord OAuth settings. The client secret stays with the backend, which
/// performs the token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordConfig {
    pub client_id: String,
    pub redirect_uri: String,
}

impl DiscordConfig {
    /// Load from `DISCORD_CLIENT_ID` and `DISCORD_REDIRECT_URI`.
    /// Returns `None` if either is missing (Discord login is disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("DISCORD_CLIENT_ID").ok()?;
        let redirect_uri = std::env::var("DISCORD_REDIRECT_URI").ok()?;
        Some(Self { client_id, redirect_uri })
    }

    /// Build the Discord authorization URL carrying the CSRF `state`.
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> String {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", DISCORD_SCOPES),
            ("state", state),
        ];
        match Url::parse_with_params(DISCORD_AUTHORIZE_URL, &params) {
            Ok(url) => url.into(),
            Err(_) => DISCORD_AUTHORIZE_URL.to_owned(),
        }
    }
}

// =============================================================================
// PROOFS AND ERRORS
// =============================================================================

/// Evidence of identity presented to obtain a session.
#[derive(Clone)]
pub enum AuthProof {
    Password { email: String, password: String },
    Google { id_token: String },
    Discord { code: String },
}

impl AuthProof {
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::Google { .. } => "google",
            Self::Discord { .. } => "discord",
        }
    }
}

impl std::fmt::Debug for AuthProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { email, .. } => f.debug_struct("Password").field("email", email).finish_non_exhaustive(),
            Self::Google { .. } => f.write_str("Google"),
            Self::Discord { .. } => f.write_str("Discord"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or already used proof")]
    InvalidProof,
    #[error("authentication service unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("authentication succeeded but no token was issued")]
    MissingToken,
}

impl AuthError {
    /// Classify a backend failure for the given proof kind.
    fn from_backend(proof: &AuthProof, err: BackendError) -> Self {
        if err.is_upstream_failure() {
            return Self::UpstreamUnavailable(err.to_string());
        }
        match (proof, err) {
            (_, BackendError::Schema(msg) | BackendError::HttpClientBuild(msg)) => Self::UpstreamUnavailable(msg),
            (AuthProof::Discord { .. }, _) => Self::InvalidProof,
            _ => Self::InvalidCredentials,
        }
    }
}

// =============================================================================
// LOGIN ATTEMPT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginState {
    Idle,
    Submitting,
    Authenticated,
    Failed,
}

impl LoginState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::Failed)
    }
}

/// One login attempt: `Idle -> Submitting -> {Authenticated, Failed}`.
/// The attempt owns its proof until submission. Terminal states never move
/// again; a retry is a new attempt.
#[derive(Debug)]
pub struct LoginAttempt {
    proof: Option<AuthProof>,
    state: LoginState,
}

impl LoginAttempt {
    #[must_use]
    pub fn new(proof: AuthProof) -> Self {
        Self { proof: Some(proof), state: LoginState::Idle }
    }

    #[must_use]
    pub fn state(&self) -> LoginState {
        self.state
    }

    /// `Idle -> Submitting`, handing over the proof. `None` from any other
    /// state.
    pub fn submit(&mut self) -> Option<AuthProof> {
        if self.state != LoginState::Idle {
            return None;
        }
        self.state = LoginState::Submitting;
        self.proof.take()
    }

    /// `Submitting -> Authenticated | Failed`. Returns `false` unless submitting.
    pub fn resolve(&mut self, authenticated: bool) -> bool {
        if self.state != LoginState::Submitting {
            return false;
        }
        self.state = if authenticated { LoginState::Authenticated } else { LoginState::Failed };
        true
    }
}

// =============================================================================
// SINGLE-USE CODE LEDGER
// =============================================================================

/// Remembers redeemed OAuth codes for `ttl`, long enough to outlive the
/// provider's own code lifetime.
#[derive(Clone)]
pub struct CodeLedger {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl CodeLedger {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), ttl }
    }

    /// Claim `code`. Returns `false` if it was already claimed within the TTL.
    pub fn claim(&self, code: &str) -> bool {
        let now = Instant::now();
        let mut claimed = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        claimed.retain(|_, at| now.duration_since(*at) < self.ttl);
        match claimed.entry(sha256_hex(code)) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    #[cfg(test)]
    pub fn claimed_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// =============================================================================
// BRIDGE
// =============================================================================

pub struct SessionBridge {
    backend: Arc<dyn Backend>,
    discord_codes: CodeLedger,
    discord_redirect_uri: Option<String>,
}

impl SessionBridge {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, discord_codes: CodeLedger, discord_redirect_uri: Option<String>) -> Self {
        Self { backend, discord_codes, discord_redirect_uri }
    }

    /// Submit `attempt` and exchange its proof for a session. On return the
    /// attempt is `Authenticated` or `Failed`. No retries: a failed attempt
    /// is final.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials`: empty password fields, or the backend rejected
    ///   a password or Google proof.
    /// - `InvalidProof`: empty token/code, a replayed Discord code, a
    ///   Discord code the backend rejected, or an attempt already submitted.
    /// - `UpstreamUnavailable`: transport failure, 5xx or malformed body.
    /// - `MissingToken`: the backend reported success without a token.
    pub async fn authenticate(&self, attempt: &mut LoginAttempt) -> Result<Session, AuthError> {
        let Some(proof) = attempt.submit() else {
            tracing::warn!(state = ?attempt.state(), "login attempt already submitted");
            return Err(AuthError::InvalidProof);
        };
        let method = proof.method();

        let result = self.exchange(&proof).await;
        attempt.resolve(result.is_ok());
        debug_assert!(attempt.state().is_terminal());

        match &result {
            Ok(session) => tracing::info!(method, subject = %session.user.subject_id, "login succeeded"),
            Err(e) => tracing::warn!(method, error = %e, "login failed"),
        }
        result
    }

    async fn exchange(&self, proof: &AuthProof) -> Result<Session, AuthError> {
        let grant = match proof {
            AuthProof::Password { email, password } => {
                let email = email.trim();
                if email.is_empty() || password.is_empty() {
                    return Err(AuthError::InvalidCredentials);
                }
                self.backend.login_password(email, password).await
            }
            AuthProof::Google { id_token } => {
                let id_token = id_token.trim();
                if id_token.is_empty() {
                    return Err(AuthError::InvalidProof);
                }
                self.backend.exchange_google(id_token).await
            }
            AuthProof::Discord { code } => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(AuthError::InvalidProof);
                }
                let redirect_uri = self
                    .discord_redirect_uri
                    .as_deref()
                    .ok_or_else(|| AuthError::UpstreamUnavailable("discord login not configured".into()))?;
                if !self.discord_codes.claim(code) {
                    return Err(AuthError::InvalidProof);
                }
                self.backend.exchange_discord(code, redirect_uri).await
            }
        }
        .map_err(|e| AuthError::from_backend(proof, e))?;

        self.complete_session(grant).await
    }

    async fn complete_session(&self, grant: LoginGrant) -> Result<Session, AuthError> {
        let token = grant
            .token
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let user = match grant.user {
            Some(user) => user,
            None => self.backend.me(&token).await.map_err(|e| match e {
                BackendError::Unauthorized => AuthError::MissingToken,
                other => AuthError::UpstreamUnavailable(other.to_string()),
            })?,
        };

        Ok(Session { user: session_user(user), bearer_token: token })
    }
}

fn session_user(user: BackendUser) -> SessionUser {
    SessionUser { subject_id: user.id, display_name: user.username, email: user.email }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
