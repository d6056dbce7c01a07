//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! carries no per-user data: sessions travel in request cookies and are
//! rebuilt per request. The only cross-request state is the reconciler's
//! in-flight set, the Discord code ledger and the cookie signing key.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::backend::Backend;
use crate::config::{AppConfig, CookieSecret, CookieSettings};
use crate::services::auth::{CodeLedger, SessionBridge};
use crate::services::social::Social;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub bridge: Arc<SessionBridge>,
    pub social: Social,
    pub config: Arc<AppConfig>,
    pub cookie_key: Key,
}

impl AppState {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, config: AppConfig) -> Self {
        let ledger = CodeLedger::new(Duration::from_secs(config.discord_code_ttl_secs));
        let redirect_uri = config.discord.as_ref().map(|d| d.redirect_uri.clone());
        Self {
            bridge: Arc::new(SessionBridge::new(backend.clone(), ledger, redirect_uri)),
            social: Social::new(backend.clone()),
            backend,
            cookie_key: cookie_key(config.cookie_secret.as_ref()),
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn cookies(&self) -> CookieSettings {
        self.config.cookies
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Signing key from the configured secret, or a random one for this process.
fn cookie_key(secret: Option<&CookieSecret>) -> Key {
    match secret.map(|s| Key::try_from(s.as_bytes())) {
        Some(Ok(key)) => key,
        Some(Err(e)) => {
            tracing::error!(error = %e, "unusable COOKIE_SECRET; using a random cookie key");
            Key::generate()
        }
        None => {
            tracing::warn!("COOKIE_SECRET not set; sessions will not survive a restart");
            Key::generate()
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
