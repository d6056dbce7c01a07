//! Service configuration parsed from environment variables.

use crate::services::auth::DiscordConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BACKEND_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_DISCORD_CODE_TTL_SECS: u64 = 600;
/// Minimum key material for signing session cookies.
pub const MIN_COOKIE_SECRET_BYTES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_secs: i64,
}

/// Master secret for signing cookies. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieSecret(Vec<u8>);

impl CookieSecret {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for CookieSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CookieSecret(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub backend_url: String,
    pub backend_timeouts: BackendTimeouts,
    pub cookies: CookieSettings,
    /// `None` means a random key per process: sessions end on restart.
    pub cookie_secret: Option<CookieSecret>,
    pub discord: Option<DiscordConfig>,
    pub discord_code_ttl_secs: u64,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `BACKEND_URL`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `BACKEND_REQUEST_TIMEOUT_SECS`: default 30
    /// - `BACKEND_CONNECT_TIMEOUT_SECS`: default 10
    /// - `COOKIE_SECURE`: inferred from an `https://` Discord redirect URI when unset
    /// - `SESSION_MAX_AGE_SECS`: default one week
    /// - `COOKIE_SECRET`: at least 64 bytes; a random per-process key when unset
    /// - `DISCORD_CODE_TTL_SECS`: default 600
    /// - `DISCORD_CLIENT_ID` + `DISCORD_REDIRECT_URI`: Discord login disabled when absent
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_url = std::env::var("BACKEND_URL")
            .map_err(|_| ConfigError::Missing("BACKEND_URL"))?
            .trim()
            .trim_end_matches('/')
            .to_owned();
        if backend_url.is_empty() {
            return Err(ConfigError::Missing("BACKEND_URL"));
        }

        let port = env_parse_strict("PORT", DEFAULT_PORT)?;
        let backend_timeouts = BackendTimeouts {
            request_secs: env_parse("BACKEND_REQUEST_TIMEOUT_SECS", DEFAULT_BACKEND_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("BACKEND_CONNECT_TIMEOUT_SECS", DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS),
        };
        let discord = DiscordConfig::from_env();
        let cookies = CookieSettings {
            secure: cookie_secure(env_bool("COOKIE_SECURE"), discord.as_ref()),
            max_age_secs: env_parse("SESSION_MAX_AGE_SECS", DEFAULT_SESSION_MAX_AGE_SECS),
        };

        let cookie_secret = cookie_secret(std::env::var("COOKIE_SECRET").ok())?;

        Ok(Self {
            port,
            backend_url,
            backend_timeouts,
            cookies,
            cookie_secret,
            discord,
            discord_code_ttl_secs: env_parse("DISCORD_CODE_TTL_SECS", DEFAULT_DISCORD_CODE_TTL_SECS),
        })
    }
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().and_then(|raw| parse_bool(&raw))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Explicit setting wins; otherwise cookies are secure when the public
/// callback is served over https.
pub(crate) fn cookie_secure(explicit: Option<bool>, discord: Option<&DiscordConfig>) -> bool {
    explicit.unwrap_or_else(|| discord.is_some_and(|d| d.redirect_uri.starts_with("https://")))
}

/// Validate `COOKIE_SECRET`. Blank counts as unset; anything shorter than
/// [`MIN_COOKIE_SECRET_BYTES`] is rejected.
pub(crate) fn cookie_secret(raw: Option<String>) -> Result<Option<CookieSecret>, ConfigError> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(None);
    };
    if raw.len() < MIN_COOKIE_SECRET_BYTES {
        return Err(ConfigError::Invalid {
            var: "COOKIE_SECRET",
            value: format!("{} bytes, need at least {MIN_COOKIE_SECRET_BYTES}", raw.len()),
        });
    }
    Ok(Some(CookieSecret(raw.into_bytes())))
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_parse_strict<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var: key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
