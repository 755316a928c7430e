//! Application configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! Values are injected at deploy time. A missing identity provider is not an
//! error: `identity` stays `None` and the app runs with the disabled identity
//! stub so the rest of the client still loads.

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Path of the OAuth callback route registered with the identity provider.
pub const CALLBACK_PATH: &str = "/auth/callback";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL in {var}: {value}")]
    InvalidUrl { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl HttpTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

/// Identity provider endpoint and public (anon) key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_url: String,
    pub site_url: String,
    pub identity: Option<IdentityConfig>,
    pub timeouts: HttpTimeouts,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `SCHOLARPATH_API_URL`: backend base URL (default `http://localhost:8000/api`)
    /// - `SCHOLARPATH_SITE_URL`: origin the OAuth callback is served from
    /// - `SUPABASE_URL` + `SUPABASE_ANON_KEY`: identity provider; both required to enable auth
    /// - `SCHOLARPATH_REQUEST_TIMEOUT_SECS`: default 20
    /// - `SCHOLARPATH_CONNECT_TIMEOUT_SECS`: default 5
    ///
    /// # Errors
    ///
    /// Returns an error when a URL variable is set but is not an absolute http(s) URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = url_var("SCHOLARPATH_API_URL", DEFAULT_API_URL)?;
        let site_url = url_var("SCHOLARPATH_SITE_URL", DEFAULT_SITE_URL)?;

        let identity = match (non_blank_var("SUPABASE_URL"), non_blank_var("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => {
                let url = normalize_url("SUPABASE_URL", &url)?;
                Some(IdentityConfig { url, anon_key })
            }
            _ => None,
        };

        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("SCHOLARPATH_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("SCHOLARPATH_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { api_url, site_url, identity, timeouts })
    }

    /// Absolute redirect target handed to the identity provider for OAuth and email links.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{CALLBACK_PATH}", self.site_url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            site_url: DEFAULT_SITE_URL.to_owned(),
            identity: None,
            timeouts: HttpTimeouts::default(),
        }
    }
}

fn non_blank_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn url_var(key: &'static str, default: &str) -> Result<String, ConfigError> {
    match non_blank_var(key) {
        Some(raw) => normalize_url(key, &raw),
        None => Ok(default.to_owned()),
    }
}

pub(crate) fn normalize_url(var: &'static str, raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|_| ConfigError::InvalidUrl { var, value: raw.to_owned() })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl { var, value: raw.to_owned() });
    }
    Ok(raw.trim_end_matches('/').to_owned())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
