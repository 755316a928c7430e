//! Backend HTTP API client.
//!
//! SYSTEM CONTEXT
//! ==============
//! All backend traffic goes through `ApiClient::request`. Which failures are
//! swallowed is not decided at call sites: `policy` declares, per endpoint,
//! whether an error propagates or is replaced by a documented empty payload.
//!
//! ERROR HANDLING
//! ==============
//! Read-only, aggregable data (stats, deadlines, matches) falls back on
//! failure so one broken subsystem cannot blank a whole dashboard.
//! State-changing or identity-critical calls (profile, applications) always
//! propagate so the caller must handle them.

pub mod client;
pub mod policy;
pub mod types;

pub use client::ApiClient;
pub use policy::{CallPolicy, Endpoint, Fetched};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The endpoint needs a bearer token and no session is available.
    /// Raised before any request is sent.
    #[error("authentication required")]
    AuthRequired,

    /// Non-2xx response. `message` is the server's own message when it sent one.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("response parse failed: {0}")]
    Decode(String),

    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout | Self::Http { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TOKEN SOURCE
// =============================================================================

/// Supplies the bearer token for authenticated calls.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Fixed token (or none), for tools and tests that hold a token directly.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self(Some(token.to_owned()))
    }

    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}
