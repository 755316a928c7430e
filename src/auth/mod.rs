//! Identity provider integration and the client session store.
//!
//! ARCHITECTURE
//! ============
//! `IdentityProvider` is the seam to the external identity service. It has two
//! implementations chosen once at startup: `SupabaseProvider` talks to a
//! GoTrue-compatible REST API, `DisabledProvider` answers every call with
//! `AuthError::NotConfigured` when no provider is configured.
//!
//! `SessionStore` is the only writer of the current session. Every other
//! component reads snapshots from it or subscribes to its change channel.
//!
//! ERROR HANDLING
//! ==============
//! Provider and network failures come back as `AuthError` values, never
//! panics, so callers can render inline errors next to the triggering control.

pub mod disabled;
pub mod storage;
pub mod store;
pub mod supabase;

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use disabled::DisabledProvider;
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StoredSession, UserMirror};
pub use store::{ListenerId, SessionStore};
pub use supabase::SupabaseProvider;

/// Sessions this close to expiry are treated as expired.
pub const EXPIRY_MARGIN_SECS: u64 = 10;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No identity provider is configured for this deployment.
    #[error("authentication is not configured")]
    NotConfigured,

    /// The provider rejected the request. `message` is the provider's own text.
    #[error("{message}")]
    Provider { status: u16, code: Option<String>, message: String },

    #[error("identity provider request failed: {0}")]
    Transport(String),

    #[error("identity provider response parse failed: {0}")]
    Decode(String),

    #[error("session storage failed: {0}")]
    Storage(String),

    #[error("invalid auth redirect: {0}")]
    InvalidRedirect(String),

    #[error("no active session")]
    NoSession,
}

impl AuthError {
    /// Temporary failure worth retrying: transport, rate limit or provider 5xx.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Provider { status: 429 | 500..=599, .. })
    }

    /// The provider answered and refused the credential for good.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Provider { status: 400..=499, .. }) && !self.retryable()
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

// =============================================================================
// USER + SESSION
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

/// User record as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    /// Best available human-readable name: full name, then name, then the
    /// local part of the email address.
    #[must_use]
    pub fn display_name(&self) -> String {
        let meta = &self.user_metadata;
        meta.full_name
            .as_deref()
            .or(meta.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_owned)
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| "Student".to_owned())
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.user_metadata
            .avatar_url
            .as_deref()
            .or(self.user_metadata.picture.as_deref())
    }

    /// Sign-in method recorded by the provider (`email`, `google`, ...).
    #[must_use]
    pub fn provider(&self) -> &str {
        self.app_metadata.provider.as_deref().unwrap_or("email")
    }
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

/// Authenticated identity record. Owned by [`SessionStore`]; everyone else
/// treats it as an immutable snapshot.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Expiry as unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user: AuthUser,
}

impl Session {
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref()
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        self.user.provider()
    }

    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now.saturating_add(EXPIRY_MARGIN_SECS))
    }

    /// Fill `expires_at` from `expires_in` when the provider only sent a lifetime.
    #[must_use]
    pub(crate) fn stamped(mut self, now: u64) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = self.expires_in.map(|secs| now.saturating_add(secs));
        }
        self
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user.id)
            .field("email", &self.user.email)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// =============================================================================
// REQUEST TYPES
// =============================================================================

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: &str, password: &str) -> Self {
        Self { email: email.trim().to_owned(), password: password.to_owned() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpOptions {
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The provider auto-confirmed the account and issued a session.
    Session(Session),
    /// The provider sent a confirmation email; no session yet.
    ConfirmationRequired { email: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
    Github,
    Azure,
    Apple,
}

impl OAuthProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Azure => "azure",
            Self::Apple => "apple",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "azure" | "microsoft" => Ok(Self::Azure),
            "apple" => Ok(Self::Apple),
            other => Err(AuthError::Provider {
                status: 400,
                code: Some("unsupported_provider".to_owned()),
                message: format!("unsupported OAuth provider: {other}"),
            }),
        }
    }
}

/// Verification flavor for one-time codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpKind {
    Email,
    Signup,
    MagicLink,
    Recovery,
}

impl OtpKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Signup => "signup",
            Self::MagicLink => "magiclink",
            Self::Recovery => "recovery",
        }
    }
}

/// Implicit-flow tokens carried back on the OAuth / email-link redirect.
#[derive(Clone, PartialEq, Eq)]
pub struct RedirectTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Option<u64>,
    pub expires_at: Option<u64>,
    pub token_type: Option<String>,
    /// `recovery` for password-reset links, `signup`/`magiclink`/... otherwise.
    pub kind: Option<String>,
}

impl fmt::Debug for RedirectTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectTokens")
            .field("expires_at", &self.expires_at)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// EVENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the session store, published on its watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    /// True until the stored session has been restored (or found absent).
    pub loading: bool,
    pub last_event: Option<AuthEvent>,
}

impl AuthSnapshot {
    #[must_use]
    pub fn loading() -> Self {
        Self { session: None, loading: true, last_event: None }
    }
}

// =============================================================================
// PROVIDER SEAM
// =============================================================================

/// Operations the client needs from the external identity provider.
///
/// Results mirror the provider's contract verbatim; the store does not
/// reinterpret failures.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// False for the disabled stub.
    fn is_enabled(&self) -> bool;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> AuthResult<Session>;

    async fn sign_up(
        &self,
        credentials: &Credentials,
        options: &SignUpOptions,
        redirect_to: &str,
    ) -> AuthResult<SignUpOutcome>;

    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;

    /// URL the browser must visit to start an OAuth round-trip that returns to `redirect_to`.
    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> AuthResult<String>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> AuthResult<()>;

    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> AuthResult<()>;

    async fn verify_otp(&self, email: &str, token: &str, kind: OtpKind) -> AuthResult<Session>;

    async fn get_user(&self, access_token: &str) -> AuthResult<AuthUser>;

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
