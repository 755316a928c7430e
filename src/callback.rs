//! OAuth / email-link callback handling.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs only when the browser returns to `/auth/callback` after the identity
//! provider round-trip. Providers report results in the query string or in
//! the URL fragment depending on flow, so both are read.
//!
//! LIFECYCLE
//! =========
//! 1. Wait for the session store to finish restoring. The session is never
//!    inspected while `loading` is true; concluding "no session" early is
//!    the race this ordering exists to prevent.
//! 2. A provider-reported error wins over everything else.
//! 3. Implicit-flow tokens in the URL are adopted if no session exists yet.
//! 4. A session now present means success; anything else is a failure.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::auth::{AuthError, AuthResult, RedirectTokens, Session, SessionStore};
use crate::route::View;

const AUTH_FAILED: &str = "authentication failed";
const DEFAULT_ERROR_DESCRIPTION: &str = "The identity provider did not complete sign-in.";

// =============================================================================
// PARAMS
// =============================================================================

/// Error reported by the provider on the redirect (`error=access_denied`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRedirectError {
    pub code: String,
    pub description: String,
}

/// Query and fragment parameters of a callback URL, merged. Fragment values
/// win when a key appears in both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    values: BTreeMap<String, String>,
}

impl CallbackParams {
    /// Accepts an absolute URL or a bare path such as `/auth/callback#...`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRedirect` if `url` cannot be parsed.
    pub fn parse(url: &str) -> AuthResult<Self> {
        let parsed = Url::parse(url)
            .or_else(|_| Url::parse("http://localhost/").and_then(|base| base.join(url)))
            .map_err(|e| AuthError::InvalidRedirect(format!("{url}: {e}")))?;

        let mut values: BTreeMap<String, String> = parsed.query_pairs().into_owned().collect();
        if let Some(fragment) = parsed.fragment() {
            values.extend(url::form_urlencoded::parse(fragment.as_bytes()).into_owned());
        }
        Ok(Self { values })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn provider_error(&self) -> Option<ProviderRedirectError> {
        let code = self.get("error_code").or_else(|| self.get("error"));
        let description = self.get("error_description");
        if code.is_none() && description.is_none() {
            return None;
        }
        Some(ProviderRedirectError {
            code: code.unwrap_or("unknown_error").to_owned(),
            description: description.unwrap_or(DEFAULT_ERROR_DESCRIPTION).to_owned(),
        })
    }

    /// Implicit-flow tokens, when both access and refresh token are present.
    #[must_use]
    pub fn tokens(&self) -> Option<RedirectTokens> {
        let access_token = self.get("access_token")?;
        let refresh_token = self.get("refresh_token")?;
        Some(RedirectTokens {
            access_token: access_token.to_owned(),
            refresh_token: refresh_token.to_owned(),
            expires_in: self.get("expires_in").and_then(|v| v.parse().ok()),
            expires_at: self.get("expires_at").and_then(|v| v.parse().ok()),
            token_type: self.get("token_type").map(str::to_owned),
            kind: self.get("type").map(str::to_owned),
        })
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Provider-reported failure; the user is offered a way back to login.
    Error { code: String, description: String },
    Authenticated(Session),
    Failed(String),
    /// The session store never finished loading within the wait bound.
    TimedOut,
}

impl CallbackOutcome {
    /// Where the retry affordance leads; `None` on success.
    #[must_use]
    pub fn retry_view(&self) -> Option<View> {
        match self {
            Self::Authenticated(_) => None,
            Self::Error { .. } | Self::Failed(_) | Self::TimedOut => Some(View::Login),
        }
    }
}

/// Resolve a callback URL into an outcome. Waits at most `wait` for the
/// store to finish loading.
pub async fn handle_callback(store: &SessionStore, url: &str, wait: Duration) -> CallbackOutcome {
    let mut state = store.subscribe();
    let loaded = tokio::time::timeout(wait, async {
        state.wait_for(|snapshot| !snapshot.loading).await.map(|_| ())
    })
    .await;
    match loaded {
        Err(_) => {
            tracing::warn!(?wait, "session store still loading; giving up on callback");
            return CallbackOutcome::TimedOut;
        }
        Ok(Err(_)) => return CallbackOutcome::Failed(AUTH_FAILED.to_owned()),
        Ok(Ok(())) => {}
    }

    let params = match CallbackParams::parse(url) {
        Ok(params) => params,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable callback URL");
            return CallbackOutcome::Failed(e.to_string());
        }
    };

    if let Some(err) = params.provider_error() {
        tracing::warn!(code = %err.code, description = %err.description, "identity provider reported an error");
        return CallbackOutcome::Error { code: err.code, description: err.description };
    }

    if store.get_session().is_none() {
        if let Some(tokens) = params.tokens() {
            if let Err(e) = store.set_session_from_redirect(&tokens).await {
                tracing::warn!(error = %e, "redirect tokens rejected");
                return CallbackOutcome::Failed(e.to_string());
            }
        }
    }

    match store.get_session() {
        Some(session) => CallbackOutcome::Authenticated(session),
        None => {
            tracing::info!("callback finished without a session");
            CallbackOutcome::Failed(AUTH_FAILED.to_owned())
        }
    }
}

#[cfg(test)]
#[path = "callback_test.rs"]
mod tests;
