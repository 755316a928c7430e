//! Session store: the single owner and writer of the current session.
//!
//! SYSTEM CONTEXT
//! ==============
//! The route gate, profile reconciler, callback handler and API client all
//! read from here. Changes are published two ways: a `watch` channel carrying
//! the latest `AuthSnapshot` (for async waiters such as the callback handler)
//! and synchronous listeners registered with `on_change` (provider-style
//! auth-state callbacks).
//!
//! LIFECYCLE
//! =========
//! A new store is `loading` until `init` has restored the persisted session.
//! Sign-out always clears storage, including the cached user mirror, even if
//! the provider call fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OnceCell, watch};

use super::{
    AuthError, AuthEvent, AuthResult, AuthSnapshot, Credentials, IdentityProvider, OAuthProvider, OtpKind,
    RedirectTokens, Session, SessionStorage, SignUpOptions, SignUpOutcome, StoredSession, UserMirror, unix_now,
};
use crate::api::TokenSource;

pub type ListenerId = u64;

type Listener = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn SessionStorage>,
    redirect_to: String,
    state: watch::Sender<AuthSnapshot>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    initialized: OnceCell<()>,
}

impl SessionStore {
    /// `redirect_to` is the absolute URL of the application's callback route.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, storage: Arc<dyn SessionStorage>, redirect_to: String) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::loading());
        Self {
            provider,
            storage,
            redirect_to,
            state,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            initialized: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.provider.is_enabled()
    }

    #[must_use]
    pub fn redirect_to(&self) -> &str {
        &self.redirect_to
    }

    // =========================================================================
    // READ SIDE
    // =========================================================================

    #[must_use]
    pub fn get_session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    /// Cached user attributes from storage, if any.
    #[must_use]
    pub fn user_mirror(&self) -> Option<UserMirror> {
        self.storage
            .load()
            .ok()
            .flatten()
            .and_then(|stored| stored.user_mirror)
    }

    /// Register a listener for every auth event. Listeners run synchronously
    /// on the task that caused the change.
    pub fn on_change<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns `true` if a listener was removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Restore the persisted session and clear the loading flag. Concurrent
    /// and repeated calls share the first restoration. An expired session the
    /// provider cannot refresh right now stays in storage for the next start.
    pub async fn init(&self) -> Option<Session> {
        self.initialized.get_or_init(|| self.restore()).await;
        self.get_session()
    }

    async fn restore(&self) {
        let stored = self.storage.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "session storage unreadable; starting signed out");
            None
        });

        let session = match stored {
            None => None,
            Some(stored) if !stored.session.is_expired(unix_now()) => Some(stored.session),
            Some(stored) => match self.provider.refresh_session(&stored.session.refresh_token).await {
                Ok(fresh) => {
                    tracing::info!(user_id = %fresh.user_id(), "refreshed expired stored session");
                    self.persist(&fresh);
                    Some(fresh)
                }
                Err(e) if e.is_rejection() => {
                    tracing::info!(error = %e, "stored session expired and was rejected");
                    self.forget();
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stored session expired; refresh unavailable, keeping it for next start");
                    None
                }
            },
        };

        self.publish(AuthEvent::InitialSession, session);
    }

    // =========================================================================
    // PROVIDER OPERATIONS
    // =========================================================================

    /// # Errors
    ///
    /// Returns the provider's error unchanged; the current session is untouched.
    pub async fn sign_in(&self, credentials: &Credentials) -> AuthResult<Session> {
        let session = self.provider.sign_in_with_password(credentials).await?;
        self.establish(AuthEvent::SignedIn, session.clone());
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn sign_up(&self, credentials: &Credentials, options: &SignUpOptions) -> AuthResult<SignUpOutcome> {
        let outcome = self
            .provider
            .sign_up(credentials, options, &self.redirect_to)
            .await?;
        if let SignUpOutcome::Session(session) = &outcome {
            self.establish(AuthEvent::SignedIn, session.clone());
        }
        Ok(outcome)
    }

    /// Sign out locally and at the provider. Local state is cleared even when
    /// the provider call fails; that failure is still returned.
    ///
    /// # Errors
    ///
    /// Returns the provider's sign-out error, if any.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let result = match self.get_session() {
            Some(session) => self.provider.sign_out(&session.access_token).await,
            None => Ok(()),
        };
        if let Err(e) = &result {
            tracing::warn!(error = %e, "provider sign-out failed; clearing local session anyway");
        }
        self.forget();
        self.publish(AuthEvent::SignedOut, None);
        result
    }

    /// Authorize URL for an OAuth round-trip that lands on the callback route.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` when no provider is configured.
    pub fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthResult<String> {
        self.provider.authorize_url(provider, &self.redirect_to)
    }

    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        self.provider
            .reset_password_for_email(email.trim(), &self.redirect_to)
            .await
    }

    /// Send a magic link / one-time code to `email`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn sign_in_with_otp(&self, email: &str) -> AuthResult<()> {
        self.provider
            .sign_in_with_otp(email.trim(), &self.redirect_to)
            .await
    }

    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn verify_otp(&self, email: &str, token: &str) -> AuthResult<Session> {
        let session = self
            .provider
            .verify_otp(email.trim(), token.trim(), OtpKind::Email)
            .await?;
        self.establish(AuthEvent::SignedIn, session.clone());
        Ok(session)
    }

    /// Exchange the refresh token for a new session. A provider rejection (4xx
    /// other than 429) means the session is gone for good and signs the user
    /// out. Transport errors, rate limits and provider 5xx keep the session.
    ///
    /// # Errors
    ///
    /// Returns `NoSession` when signed out, otherwise the provider's error.
    pub async fn refresh(&self) -> AuthResult<Session> {
        let current = self.get_session().ok_or(AuthError::NoSession)?;
        match self.provider.refresh_session(&current.refresh_token).await {
            Ok(fresh) => {
                self.establish(AuthEvent::TokenRefreshed, fresh.clone());
                Ok(fresh)
            }
            Err(e) if e.is_rejection() => {
                tracing::info!(error = %e, "refresh token rejected; signing out");
                self.forget();
                self.publish(AuthEvent::SignedOut, None);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Adopt implicit-flow tokens from an OAuth or email-link redirect.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider does not recognize the access token.
    pub async fn set_session_from_redirect(&self, tokens: &RedirectTokens) -> AuthResult<Session> {
        let user = self.provider.get_user(&tokens.access_token).await?;
        let session = Session {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_in: tokens.expires_in,
            expires_at: tokens.expires_at,
            token_type: tokens
                .token_type
                .clone()
                .unwrap_or_else(|| "bearer".to_owned()),
            user,
        }
        .stamped(unix_now());

        let event = if tokens.kind.as_deref() == Some("recovery") {
            AuthEvent::PasswordRecovery
        } else {
            AuthEvent::SignedIn
        };
        self.establish(event, session.clone());
        Ok(session)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn establish(&self, event: AuthEvent, session: Session) {
        self.persist(&session);
        self.publish(event, Some(session));
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.storage.save(&StoredSession::new(session.clone())) {
            tracing::warn!(error = %e, "failed to persist session");
        }
    }

    fn forget(&self) {
        if let Err(e) = self.storage.clear() {
            tracing::warn!(error = %e, "failed to clear stored session");
        }
    }

    fn publish(&self, event: AuthEvent, session: Option<Session>) {
        tracing::info!(
            %event,
            user_id = ?session.as_ref().map(Session::user_id),
            "auth state changed"
        );
        self.state.send_replace(AuthSnapshot {
            session: session.clone(),
            loading: false,
            last_event: Some(event),
        });

        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event, session.as_ref());
        }
    }
}

impl TokenSource for SessionStore {
    fn access_token(&self) -> Option<String> {
        self.state
            .borrow()
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
