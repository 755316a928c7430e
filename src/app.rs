//! Application context: the one injected object that wires the session
//! store, API client and profile reconciler together.
//!
//! ARCHITECTURE
//! ============
//! ```text
//!   SessionStore ──watch──► sync task ──► ProfileReconciler ──► profile watch
//!        │                                                          │
//!        └───────────── loading / session ────┐   ┌── complete ─────┘
//!                                             ▼   ▼
//!                                          RouteState ──► gate(view)
//! ```
//!
//! LIFECYCLE
//! =========
//! `bootstrap` restores the session, reconciles the profile once, then
//! spawns a task that reconciles again on every auth change. Reconciles are
//! serialized; a result computed for a user who is no longer signed in is
//! dropped instead of published. `shutdown` aborts the task.
//!
//! While a session exists but its profile has not been resolved yet, the
//! route state reads as `Loading` so no view is chosen from stale
//! completeness.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiError, TokenSource};
use crate::auth::{
    AuthEvent, AuthSnapshot, DisabledProvider, IdentityProvider, MemoryStorage, Session, SessionStorage, SessionStore,
    SupabaseProvider,
};
use crate::callback::{self, CallbackOutcome};
use crate::config::AppConfig;
use crate::profile::{Profile, ProfileReconciler, ProfileState, ProfileUpdate};
use crate::route::{GateDecision, RouteState, View, gate};

/// Upper bound on how long the callback route waits for session restore.
pub const CALLBACK_WAIT: Duration = Duration::from_secs(10);

/// Where the callback route sends the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackNavigation {
    /// Error screen with a retry link to `retry`.
    ShowError { message: String, retry: View },
    Go(GateDecision),
}

// =============================================================================
// APP
// =============================================================================

pub struct App {
    config: AppConfig,
    store: Arc<SessionStore>,
    api: ApiClient,
    sync: Arc<ProfileSync>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Shared between the app and its background task.
struct ProfileSync {
    store: Arc<SessionStore>,
    reconciler: ProfileReconciler,
    state: watch::Sender<ProfileState>,
    running: tokio::sync::Mutex<()>,
}

impl App {
    /// Build the app from configuration with in-memory session storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the API or identity HTTP clients cannot be built.
    pub async fn bootstrap(config: AppConfig) -> Result<Self, ApiError> {
        Self::bootstrap_with_storage(config, Arc::new(MemoryStorage::new())).await
    }

    /// Like `bootstrap`, persisting the session in `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API or identity HTTP clients cannot be built.
    pub async fn bootstrap_with_storage(config: AppConfig, storage: Arc<dyn SessionStorage>) -> Result<Self, ApiError> {
        let provider: Arc<dyn IdentityProvider> = match &config.identity {
            Some(identity) => Arc::new(
                SupabaseProvider::new(identity, config.timeouts)
                    .map_err(|e| ApiError::ClientBuild(e.to_string()))?,
            ),
            None => {
                tracing::warn!("identity provider not configured; authentication disabled");
                Arc::new(DisabledProvider)
            }
        };
        Self::with_parts(config, provider, storage).await
    }

    /// Assemble from explicit parts, restore the session and start profile sync.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be built.
    pub async fn with_parts(
        config: AppConfig,
        provider: Arc<dyn IdentityProvider>,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, ApiError> {
        let store = Arc::new(SessionStore::new(provider, storage, config.callback_url()));
        let api = ApiClient::new(&config.api_url, config.timeouts, Arc::clone(&store) as Arc<dyn TokenSource>)?;
        let (state, _) = watch::channel(ProfileState::empty());
        let sync = Arc::new(ProfileSync {
            store: Arc::clone(&store),
            reconciler: ProfileReconciler::new(api.clone()),
            state,
            running: tokio::sync::Mutex::new(()),
        });

        store.init().await;
        let changes = store.subscribe();
        sync.run().await;
        let task = spawn_profile_sync(Arc::clone(&sync), changes);

        tracing::info!(
            api_url = %config.api_url,
            auth_enabled = store.is_enabled(),
            signed_in = store.get_session().is_some(),
            "app bootstrapped"
        );
        Ok(Self { config, store, api, sync, task: Mutex::new(Some(task)) })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn session_store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.store.get_session()
    }

    // =========================================================================
    // ROUTING
    // =========================================================================

    #[must_use]
    pub fn route_state(&self) -> RouteState {
        let snapshot = self.store.snapshot();
        let user_id = snapshot.session.as_ref().map(Session::user_id);
        let profile = self.sync.state.borrow();
        let pending = user_id.is_some() && !profile.is_resolved_for(user_id);
        RouteState::derive(snapshot.loading || pending, user_id.is_some(), profile.complete)
    }

    #[must_use]
    pub fn navigate(&self, path: &str) -> GateDecision {
        gate(self.route_state(), &View::parse(path))
    }

    /// Run the callback flow for `url` and decide where to go next. On
    /// success the profile is reconciled before the gate is consulted.
    pub async fn handle_callback(&self, url: &str) -> CallbackNavigation {
        match callback::handle_callback(&self.store, url, CALLBACK_WAIT).await {
            CallbackOutcome::Authenticated(_) => {
                self.sync.run().await;
                CallbackNavigation::Go(gate(self.route_state(), &View::Dashboard))
            }
            CallbackOutcome::Error { description, .. } => {
                CallbackNavigation::ShowError { message: description, retry: View::Login }
            }
            CallbackOutcome::Failed(message) => CallbackNavigation::ShowError { message, retry: View::Login },
            CallbackOutcome::TimedOut => {
                CallbackNavigation::ShowError { message: "sign-in timed out".to_owned(), retry: View::Login }
            }
        }
    }

    // =========================================================================
    // PROFILE
    // =========================================================================

    #[must_use]
    pub fn profile_state(&self) -> ProfileState {
        self.sync.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_profile(&self) -> watch::Receiver<ProfileState> {
        self.sync.state.subscribe()
    }

    /// Reconcile now, e.g. after an explicit change made elsewhere.
    pub async fn refresh_profile(&self) -> ProfileState {
        self.sync.run().await;
        self.profile_state()
    }

    /// Send `update` for the signed-in user, then reconcile.
    ///
    /// # Errors
    ///
    /// Returns `AuthRequired` when signed out, otherwise the backend error.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        let session = self.store.get_session().ok_or(ApiError::AuthRequired)?;
        let updated = self.api.update_profile(session.user_id(), update).await?;
        self.sync.run().await;
        Ok(updated)
    }

    /// Stop background profile sync. Idempotent.
    pub fn shutdown(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            tracing::debug!("profile sync task stopped");
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// PROFILE SYNC
// =============================================================================

impl ProfileSync {
    /// Reconcile for the current session and publish the result unless the
    /// signed-in user changed while the request was in flight.
    async fn run(&self) {
        let _running = self.running.lock().await;
        let session = self.store.get_session();
        let requested = session.as_ref().map(Session::user_id);

        let state = self.reconciler.reconcile(session.as_ref()).await;

        let current = self.store.get_session().map(|s| s.user_id());
        if current != requested {
            tracing::debug!(?requested, ?current, "discarding stale profile result");
            return;
        }
        self.state.send_replace(state);
    }
}

fn spawn_profile_sync(sync: Arc<ProfileSync>, mut changes: watch::Receiver<AuthSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let event = changes.borrow_and_update().last_event;
            if event == Some(AuthEvent::TokenRefreshed) {
                continue;
            }
            sync.run().await;
        }
    })
}

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;
