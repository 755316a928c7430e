//! Fetch-or-create reconciliation of the backend profile for a session.
//!
//! LIFECYCLE
//! =========
//! 1. No session: empty state, nothing is sent.
//! 2. `GET /profile/:userId`.
//! 3. A 404 means first sign-in: synthesize a record from the session and
//!    `POST /profile`.
//! 4. Completeness is computed from whichever record came back.
//!
//! ERROR HANDLING
//! ==============
//! Any other failure (fetch or create) yields an empty state with `error`
//! set. There is no silent retry; the caller decides whether to reconcile
//! again.

use serde::Serialize;
use uuid::Uuid;

use super::{NewProfile, Profile, is_complete};
use crate::api::{ApiClient, ApiError};
use crate::auth::Session;

/// Published profile view. `complete` is only true alongside a loaded profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileState {
    /// User this state was resolved for; `None` when signed out.
    pub user_id: Option<Uuid>,
    pub profile: Option<Profile>,
    pub complete: bool,
    pub error: Option<String>,
}

impl ProfileState {
    #[must_use]
    pub fn empty() -> Self {
        Self { user_id: None, profile: None, complete: false, error: None }
    }

    #[must_use]
    pub fn loaded(profile: Profile) -> Self {
        let complete = is_complete(&profile);
        Self { user_id: Some(profile.user_id), profile: Some(profile), complete, error: None }
    }

    #[must_use]
    pub fn failed(user_id: Uuid, error: &ApiError) -> Self {
        Self { user_id: Some(user_id), profile: None, complete: false, error: Some(error.to_string()) }
    }

    /// True once this state was resolved for `user_id`, successfully or not.
    #[must_use]
    pub fn is_resolved_for(&self, user_id: Option<Uuid>) -> bool {
        self.user_id == user_id
    }
}

impl Default for ProfileState {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone)]
pub struct ProfileReconciler {
    api: ApiClient,
}

impl ProfileReconciler {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn reconcile(&self, session: Option<&Session>) -> ProfileState {
        let Some(session) = session else {
            return ProfileState::empty();
        };

        match self.fetch_or_create(session).await {
            Ok(profile) => {
                let state = ProfileState { user_id: Some(session.user_id()), ..ProfileState::loaded(profile) };
                tracing::debug!(user_id = %session.user_id(), complete = state.complete, "profile reconciled");
                state
            }
            Err(error) => {
                tracing::warn!(user_id = %session.user_id(), %error, "profile reconcile failed");
                ProfileState::failed(session.user_id(), &error)
            }
        }
    }

    async fn fetch_or_create(&self, session: &Session) -> Result<Profile, ApiError> {
        match self.api.get_profile(session.user_id()).await {
            Err(e) if e.is_not_found() => {
                tracing::info!(user_id = %session.user_id(), "no backend profile; creating one from session");
                self.api.create_profile(&NewProfile::from_session(session)).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;
