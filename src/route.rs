//! Route gate: which views are reachable for a given auth/profile state.
//!
//! DESIGN
//! ======
//! The gate is a pure function of `(RouteState, View)`. `RouteState` is
//! itself derived, never stored: it is recomputed from the session store's
//! loading flag, session presence and profile completeness whenever any of
//! them changes. Navigation intent never moves the state machine; it only
//! asks whether a view is permitted.
//!
//! | state                     | reachable                                  | default          |
//! |---------------------------|--------------------------------------------|------------------|
//! | `Loading`                 | nothing                                    | (loading screen) |
//! | `Unauthenticated`         | login, signup, forgot-password, callback   | `/login`         |
//! | `AuthenticatedIncomplete` | student-profile, callback                  | `/student-profile` |
//! | `AuthenticatedComplete`   | every authenticated view, callback         | `/dashboard`     |

use std::fmt;

use serde::Serialize;

use crate::config::CALLBACK_PATH;

// =============================================================================
// VIEWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "view", content = "param", rename_all = "camelCase")]
pub enum View {
    Login,
    Signup,
    ForgotPassword,
    AuthCallback,
    Dashboard,
    StudentProfile,
    Matching,
    CollegeDetail(String),
    Scholarships,
    Forecaster,
    Applications,
    /// Unknown path, kept verbatim for diagnostics.
    NotFound(String),
}

impl View {
    /// Resolve a location path. Query strings, fragments and trailing
    /// slashes are ignored; `/` is the dashboard.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] | ["dashboard"] => Self::Dashboard,
            ["login"] => Self::Login,
            ["signup"] => Self::Signup,
            ["forgot-password"] => Self::ForgotPassword,
            ["auth", "callback"] => Self::AuthCallback,
            ["student-profile"] => Self::StudentProfile,
            ["matching"] => Self::Matching,
            ["college", id] => Self::CollegeDetail((*id).to_owned()),
            ["scholarships"] => Self::Scholarships,
            ["forecaster"] => Self::Forecaster,
            ["applications"] => Self::Applications,
            _ => Self::NotFound(path.to_owned()),
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Login => "/login".to_owned(),
            Self::Signup => "/signup".to_owned(),
            Self::ForgotPassword => "/forgot-password".to_owned(),
            Self::AuthCallback => CALLBACK_PATH.to_owned(),
            Self::Dashboard => "/dashboard".to_owned(),
            Self::StudentProfile => "/student-profile".to_owned(),
            Self::Matching => "/matching".to_owned(),
            Self::CollegeDetail(id) => format!("/college/{id}"),
            Self::Scholarships => "/scholarships".to_owned(),
            Self::Forecaster => "/forecaster".to_owned(),
            Self::Applications => "/applications".to_owned(),
            Self::NotFound(path) => path.clone(),
        }
    }

    /// Login, signup and password recovery: only meaningful while signed out.
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Login | Self::Signup | Self::ForgotPassword)
    }

    #[must_use]
    pub fn requires_auth(&self) -> bool {
        !self.is_public() && !matches!(self, Self::AuthCallback | Self::NotFound(_))
    }

    #[must_use]
    pub fn requires_complete_profile(&self) -> bool {
        self.requires_auth() && !matches!(self, Self::StudentProfile)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteState {
    Loading,
    Unauthenticated,
    AuthenticatedIncomplete,
    AuthenticatedComplete,
}

impl RouteState {
    /// Completeness is ignored without a session.
    #[must_use]
    pub fn derive(loading: bool, session_present: bool, profile_complete: bool) -> Self {
        match (loading, session_present, profile_complete) {
            (true, _, _) => Self::Loading,
            (false, false, _) => Self::Unauthenticated,
            (false, true, false) => Self::AuthenticatedIncomplete,
            (false, true, true) => Self::AuthenticatedComplete,
        }
    }

    /// Landing view for the state; `None` while loading.
    #[must_use]
    pub fn default_view(self) -> Option<View> {
        match self {
            Self::Loading => None,
            Self::Unauthenticated => Some(View::Login),
            Self::AuthenticatedIncomplete => Some(View::StudentProfile),
            Self::AuthenticatedComplete => Some(View::Dashboard),
        }
    }

    #[must_use]
    pub fn permits(self, view: &View) -> bool {
        match (self, view) {
            (Self::Loading, _) | (_, View::NotFound(_)) => false,
            (_, View::AuthCallback) => true,
            (Self::Unauthenticated, v) => v.is_public(),
            (Self::AuthenticatedIncomplete, v) => matches!(v, View::StudentProfile),
            (Self::AuthenticatedComplete, v) => v.requires_auth(),
        }
    }
}

// =============================================================================
// GATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "target", rename_all = "camelCase")]
pub enum GateDecision {
    ShowLoading,
    Render(View),
    Redirect(View),
}

impl GateDecision {
    /// View that ends up on screen, if any.
    #[must_use]
    pub fn view(&self) -> Option<&View> {
        match self {
            Self::ShowLoading => None,
            Self::Render(view) | Self::Redirect(view) => Some(view),
        }
    }
}

#[must_use]
pub fn gate(state: RouteState, requested: &View) -> GateDecision {
    let Some(default) = state.default_view() else {
        return GateDecision::ShowLoading;
    };
    if state.permits(requested) {
        GateDecision::Render(requested.clone())
    } else {
        GateDecision::Redirect(default)
    }
}

#[cfg(test)]
#[path = "route_test.rs"]
mod tests;
