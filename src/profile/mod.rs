//! Student profile records and reconciliation against the backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! The backend profile is the single source of truth for profile data. The
//! identity provider only seeds a new record (email, display name, avatar,
//! provider) the first time a user is seen.
//!
//! DESIGN
//! ======
//! `Profile` keeps every field the backend sends, including ones this crate
//! does not model, in `extra`, so a read-modify-write never drops data.
//! Completeness lives in `completeness` as pure functions; the fetch-or-create
//! sequence lives in `reconciler`.

pub mod completeness;
pub mod reconciler;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::auth::Session;

pub use completeness::{REQUIRED_FIELDS, is_complete, missing_fields};
pub use reconciler::{ProfileReconciler, ProfileState};

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub gpa: Option<f64>,
    #[serde(default)]
    pub sat_score: Option<u32>,
    #[serde(default)]
    pub act_score: Option<u32>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub intended_major: Option<String>,
    #[serde(default)]
    pub career_goals: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub family_income: Option<f64>,
    #[serde(default)]
    pub first_generation: Option<bool>,
    #[serde(default)]
    pub extracurriculars: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Backend fields not modeled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// Empty record for `user_id`, every optional field unset.
    #[must_use]
    pub fn blank(user_id: Uuid) -> Self {
        Self {
            user_id,
            email: None,
            full_name: None,
            avatar_url: None,
            provider: None,
            gpa: None,
            sat_score: None,
            act_score: None,
            grade_level: None,
            intended_major: None,
            career_goals: None,
            location: None,
            state: None,
            family_income: None,
            first_generation: None,
            extracurriculars: Vec::new(),
            created_at: None,
            updated_at: None,
            extra: Map::new(),
        }
    }
}

/// Numeric fields sometimes arrive as strings from form-backed rows. A
/// numeric string is parsed; any other string (`""`, `"N/A"`) reads as unset.
fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => Ok(s.trim().parse::<f64>().ok()),
        Some(other) => Err(D::Error::custom(format!("expected number, got {other}"))),
    }
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

/// Body of `POST /profile`: the minimal record synthesized from a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub provider: String,
}

impl NewProfile {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let user = &session.user;
        Self {
            user_id: user.id,
            email: user.email.clone(),
            full_name: user.display_name(),
            avatar_url: user.avatar_url().map(str::to_owned),
            provider: user.provider().to_owned(),
        }
    }
}

/// Body of `PUT /profile/:userId`. Unset fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intended_major: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub career_goals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_income: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_generation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracurriculars: Option<Vec<String>>,
}

impl ProfileUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
