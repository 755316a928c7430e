//! Endpoint table: method, path, auth requirement and failure policy for
//! every backend call the client makes.
//!
//! DESIGN
//! ======
//! One `match` in `Endpoint::route` is the whole policy. Adding an endpoint
//! means adding a row there; `ApiClient::call` consults it and nothing else
//! decides whether an error is swallowed.

use std::fmt;

use reqwest::Method;
use serde_json::{Value, json};
use uuid::Uuid;

use super::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GetProfile(Uuid),
    CreateProfile,
    UpdateProfile(Uuid),
    SearchInstitutions,
    GetInstitution(String),
    CalculateProbability,
    RagQuery,
    CollegeMatches(Uuid),
    SearchScholarships,
    ScholarshipStats(Uuid),
    ScholarshipDeadlines { days: u32 },
    UserStats(Uuid),
    NextSteps,
    CareerForecast,
    ListApplications(Uuid),
    CreateApplication,
}

/// What to do when a call fails.
#[derive(Clone, Copy)]
pub enum CallPolicy {
    /// Hand the error to the caller.
    Propagate,
    /// Log the error and return this payload instead.
    Fallback(fn() -> Value),
}

impl CallPolicy {
    #[must_use]
    pub fn fallback_value(&self) -> Option<Value> {
        match self {
            Self::Propagate => None,
            Self::Fallback(shape) => Some(shape()),
        }
    }
}

impl fmt::Debug for CallPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propagate => f.write_str("Propagate"),
            Self::Fallback(shape) => f.debug_tuple("Fallback").field(&shape()).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointRoute {
    pub key: &'static str,
    pub method: Method,
    pub requires_auth: bool,
    pub policy: CallPolicy,
}

// =============================================================================
// FALLBACK SHAPES
// =============================================================================

fn empty_institutions() -> Value {
    json!({ "institutions": [], "total": 0 })
}

fn empty_rag_answer() -> Value {
    json!({ "answer": "", "sources": [] })
}

fn empty_matches() -> Value {
    json!({ "matches": [], "total": 0 })
}

fn empty_scholarships() -> Value {
    json!({ "scholarships": [], "total": 0 })
}

fn empty_scholarship_stats() -> Value {
    json!({ "totalEligible": 0, "totalAmount": 0, "appliedCount": 0 })
}

fn empty_deadlines() -> Value {
    json!({ "deadlines": [] })
}

fn empty_user_stats() -> Value {
    json!({ "collegesSaved": 0, "scholarshipsSaved": 0, "applicationsStarted": 0, "profileStrength": 0 })
}

fn empty_next_steps() -> Value {
    json!({ "steps": [] })
}

fn empty_forecasts() -> Value {
    json!({ "forecasts": [] })
}

// =============================================================================
// TABLE
// =============================================================================

impl Endpoint {
    #[must_use]
    #[rustfmt::skip]
    pub fn route(&self) -> EndpointRoute {
        use CallPolicy::{Fallback, Propagate};

        let (key, method, requires_auth, policy) = match self {
            Self::GetProfile(_) =>              ("getProfile",           Method::GET,  true,  Propagate),
            Self::CreateProfile =>              ("createProfile",        Method::POST, true,  Propagate),
            Self::UpdateProfile(_) =>           ("updateProfile",        Method::PUT,  true,  Propagate),
            Self::SearchInstitutions =>         ("searchInstitutions",   Method::POST, false, Fallback(empty_institutions)),
            Self::GetInstitution(_) =>          ("getInstitution",       Method::GET,  false, Propagate),
            Self::CalculateProbability =>       ("calculateProbability", Method::POST, true,  Propagate),
            Self::RagQuery =>                   ("ragQuery",             Method::POST, true,  Fallback(empty_rag_answer)),
            Self::CollegeMatches(_) =>          ("collegeMatches",       Method::GET,  true,  Fallback(empty_matches)),
            Self::SearchScholarships =>         ("searchScholarships",   Method::POST, true,  Fallback(empty_scholarships)),
            Self::ScholarshipStats(_) =>        ("scholarshipStats",     Method::GET,  true,  Fallback(empty_scholarship_stats)),
            Self::ScholarshipDeadlines { .. } => ("scholarshipDeadlines", Method::GET,  true,  Fallback(empty_deadlines)),
            Self::UserStats(_) =>               ("userStats",            Method::GET,  true,  Fallback(empty_user_stats)),
            Self::NextSteps =>                  ("nextSteps",            Method::POST, true,  Fallback(empty_next_steps)),
            Self::CareerForecast =>             ("careerForecast",       Method::POST, true,  Fallback(empty_forecasts)),
            Self::ListApplications(_) =>        ("listApplications",     Method::GET,  true,  Propagate),
            Self::CreateApplication =>          ("createApplication",    Method::POST, true,  Propagate),
        };
        EndpointRoute { key, method, requires_auth, policy }
    }

    /// Path segments below the API base URL.
    #[must_use]
    pub fn segments(&self) -> Vec<String> {
        let fixed = |parts: &[&str]| parts.iter().map(|p| (*p).to_owned()).collect::<Vec<_>>();
        let with_id = |parts: &[&str], id: String| {
            let mut segs = fixed(parts);
            segs.push(id);
            segs
        };

        match self {
            Self::GetProfile(user) | Self::UpdateProfile(user) => with_id(&["profile"], user.to_string()),
            Self::CreateProfile => fixed(&["profile"]),
            Self::SearchInstitutions => fixed(&["institutions", "search"]),
            Self::GetInstitution(id) => with_id(&["institutions"], id.clone()),
            Self::CalculateProbability => fixed(&["probability", "calculate"]),
            Self::RagQuery => fixed(&["rag", "query"]),
            Self::CollegeMatches(user) => with_id(&["matches"], user.to_string()),
            Self::SearchScholarships => fixed(&["scholarships", "search"]),
            Self::ScholarshipStats(user) => with_id(&["scholarships", "stats"], user.to_string()),
            Self::ScholarshipDeadlines { .. } => fixed(&["scholarships", "deadlines"]),
            Self::UserStats(user) => with_id(&["user", "stats"], user.to_string()),
            Self::NextSteps => fixed(&["dashboard", "next-steps"]),
            Self::CareerForecast => fixed(&["careers", "forecast"]),
            Self::ListApplications(user) => with_id(&["applications"], user.to_string()),
            Self::CreateApplication => fixed(&["applications"]),
        }
    }

    #[must_use]
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::ScholarshipDeadlines { days } => vec![("days", days.to_string())],
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &'static str {
        self.route().key
    }

    #[must_use]
    pub fn policy(&self) -> CallPolicy {
        self.route().policy
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.route().method, self.segments().join("/"))?;
        let query = self.query();
        if !query.is_empty() {
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, "?{}", pairs.join("&"))?;
        }
        Ok(())
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of a call under a fallback policy: either the server's data or the
/// documented empty payload plus the error that caused the substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Fresh(T),
    Fallback { value: T, error: ApiError },
}

impl<T> Fetched<T> {
    pub fn into_value(self) -> T {
        match self {
            Self::Fresh(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Fresh(value) | Self::Fallback { value, .. } => value,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Fresh(_) => None,
            Self::Fallback { error, .. } => Some(error),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Split into the value and the error, if the value is a fallback.
    pub fn into_parts(self) -> (T, Option<ApiError>) {
        match self {
            Self::Fresh(value) => (value, None),
            Self::Fallback { value, error } => (value, Some(error)),
        }
    }
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
