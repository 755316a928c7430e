//! Dashboard fan-out load.
//!
//! The five dashboard sections come from independent endpoints. They are
//! fetched concurrently and each has its own error boundary: a failing
//! section gets its documented empty payload and an entry in `errors`, and
//! the other sections render normally.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::types::{CollegeMatches, Deadlines, NextSteps, NextStepsRequest, ScholarshipStats, UserStats};
use crate::api::{ApiClient, ApiError, Endpoint};

/// Look-ahead window for the deadlines section.
pub const DEFAULT_DEADLINE_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DashboardSection {
    Matches,
    ScholarshipStats,
    Deadlines,
    UserStats,
    NextSteps,
}

impl DashboardSection {
    pub const ALL: [Self; 5] = [Self::Matches, Self::ScholarshipStats, Self::Deadlines, Self::UserStats, Self::NextSteps];

    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Matches => "matches",
            Self::ScholarshipStats => "scholarshipStats",
            Self::Deadlines => "deadlines",
            Self::UserStats => "userStats",
            Self::NextSteps => "nextSteps",
        }
    }
}

impl fmt::Display for DashboardSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub matches: CollegeMatches,
    pub scholarship_stats: ScholarshipStats,
    pub deadlines: Deadlines,
    pub user_stats: UserStats,
    pub next_steps: NextSteps,
    /// Exactly the sections whose fetch failed, with the error message.
    pub errors: BTreeMap<DashboardSection, String>,
}

impl DashboardData {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Load every dashboard section for `user_id` concurrently.
pub async fn load_dashboard(api: &ApiClient, user_id: Uuid, deadline_days: u32) -> DashboardData {
    let next_steps_body = serde_json::to_value(NextStepsRequest { user_id }).ok();

    let (matches, stats, deadlines, user_stats, next_steps) = tokio::join!(
        section::<CollegeMatches>(api, Endpoint::CollegeMatches(user_id), None),
        section::<ScholarshipStats>(api, Endpoint::ScholarshipStats(user_id), None),
        section::<Deadlines>(api, Endpoint::ScholarshipDeadlines { days: deadline_days }, None),
        section::<UserStats>(api, Endpoint::UserStats(user_id), None),
        section::<NextSteps>(api, Endpoint::NextSteps, next_steps_body),
    );

    let mut errors = BTreeMap::new();
    let data = DashboardData {
        matches: settle(&mut errors, DashboardSection::Matches, matches),
        scholarship_stats: settle(&mut errors, DashboardSection::ScholarshipStats, stats),
        deadlines: settle(&mut errors, DashboardSection::Deadlines, deadlines),
        user_stats: settle(&mut errors, DashboardSection::UserStats, user_stats),
        next_steps: settle(&mut errors, DashboardSection::NextSteps, next_steps),
        errors,
    };
    if data.is_degraded() {
        let failed: Vec<&str> = data.errors.keys().map(|k| k.key()).collect();
        tracing::warn!(%user_id, ?failed, "dashboard loaded with failed sections");
    }
    data
}

/// One section under its own error boundary: never fails, reports the error
/// alongside whatever value ended up in the section.
async fn section<T: DeserializeOwned + Default>(
    api: &ApiClient,
    endpoint: Endpoint,
    body: Option<serde_json::Value>,
) -> (T, Option<ApiError>) {
    match api.call::<T>(endpoint, body).await {
        Ok(fetched) => fetched.into_parts(),
        Err(error) => (T::default(), Some(error)),
    }
}

fn settle<T>(
    errors: &mut BTreeMap<DashboardSection, String>,
    key: DashboardSection,
    (value, error): (T, Option<ApiError>),
) -> T {
    if let Some(error) = error {
        errors.insert(key, error.to_string());
    }
    value
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
