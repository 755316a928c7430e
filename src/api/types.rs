//! Backend request and response DTOs.
//!
//! DESIGN
//! ======
//! Wire JSON is camelCase. Response types default every collection and count
//! so that the fallback payloads in `policy` (and sparse backend responses)
//! deserialize into the same types as full ones.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Backend ids arrive as either strings or integers depending on the source table.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

// =============================================================================
// INSTITUTIONS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionSearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tuition: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_acceptance_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub acceptance_rate: Option<f64>,
    #[serde(default)]
    pub tuition_in_state: Option<f64>,
    #[serde(default)]
    pub tuition_out_of_state: Option<f64>,
    #[serde(default)]
    pub enrollment: Option<u64>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionSearchResponse {
    #[serde(default)]
    pub institutions: Vec<Institution>,
    #[serde(default)]
    pub total: u64,
}

// =============================================================================
// PROBABILITY + RAG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityRequest {
    pub user_id: Uuid,
    pub institution_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilityResult {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub institution_id: String,
    /// Admission probability in `[0, 1]`.
    pub probability: f64,
    /// `reach`, `target` or `safety`.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagQueryRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagSource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<RagSource>,
}

// =============================================================================
// MATCHES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeMatch {
    pub institution: Institution,
    #[serde(default)]
    pub match_score: f64,
    #[serde(default)]
    pub probability: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollegeMatches {
    #[serde(default)]
    pub matches: Vec<CollegeMatch>,
    #[serde(default)]
    pub total: u64,
}

// =============================================================================
// SCHOLARSHIPS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScholarshipSearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scholarship {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub eligibility_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScholarshipSearchResponse {
    #[serde(default)]
    pub scholarships: Vec<Scholarship>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScholarshipStats {
    #[serde(default)]
    pub total_eligible: u64,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub applied_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deadline {
    #[serde(deserialize_with = "deserialize_id")]
    pub scholarship_id: String,
    pub name: String,
    /// ISO-8601 date as sent by the backend.
    pub deadline: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub days_remaining: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deadlines {
    #[serde(default)]
    pub deadlines: Vec<Deadline>,
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default)]
    pub colleges_saved: u64,
    #[serde(default)]
    pub scholarships_saved: u64,
    #[serde(default)]
    pub applications_started: u64,
    /// 0–100 score computed by the backend.
    #[serde(default)]
    pub profile_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStepsRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStep {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextSteps {
    #[serde(default)]
    pub steps: Vec<NextStep>,
}

// =============================================================================
// CAREERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerForecastRequest {
    pub career: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerForecast {
    pub career: String,
    #[serde(default)]
    pub median_salary: Option<f64>,
    #[serde(default)]
    pub growth_rate: Option<f64>,
    #[serde(default)]
    pub outlook: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareerForecasts {
    #[serde(default)]
    pub forecasts: Vec<CareerForecast>,
}

// =============================================================================
// APPLICATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub user_id: Uuid,
    #[serde(deserialize_with = "deserialize_id")]
    pub institution_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applications {
    #[serde(default)]
    pub applications: Vec<Application>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub user_id: Uuid,
    pub institution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
