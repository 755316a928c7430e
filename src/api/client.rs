//! HTTP transport and typed endpoint methods.
//!
//! `request` is the one place requests are built and responses are turned
//! into `ApiError`s. `call` layers the endpoint policy on top; every typed
//! method goes through `call`.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use super::policy::{CallPolicy, Endpoint, Fetched};
use super::types::{
    Application, Applications, CareerForecastRequest, CareerForecasts, CollegeMatches, Deadlines, Institution,
    InstitutionSearchRequest, InstitutionSearchResponse, NewApplication, NextSteps, NextStepsRequest,
    ProbabilityRequest, ProbabilityResult, RagAnswer, RagQueryRequest, ScholarshipSearchRequest,
    ScholarshipSearchResponse, ScholarshipStats, UserStats,
};
use super::{ApiError, TokenSource};
use crate::config::HttpTimeouts;
use crate::profile::{NewProfile, Profile, ProfileUpdate};

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, timeouts: HttpTimeouts, tokens: Arc<dyn TokenSource>) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| ApiError::ClientBuild(format!("invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::ClientBuild(format!("invalid base URL {base_url}")));
        }
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url, tokens })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Absolute URL for `endpoint`, with path segments percent-encoded.
    #[must_use]
    pub fn url_for(&self, endpoint: &Endpoint) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(endpoint.segments());
        }
        let query = endpoint.query();
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    /// Send one JSON request.
    ///
    /// With `require_auth`, a missing token fails with `AuthRequired` before
    /// anything is sent. Non-2xx responses become `ApiError::Http` carrying
    /// the server's message when present. An empty body yields `Value::Null`.
    ///
    /// # Errors
    ///
    /// Returns the transport, status, or decode failure.
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        require_auth: bool,
    ) -> Result<Value, ApiError> {
        let mut req = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if require_auth {
            let token = self.tokens.access_token().ok_or(ApiError::AuthRequired)?;
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(transport_error)?;

        if !(200..300).contains(&status) {
            return Err(ApiError::Http { status, message: error_message(status, &text) });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Call `endpoint` under its declared policy.
    ///
    /// # Errors
    ///
    /// Propagate-policy endpoints return their error. Fallback-policy
    /// endpoints only fail if neither the response nor the fallback payload
    /// decodes as `T`.
    pub async fn call<T: DeserializeOwned>(&self, endpoint: Endpoint, body: Option<Value>) -> Result<Fetched<T>, ApiError> {
        let route = endpoint.route();
        let url = self.url_for(&endpoint);
        let result = self
            .request(route.method, url, body.as_ref(), route.requires_auth)
            .await
            .and_then(|value| serde_json::from_value::<T>(value).map_err(|e| ApiError::Decode(e.to_string())));

        match (result, route.policy) {
            (Ok(value), _) => Ok(Fetched::Fresh(value)),
            (Err(error), CallPolicy::Propagate) => {
                tracing::debug!(endpoint = route.key, %error, "backend call failed");
                Err(error)
            }
            (Err(error), CallPolicy::Fallback(shape)) => {
                tracing::warn!(endpoint = route.key, %error, "backend call failed; using fallback payload");
                let value = serde_json::from_value::<T>(shape()).map_err(|e| ApiError::Decode(e.to_string()))?;
                Ok(Fetched::Fallback { value, error })
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: Endpoint, body: Option<Value>) -> Result<T, ApiError> {
        self.call(endpoint, body).await.map(Fetched::into_value)
    }

    async fn best_effort<T: DeserializeOwned + Default>(&self, endpoint: Endpoint, body: Option<Value>) -> T {
        self.fetch(endpoint, body).await.unwrap_or_default()
    }

    /// `best_effort` with a request body. A body that fails to encode is
    /// treated like a failed call.
    pub(crate) async fn best_effort_json<B, T>(&self, endpoint: Endpoint, request: &B) -> T
    where
        B: Serialize,
        T: DeserializeOwned + Default,
    {
        match to_body(request) {
            Ok(body) => self.best_effort(endpoint, Some(body)).await,
            Err(error) => {
                tracing::warn!(endpoint = endpoint.route().key, %error, "request body encoding failed; using fallback payload");
                T::default()
            }
        }
    }

    // =========================================================================
    // PROFILE (propagate)
    // =========================================================================

    /// # Errors
    ///
    /// Propagates every failure, including 404 for a profile that does not exist yet.
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile, ApiError> {
        self.fetch(Endpoint::GetProfile(user_id), None).await
    }

    /// # Errors
    ///
    /// Propagates every failure.
    pub async fn create_profile(&self, profile: &NewProfile) -> Result<Profile, ApiError> {
        self.fetch(Endpoint::CreateProfile, Some(to_body(profile)?)).await
    }

    /// # Errors
    ///
    /// Propagates every failure.
    pub async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        self.fetch(Endpoint::UpdateProfile(user_id), Some(to_body(update)?))
            .await
    }

    // =========================================================================
    // INSTITUTIONS / PROBABILITY / RAG
    // =========================================================================

    pub async fn search_institutions(&self, request: &InstitutionSearchRequest) -> InstitutionSearchResponse {
        self.best_effort_json(Endpoint::SearchInstitutions, request).await
    }

    /// # Errors
    ///
    /// Propagates every failure.
    pub async fn get_institution(&self, id: &str) -> Result<Institution, ApiError> {
        self.fetch(Endpoint::GetInstitution(id.to_owned()), None).await
    }

    /// # Errors
    ///
    /// Propagates every failure.
    pub async fn calculate_probability(&self, request: &ProbabilityRequest) -> Result<ProbabilityResult, ApiError> {
        self.fetch(Endpoint::CalculateProbability, Some(to_body(request)?))
            .await
    }

    pub async fn rag_query(&self, request: &RagQueryRequest) -> RagAnswer {
        self.best_effort_json(Endpoint::RagQuery, request).await
    }

    // =========================================================================
    // DASHBOARD DATA (fallback)
    // =========================================================================

    pub async fn college_matches(&self, user_id: Uuid) -> CollegeMatches {
        self.best_effort(Endpoint::CollegeMatches(user_id), None).await
    }

    pub async fn search_scholarships(&self, request: &ScholarshipSearchRequest) -> ScholarshipSearchResponse {
        self.best_effort_json(Endpoint::SearchScholarships, request).await
    }

    pub async fn scholarship_stats(&self, user_id: Uuid) -> ScholarshipStats {
        self.best_effort(Endpoint::ScholarshipStats(user_id), None).await
    }

    pub async fn scholarship_deadlines(&self, days: u32) -> Deadlines {
        self.best_effort(Endpoint::ScholarshipDeadlines { days }, None).await
    }

    pub async fn user_stats(&self, user_id: Uuid) -> UserStats {
        self.best_effort(Endpoint::UserStats(user_id), None).await
    }

    pub async fn next_steps(&self, user_id: Uuid) -> NextSteps {
        self.best_effort_json(Endpoint::NextSteps, &NextStepsRequest { user_id })
            .await
    }

    pub async fn career_forecast(&self, request: &CareerForecastRequest) -> CareerForecasts {
        self.best_effort_json(Endpoint::CareerForecast, request).await
    }

    // =========================================================================
    // APPLICATIONS (propagate)
    // =========================================================================

    /// # Errors
    ///
    /// Propagates every failure.
    pub async fn list_applications(&self, user_id: Uuid) -> Result<Applications, ApiError> {
        self.fetch(Endpoint::ListApplications(user_id), None).await
    }

    /// # Errors
    ///
    /// Propagates every failure.
    pub async fn create_application(&self, application: &NewApplication) -> Result<Application, ApiError> {
        self.fetch(Endpoint::CreateApplication, Some(to_body(application)?))
            .await
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) fn to_body<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() { ApiError::Timeout } else { ApiError::Transport(e.to_string()) }
}

/// Pull a human-readable message out of an error body: `detail` (string or
/// validation list), then `message`, then `error`; otherwise a generic
/// status message.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);

    if let Some(detail) = value.get("detail") {
        match detail {
            Value::String(s) if !s.trim().is_empty() => return s.clone(),
            Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if !msgs.is_empty() {
                    return msgs.join("; ");
                }
            }
            _ => {}
        }
    }

    ["message", "error"]
        .iter()
        .find_map(|key| {
            value
                .get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
        })
        .map_or_else(|| format!("request failed with status {status}"), str::to_owned)
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
