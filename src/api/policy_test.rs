use super::*;

fn uid() -> Uuid {
    Uuid::nil()
}

fn all_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::GetProfile(uid()),
        Endpoint::CreateProfile,
        Endpoint::UpdateProfile(uid()),
        Endpoint::SearchInstitutions,
        Endpoint::GetInstitution("mit".to_owned()),
        Endpoint::CalculateProbability,
        Endpoint::RagQuery,
        Endpoint::CollegeMatches(uid()),
        Endpoint::SearchScholarships,
        Endpoint::ScholarshipStats(uid()),
        Endpoint::ScholarshipDeadlines { days: 30 },
        Endpoint::UserStats(uid()),
        Endpoint::NextSteps,
        Endpoint::CareerForecast,
        Endpoint::ListApplications(uid()),
        Endpoint::CreateApplication,
    ]
}

// =============================================================================
// policy split
// =============================================================================

#[test]
fn state_changing_and_identity_endpoints_propagate() {
    for ep in [
        Endpoint::GetProfile(uid()),
        Endpoint::CreateProfile,
        Endpoint::UpdateProfile(uid()),
        Endpoint::CalculateProbability,
        Endpoint::ListApplications(uid()),
        Endpoint::CreateApplication,
    ] {
        assert!(matches!(ep.policy(), CallPolicy::Propagate), "{ep} should propagate");
    }
}

#[test]
fn scholarship_stats_falls_back_to_zero_totals() {
    let shape = Endpoint::ScholarshipStats(uid()).policy().fallback_value().unwrap();
    assert_eq!(shape, json!({ "totalEligible": 0, "totalAmount": 0, "appliedCount": 0 }));
}

#[test]
fn put_requests_propagate() {
    for ep in all_endpoints() {
        let route = ep.route();
        if route.method == Method::PUT {
            assert!(matches!(route.policy, CallPolicy::Propagate), "{ep}");
        }
    }
}

#[test]
fn only_institution_reads_are_public() {
    let public: Vec<&str> = all_endpoints()
        .iter()
        .filter(|ep| !ep.route().requires_auth)
        .map(Endpoint::key)
        .collect();
    assert_eq!(public, vec!["searchInstitutions", "getInstitution"]);
}

#[test]
fn keys_are_unique() {
    let mut keys: Vec<&str> = all_endpoints().iter().map(Endpoint::key).collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), all_endpoints().len());
}

// =============================================================================
// paths
// =============================================================================

#[test]
fn display_renders_method_path_and_query() {
    assert_eq!(
        Endpoint::GetProfile(uid()).to_string(),
        "GET /profile/00000000-0000-0000-0000-000000000000"
    );
    assert_eq!(Endpoint::ScholarshipDeadlines { days: 14 }.to_string(), "GET /scholarships/deadlines?days=14");
    assert_eq!(Endpoint::NextSteps.to_string(), "POST /dashboard/next-steps");
    assert_eq!(Endpoint::UserStats(uid()).segments(), vec!["user", "stats", uid().to_string().as_str()]);
}

// =============================================================================
// Fetched
// =============================================================================

#[test]
fn fetched_fallback_exposes_error() {
    let fetched = Fetched::Fallback { value: 0_u32, error: ApiError::Timeout };
    assert!(fetched.is_fallback());
    assert_eq!(fetched.error(), Some(&ApiError::Timeout));
    assert_eq!(fetched.into_parts(), (0, Some(ApiError::Timeout)));
}

#[test]
fn fetched_fresh_has_no_error() {
    let fetched = Fetched::Fresh("data");
    assert_eq!(*fetched.value(), "data");
    assert!(fetched.error().is_none());
    assert_eq!(fetched.into_value(), "data");
}
