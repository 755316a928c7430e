use super::*;
use crate::api::StaticToken;
use crate::config::HttpTimeouts;
use crate::test_helpers::{spawn_stub, user_id};

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde_json::json;

fn healthy_routes() -> axum::Router {
    axum::Router::new()
        .route(
            "/matches/{id}",
            get(|| async {
                Json(json!({
                    "matches": [{ "institution": { "id": 1, "name": "State U" }, "matchScore": 0.91, "category": "target" }],
                    "total": 1
                }))
            }),
        )
        .route("/user/stats/{id}", get(|| async { Json(json!({ "collegesSaved": 4, "profileStrength": 72 })) }))
        .route(
            "/dashboard/next-steps",
            post(|| async { Json(json!({ "steps": [{ "title": "Add test scores" }] })) }),
        )
}

fn api(base: &str) -> ApiClient {
    ApiClient::new(base, HttpTimeouts::default(), Arc::new(StaticToken::new("tok"))).unwrap()
}

#[tokio::test]
async fn two_failures_leave_three_sections_populated() {
    let router = healthy_routes()
        .route(
            "/scholarships/stats/{id}",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": "stats offline" }))) }),
        )
        .route("/scholarships/deadlines", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let base = spawn_stub(router).await;

    let data = load_dashboard(&api(&base), user_id(), DEFAULT_DEADLINE_DAYS).await;

    let failed: Vec<DashboardSection> = data.errors.keys().copied().collect();
    assert_eq!(failed, vec![DashboardSection::ScholarshipStats, DashboardSection::Deadlines]);
    assert_eq!(data.errors[&DashboardSection::ScholarshipStats], "stats offline");

    assert_eq!(data.matches.total, 1);
    assert_eq!(data.user_stats.colleges_saved, 4);
    assert_eq!(data.next_steps.steps[0].title, "Add test scores");
    assert_eq!(data.scholarship_stats, ScholarshipStats::default());
    assert!(data.deadlines.deadlines.is_empty());
    assert!(data.is_degraded());
}

#[tokio::test]
async fn healthy_backend_has_no_errors() {
    let router = healthy_routes()
        .route("/scholarships/stats/{id}", get(|| async { Json(json!({ "totalEligible": 9, "totalAmount": 12_500 })) }))
        .route("/scholarships/deadlines", get(|| async { Json(json!({ "deadlines": [] })) }));
    let base = spawn_stub(router).await;

    let data = load_dashboard(&api(&base), user_id(), 7).await;
    assert!(data.errors.is_empty());
    assert_eq!(data.scholarship_stats.total_eligible, 9);
}

#[tokio::test]
async fn signed_out_dashboard_reports_every_section() {
    let client = ApiClient::new("http://127.0.0.1:9", HttpTimeouts::default(), Arc::new(StaticToken::none())).unwrap();

    let data = load_dashboard(&client, user_id(), DEFAULT_DEADLINE_DAYS).await;
    assert_eq!(data.errors.len(), DashboardSection::ALL.len());
    assert!(data.errors.values().all(|e| e == "authentication required"));
    assert_eq!(data, DashboardData { errors: data.errors.clone(), ..DashboardData::default() });
}

#[test]
fn errors_serialize_with_section_keys() {
    let mut data = DashboardData::default();
    data.errors.insert(DashboardSection::UserStats, "boom".to_owned());
    let value = serde_json::to_value(&data).unwrap();
    assert_eq!(value["errors"], json!({ "userStats": "boom" }));
    assert_eq!(value["scholarshipStats"]["totalEligible"], json!(0));
}
