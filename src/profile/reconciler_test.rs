use super::*;
use crate::api::StaticToken;
use crate::config::HttpTimeouts;
use crate::test_helpers::{session, spawn_stub, user_id};

use std::sync::{Arc, Mutex};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use serde_json::{Value, json};

type Log = Arc<Mutex<Vec<String>>>;

fn reconciler(base: &str) -> ProfileReconciler {
    let api = ApiClient::new(base, HttpTimeouts::default(), Arc::new(StaticToken::new("access-1"))).unwrap();
    ProfileReconciler::new(api)
}

/// Stub whose GET answers with `get_status`/`get_body` and whose POST echoes
/// the created record back with `created_status`.
async fn stub(log: &Log, get_status: StatusCode, get_body: Value, created_status: StatusCode) -> String {
    let router = axum::Router::new()
        .route(
            "/profile/{id}",
            get(move |State(log): State<Log>| async move {
                log.lock().unwrap().push("GET".to_owned());
                (get_status, Json(get_body))
            }),
        )
        .route(
            "/profile",
            axum::routing::post(move |State(log): State<Log>, Json(body): Json<Value>| async move {
                log.lock().unwrap().push(format!("POST {body}"));
                (created_status, Json(body))
            }),
        )
        .with_state(Arc::clone(log));
    spawn_stub(router).await
}

#[tokio::test]
async fn no_session_is_empty_without_requests() {
    let log = Log::default();
    let base = stub(&log, StatusCode::OK, json!({}), StatusCode::CREATED).await;

    let state = reconciler(&base).reconcile(None).await;
    assert_eq!(state, ProfileState::empty());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn existing_complete_profile_is_loaded() {
    let log = Log::default();
    let base = stub(&log, StatusCode::OK, json!({ "userId": user_id(), "gpa": 3.8 }), StatusCode::CREATED).await;

    let state = reconciler(&base).reconcile(Some(&session())).await;
    assert!(state.complete);
    assert!(state.error.is_none());
    assert_eq!(state.user_id, Some(user_id()));
    assert!(state.is_resolved_for(Some(user_id())));
    assert_eq!(*log.lock().unwrap(), vec!["GET"]);
}

#[tokio::test]
async fn existing_profile_without_gpa_is_incomplete() {
    let log = Log::default();
    let base = stub(&log, StatusCode::OK, json!({ "userId": user_id(), "gpa": null }), StatusCode::CREATED).await;

    let state = reconciler(&base).reconcile(Some(&session())).await;
    assert!(state.profile.is_some());
    assert!(!state.complete);
}

#[tokio::test]
async fn not_found_creates_profile_from_session() {
    let log = Log::default();
    let base = stub(&log, StatusCode::NOT_FOUND, json!({ "detail": "Profile not found" }), StatusCode::CREATED).await;

    let state = reconciler(&base).reconcile(Some(&session())).await;
    let profile = state.profile.expect("profile should be created");
    assert_eq!(profile.full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(profile.provider.as_deref(), Some("google"));
    assert!(!state.complete);

    let calls = log.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].starts_with("POST "));
    assert!(calls[1].contains("\"email\":\"ada@example.com\""));
}

#[tokio::test]
async fn other_fetch_errors_surface_without_create() {
    let log = Log::default();
    let base = stub(
        &log,
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "detail": "database unavailable" }),
        StatusCode::CREATED,
    )
    .await;

    let state = reconciler(&base).reconcile(Some(&session())).await;
    assert!(state.profile.is_none());
    assert!(!state.complete);
    assert_eq!(state.user_id, Some(user_id()));
    assert_eq!(state.error.as_deref(), Some("database unavailable"));
    assert_eq!(*log.lock().unwrap(), vec!["GET"]);
}

#[tokio::test]
async fn create_failure_surfaces() {
    let log = Log::default();
    let base = stub(&log, StatusCode::NOT_FOUND, json!({}), StatusCode::CONFLICT).await;

    let state = reconciler(&base).reconcile(Some(&session())).await;
    assert!(state.profile.is_none());
    assert!(state.error.is_some());
    assert_eq!(log.lock().unwrap().len(), 2);
}
