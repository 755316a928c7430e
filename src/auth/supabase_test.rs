use super::*;
use crate::test_helpers::{USER_ID, spawn_stub};

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;

fn identity(url: &str) -> IdentityConfig {
    IdentityConfig { url: url.to_owned(), anon_key: "anon".to_owned() }
}

fn session_json() -> Value {
    json!({
        "access_token": "at-1",
        "refresh_token": "rt-1",
        "expires_in": 3600,
        "token_type": "bearer",
        "user": { "id": USER_ID, "email": "ada@example.com", "app_metadata": { "provider": "email" } }
    })
}

// =============================================================================
// parse_error
// =============================================================================

#[test]
fn parse_error_prefers_error_description() {
    let err = parse_error(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#);
    assert_eq!(
        err,
        AuthError::Provider {
            status: 400,
            code: Some("invalid_grant".to_owned()),
            message: "Invalid login credentials".to_owned(),
        }
    );
}

#[test]
fn parse_error_reads_msg_and_error_code() {
    let err = parse_error(422, r#"{"code":422,"error_code":"weak_password","msg":"Password should be at least 6 characters"}"#);
    assert_eq!(err.to_string(), "Password should be at least 6 characters");
    assert!(matches!(err, AuthError::Provider { code: Some(ref c), .. } if c == "weak_password"));
}

#[test]
fn parse_error_non_json_body_is_kept() {
    let err = parse_error(502, "Bad Gateway");
    assert_eq!(err.to_string(), "Bad Gateway");
}

#[test]
fn parse_error_empty_body_reports_status() {
    let err = parse_error(500, "");
    assert_eq!(err.to_string(), "identity provider returned status 500");
}

// =============================================================================
// parse_sign_up / parse_session
// =============================================================================

#[test]
fn parse_sign_up_with_session() {
    let outcome = parse_sign_up(&session_json().to_string(), "ada@example.com").unwrap();
    match outcome {
        SignUpOutcome::Session(session) => {
            assert_eq!(session.access_token, "at-1");
            assert!(session.expires_at.is_some());
        }
        SignUpOutcome::ConfirmationRequired { .. } => panic!("expected session"),
    }
}

#[test]
fn parse_sign_up_pending_confirmation() {
    let body = json!({ "id": USER_ID, "email": "ada@example.com", "confirmation_sent_at": "2026-01-01T00:00:00Z" });
    let outcome = parse_sign_up(&body.to_string(), "fallback@example.com").unwrap();
    assert_eq!(outcome, SignUpOutcome::ConfirmationRequired { email: "ada@example.com".to_owned() });
}

#[test]
fn parse_session_rejects_garbage() {
    assert!(matches!(parse_session("not json"), Err(AuthError::Decode(_))));
}

// =============================================================================
// build_authorize_url
// =============================================================================

#[test]
fn authorize_url_encodes_redirect_target() {
    let url = build_authorize_url("https://abc.supabase.co/", OAuthProvider::Google, "http://localhost:3000/auth/callback")
        .unwrap();
    assert_eq!(
        url,
        "https://abc.supabase.co/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"
    );
}

// =============================================================================
// HTTP round trips against a stub GoTrue
// =============================================================================

#[tokio::test]
async fn sign_in_sends_apikey_and_parses_session() {
    let router = axum::Router::new().route(
        "/auth/v1/token",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let apikey = headers.get("apikey").and_then(|v| v.to_str().ok()).unwrap_or_default();
            if apikey != "anon" || body["email"] != "ada@example.com" || body["password"] != "pw" {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })));
            }
            (StatusCode::OK, Json(session_json()))
        }),
    );
    let base = spawn_stub(router).await;
    let provider = SupabaseProvider::new(&identity(&base), HttpTimeouts::default()).unwrap();

    let session = provider
        .sign_in_with_password(&Credentials::new("ada@example.com", "pw"))
        .await
        .unwrap();
    assert_eq!(session.access_token, "at-1");
    assert_eq!(session.user_id().to_string(), USER_ID);

    let err = provider
        .sign_in_with_password(&Credentials::new("ada@example.com", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid login credentials");
}

#[tokio::test]
async fn sign_out_uses_user_bearer_token() {
    let router = axum::Router::new().route(
        "/auth/v1/logout",
        post(|headers: HeaderMap| async move {
            let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or_default().to_owned();
            if auth == "Bearer at-1" { StatusCode::NO_CONTENT } else { StatusCode::UNAUTHORIZED }
        }),
    );
    let base = spawn_stub(router).await;
    let provider = SupabaseProvider::new(&identity(&base), HttpTimeouts::default()).unwrap();

    assert!(provider.sign_out("at-1").await.is_ok());
    assert!(matches!(provider.sign_out("other").await, Err(AuthError::Provider { status: 401, .. })));
}

#[tokio::test]
async fn unreachable_provider_is_transport_error() {
    let provider = SupabaseProvider::new(&identity("http://127.0.0.1:9"), HttpTimeouts::default()).unwrap();
    let err = provider.get_user("at-1").await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(_)));
}
