use super::*;
use crate::auth::{AuthEvent, MemoryStorage};
use crate::test_helpers::{MockIdentity, auth_user, session, user_id};

use std::sync::Arc;

const REDIRECT: &str = "http://localhost:3000/auth/callback";
const WAIT: Duration = Duration::from_secs(2);

fn store_with(provider: &Arc<MockIdentity>, storage: MemoryStorage) -> SessionStore {
    SessionStore::new(provider.clone(), Arc::new(storage), REDIRECT.to_owned())
}

// =============================================================================
// params
// =============================================================================

#[test]
fn parse_merges_query_and_fragment() {
    let params = CallbackParams::parse("http://localhost:3000/auth/callback?a=1&shared=query#b=2&shared=fragment").unwrap();
    assert_eq!(params.get("a"), Some("1"));
    assert_eq!(params.get("b"), Some("2"));
    assert_eq!(params.get("shared"), Some("fragment"));
}

#[test]
fn parse_accepts_bare_path() {
    let params = CallbackParams::parse("/auth/callback#access_token=at&refresh_token=rt&expires_in=3600&type=recovery").unwrap();
    let tokens = params.tokens().unwrap();
    assert_eq!(tokens.access_token, "at");
    assert_eq!(tokens.refresh_token, "rt");
    assert_eq!(tokens.expires_in, Some(3_600));
    assert_eq!(tokens.kind.as_deref(), Some("recovery"));
}

#[test]
fn tokens_need_both_tokens() {
    let params = CallbackParams::parse("/auth/callback#access_token=at").unwrap();
    assert!(params.tokens().is_none());
}

#[test]
fn provider_error_decodes_description() {
    let params =
        CallbackParams::parse("/auth/callback?error=access_denied&error_description=User+denied+access").unwrap();
    assert_eq!(
        params.provider_error(),
        Some(ProviderRedirectError { code: "access_denied".to_owned(), description: "User denied access".to_owned() })
    );
}

#[test]
fn provider_error_prefers_error_code() {
    let params = CallbackParams::parse("/auth/callback#error=unauthorized_client&error_code=otp_expired").unwrap();
    let err = params.provider_error().unwrap();
    assert_eq!(err.code, "otp_expired");
    assert_eq!(err.description, DEFAULT_ERROR_DESCRIPTION);
}

#[test]
fn no_error_params_means_no_error() {
    assert!(CallbackParams::parse("/auth/callback?code=abc").unwrap().provider_error().is_none());
}

// =============================================================================
// handle_callback
// =============================================================================

#[tokio::test]
async fn query_error_reaches_error_state() {
    let provider = MockIdentity::new();
    let store = store_with(&provider, MemoryStorage::new());
    store.init().await;

    let outcome = handle_callback(
        &store,
        "http://localhost:3000/auth/callback?error=access_denied&error_description=User+denied",
        WAIT,
    )
    .await;
    assert_eq!(outcome, CallbackOutcome::Error { code: "access_denied".to_owned(), description: "User denied".to_owned() });
    assert_eq!(outcome.retry_view(), Some(View::Login));
    assert!(store.get_session().is_none());
}

#[tokio::test]
async fn fragment_error_reaches_error_state_even_with_tokens() {
    let provider = MockIdentity::new();
    *provider.user.lock().unwrap() = Some(auth_user(user_id()));
    let store = store_with(&provider, MemoryStorage::new());
    store.init().await;

    let outcome = handle_callback(
        &store,
        "/auth/callback#error=access_denied&error_description=denied&access_token=at&refresh_token=rt",
        WAIT,
    )
    .await;
    assert!(matches!(outcome, CallbackOutcome::Error { ref code, .. } if code == "access_denied"));
    assert!(provider.calls().is_empty());
    assert!(store.get_session().is_none());
}

#[tokio::test]
async fn existing_session_authenticates() {
    let provider = MockIdentity::new();
    let store = store_with(&provider, MemoryStorage::with_session(session()));
    store.init().await;

    let outcome = handle_callback(&store, REDIRECT, WAIT).await;
    assert!(matches!(outcome, CallbackOutcome::Authenticated(ref s) if s.user_id() == user_id()));
    assert_eq!(outcome.retry_view(), None);
}

#[tokio::test]
async fn fragment_tokens_are_adopted() {
    let provider = MockIdentity::new();
    *provider.user.lock().unwrap() = Some(auth_user(user_id()));
    let store = store_with(&provider, MemoryStorage::new());
    store.init().await;

    let outcome = handle_callback(&store, "/auth/callback#access_token=at-9&refresh_token=rt-9&expires_in=3600", WAIT).await;
    let CallbackOutcome::Authenticated(session) = outcome else {
        panic!("expected authenticated outcome");
    };
    assert_eq!(session.access_token, "at-9");
    assert!(session.expires_at.is_some());
    assert_eq!(store.snapshot().last_event, Some(AuthEvent::SignedIn));
    assert_eq!(provider.calls(), vec!["get_user:at-9"]);
}

#[tokio::test]
async fn rejected_tokens_fail() {
    let provider = MockIdentity::new();
    let store = store_with(&provider, MemoryStorage::new());
    store.init().await;

    let outcome = handle_callback(&store, "/auth/callback#access_token=bad&refresh_token=rt", WAIT).await;
    assert_eq!(outcome, CallbackOutcome::Failed("invalid JWT".to_owned()));
    assert!(store.get_session().is_none());
}

#[tokio::test]
async fn no_session_and_no_tokens_fails_generically() {
    let provider = MockIdentity::new();
    let store = store_with(&provider, MemoryStorage::new());
    store.init().await;

    let outcome = handle_callback(&store, REDIRECT, WAIT).await;
    assert_eq!(outcome, CallbackOutcome::Failed(AUTH_FAILED.to_owned()));
}

#[tokio::test]
async fn waits_for_loading_before_inspecting_session() {
    let provider = MockIdentity::new();
    let store = Arc::new(store_with(&provider, MemoryStorage::with_session(session())));
    assert!(store.is_loading());

    let handler = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { handle_callback(&store, REDIRECT, WAIT).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handler.is_finished(), "handler must not conclude while loading");

    store.init().await;
    let outcome = handler.await.unwrap();
    assert!(matches!(outcome, CallbackOutcome::Authenticated(_)));
}

#[tokio::test]
async fn times_out_if_store_never_loads() {
    let provider = MockIdentity::new();
    let store = store_with(&provider, MemoryStorage::with_session(session()));

    let outcome = handle_callback(&store, REDIRECT, Duration::from_millis(30)).await;
    assert_eq!(outcome, CallbackOutcome::TimedOut);
}
