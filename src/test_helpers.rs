//! Shared fixtures for unit tests: an in-process stub backend and a scripted
//! identity provider.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::auth::{
    AppMetadata, AuthError, AuthResult, AuthUser, Credentials, IdentityProvider, OAuthProvider, OtpKind, Session,
    SignUpOptions, SignUpOutcome, UserMetadata,
};

// =============================================================================
// STUB BACKEND
// =============================================================================

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("stub listener should bind");
    let addr = listener.local_addr().expect("stub listener should have an address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

// =============================================================================
// SESSIONS
// =============================================================================

pub const USER_ID: &str = "6f1c2f5e-7a43-4f8e-9d3e-0c1b2a3d4e5f";

pub fn user_id() -> Uuid {
    Uuid::parse_str(USER_ID).expect("fixture uuid should parse")
}

pub fn auth_user(id: Uuid) -> AuthUser {
    AuthUser {
        id,
        email: Some("ada@example.com".to_owned()),
        app_metadata: AppMetadata { provider: Some("google".to_owned()) },
        user_metadata: UserMetadata {
            full_name: Some("Ada Lovelace".to_owned()),
            avatar_url: Some("https://img.test/ada.png".to_owned()),
            ..UserMetadata::default()
        },
    }
}

pub fn session_for(id: Uuid, access_token: &str) -> Session {
    Session {
        access_token: access_token.to_owned(),
        refresh_token: format!("refresh-{access_token}"),
        expires_in: Some(3_600),
        expires_at: Some(crate::auth::unix_now() + 3_600),
        token_type: "bearer".to_owned(),
        user: auth_user(id),
    }
}

pub fn session() -> Session {
    session_for(user_id(), "access-1")
}

// =============================================================================
// MOCK IDENTITY PROVIDER
// =============================================================================

/// Identity provider that answers from queued results and records calls.
#[derive(Default)]
pub struct MockIdentity {
    pub sessions: Mutex<VecDeque<AuthResult<Session>>>,
    pub refreshes: Mutex<VecDeque<AuthResult<Session>>>,
    pub sign_out_result: Mutex<Option<AuthError>>,
    pub user: Mutex<Option<AuthUser>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_session(&self, result: AuthResult<Session>) {
        self.sessions.lock().unwrap().push_back(result);
    }

    pub fn push_refresh(&self, result: AuthResult<Session>) {
        self.refreshes.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_session(&self) -> AuthResult<Session> {
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AuthError::Transport("no scripted session".to_owned())))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockIdentity {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> AuthResult<Session> {
        self.record(format!("sign_in:{}", credentials.email));
        self.next_session()
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        _options: &SignUpOptions,
        redirect_to: &str,
    ) -> AuthResult<SignUpOutcome> {
        self.record(format!("sign_up:{}:{redirect_to}", credentials.email));
        match self.next_session() {
            Ok(session) => Ok(SignUpOutcome::Session(session)),
            Err(AuthError::Transport(_)) => {
                Ok(SignUpOutcome::ConfirmationRequired { email: credentials.email.clone() })
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        self.record(format!("sign_out:{access_token}"));
        match self.sign_out_result.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> AuthResult<String> {
        Ok(format!("https://idp.test/authorize?provider={provider}&redirect_to={redirect_to}"))
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        self.record(format!("recover:{email}:{redirect_to}"));
        Ok(())
    }

    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        self.record(format!("otp:{email}:{redirect_to}"));
        Ok(())
    }

    async fn verify_otp(&self, email: &str, token: &str, kind: OtpKind) -> AuthResult<Session> {
        self.record(format!("verify:{email}:{token}:{}", kind.as_str()));
        self.next_session()
    }

    async fn get_user(&self, access_token: &str) -> AuthResult<AuthUser> {
        self.record(format!("get_user:{access_token}"));
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or(AuthError::Provider { status: 401, code: None, message: "invalid JWT".to_owned() })
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session> {
        self.record(format!("refresh:{refresh_token}"));
        self.refreshes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AuthError::Transport("no scripted refresh".to_owned())))
    }
}
