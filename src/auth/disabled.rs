//! Identity provider stand-in used when no provider is configured.
//!
//! Every operation fails with `AuthError::NotConfigured`, so the app loads
//! and renders its login view with an inline error instead of crashing.

use super::{
    AuthError, AuthResult, AuthUser, Credentials, IdentityProvider, OAuthProvider, OtpKind, Session, SignUpOptions,
    SignUpOutcome,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledProvider;

#[async_trait::async_trait]
impl IdentityProvider for DisabledProvider {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn sign_in_with_password(&self, _credentials: &Credentials) -> AuthResult<Session> {
        Err(AuthError::NotConfigured)
    }

    async fn sign_up(
        &self,
        _credentials: &Credentials,
        _options: &SignUpOptions,
        _redirect_to: &str,
    ) -> AuthResult<SignUpOutcome> {
        Err(AuthError::NotConfigured)
    }

    async fn sign_out(&self, _access_token: &str) -> AuthResult<()> {
        Ok(())
    }

    fn authorize_url(&self, _provider: OAuthProvider, _redirect_to: &str) -> AuthResult<String> {
        Err(AuthError::NotConfigured)
    }

    async fn reset_password_for_email(&self, _email: &str, _redirect_to: &str) -> AuthResult<()> {
        Err(AuthError::NotConfigured)
    }

    async fn sign_in_with_otp(&self, _email: &str, _redirect_to: &str) -> AuthResult<()> {
        Err(AuthError::NotConfigured)
    }

    async fn verify_otp(&self, _email: &str, _token: &str, _kind: OtpKind) -> AuthResult<Session> {
        Err(AuthError::NotConfigured)
    }

    async fn get_user(&self, _access_token: &str) -> AuthResult<AuthUser> {
        Err(AuthError::NotConfigured)
    }

    async fn refresh_session(&self, _refresh_token: &str) -> AuthResult<Session> {
        Err(AuthError::NotConfigured)
    }
}
