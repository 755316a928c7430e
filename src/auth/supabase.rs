//! GoTrue (Supabase Auth) REST client.
//!
//! Thin HTTP wrapper over `/auth/v1/*`. Response and error parsing live in
//! pure functions for testability.

use reqwest::Method;
use serde_json::{Value, json};

use super::{
    AuthError, AuthResult, AuthUser, Credentials, IdentityProvider, OAuthProvider, OtpKind, Session, SignUpOptions,
    SignUpOutcome, unix_now,
};
use crate::config::{HttpTimeouts, IdentityConfig};

// =============================================================================
// CLIENT
// =============================================================================

pub struct SupabaseProvider {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &IdentityConfig, timeouts: HttpTimeouts) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_owned(),
            anon_key: config.anon_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> AuthResult<String> {
        let mut req = self
            .http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
            .query(query);
        req = match bearer {
            Some(token) => req.bearer_auth(token),
            None => req.bearer_auth(&self.anon_key),
        };
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for SupabaseProvider {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> AuthResult<Session> {
        let body = json!({ "email": credentials.email, "password": credentials.password });
        let text = self
            .send(Method::POST, "/token", &[("grant_type", "password")], Some(&body), None)
            .await?;
        parse_session(&text)
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        options: &SignUpOptions,
        redirect_to: &str,
    ) -> AuthResult<SignUpOutcome> {
        let mut data = serde_json::Map::new();
        if let Some(name) = &options.full_name {
            data.insert("full_name".to_owned(), json!(name));
        }
        let body = json!({
            "email": credentials.email,
            "password": credentials.password,
            "data": data,
        });
        let text = self
            .send(Method::POST, "/signup", &[("redirect_to", redirect_to)], Some(&body), None)
            .await?;
        parse_sign_up(&text, &credentials.email)
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        self.send(Method::POST, "/logout", &[], None, Some(access_token))
            .await
            .map(|_| ())
    }

    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> AuthResult<String> {
        build_authorize_url(&self.base_url, provider, redirect_to)
    }

    async fn reset_password_for_email(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        let body = json!({ "email": email });
        self.send(Method::POST, "/recover", &[("redirect_to", redirect_to)], Some(&body), None)
            .await
            .map(|_| ())
    }

    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        let body = json!({ "email": email, "create_user": true });
        self.send(Method::POST, "/otp", &[("redirect_to", redirect_to)], Some(&body), None)
            .await
            .map(|_| ())
    }

    async fn verify_otp(&self, email: &str, token: &str, kind: OtpKind) -> AuthResult<Session> {
        let body = json!({ "email": email, "token": token, "type": kind.as_str() });
        let text = self
            .send(Method::POST, "/verify", &[], Some(&body), None)
            .await?;
        parse_session(&text)
    }

    async fn get_user(&self, access_token: &str) -> AuthResult<AuthUser> {
        let text = self
            .send(Method::GET, "/user", &[], None, Some(access_token))
            .await?;
        serde_json::from_str(&text).map_err(|e| AuthError::Decode(e.to_string()))
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Session> {
        let body = json!({ "refresh_token": refresh_token });
        let text = self
            .send(Method::POST, "/token", &[("grant_type", "refresh_token")], Some(&body), None)
            .await?;
        parse_session(&text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

pub(crate) fn build_authorize_url(base_url: &str, provider: OAuthProvider, redirect_to: &str) -> AuthResult<String> {
    let mut url = url::Url::parse(&format!("{}/auth/v1/authorize", base_url.trim_end_matches('/')))
        .map_err(|e| AuthError::InvalidRedirect(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("provider", provider.as_str())
        .append_pair("redirect_to", redirect_to);
    Ok(url.into())
}

fn parse_session(text: &str) -> AuthResult<Session> {
    let session: Session = serde_json::from_str(text).map_err(|e| AuthError::Decode(e.to_string()))?;
    Ok(session.stamped(unix_now()))
}

/// Sign-up returns a full session when the project auto-confirms, otherwise
/// just the pending user record.
fn parse_sign_up(text: &str, email: &str) -> AuthResult<SignUpOutcome> {
    let value: Value = serde_json::from_str(text).map_err(|e| AuthError::Decode(e.to_string()))?;
    if value.get("access_token").is_some_and(Value::is_string) {
        let session: Session = serde_json::from_value(value).map_err(|e| AuthError::Decode(e.to_string()))?;
        return Ok(SignUpOutcome::Session(session.stamped(unix_now())));
    }
    let email = value
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or(email)
        .to_owned();
    Ok(SignUpOutcome::ConfirmationRequired { email })
}

/// Map a non-2xx provider response to a typed error, keeping the provider's
/// own message text.
pub(crate) fn parse_error(status: u16, body: &str) -> AuthError {
    let value: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);

    let message = field("error_description")
        .or_else(|| field("msg"))
        .or_else(|| field("message"))
        .or_else(|| field("error"))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("identity provider returned status {status}")
            } else {
                trimmed.to_owned()
            }
        });
    let code = field("error_code").or_else(|| field("error"));

    AuthError::Provider { status, code, message }
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
