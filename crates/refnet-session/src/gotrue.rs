//! HTTP client for a GoTrue-style identity provider under `/auth/v1`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use refnet_types::clock::Clock;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::auth::{AuthApi, AuthSession, AuthUser};
use crate::{Result, SessionError};

/// Identity provider client.
pub struct GoTrueClient {
    base_url: String,
    anon_key: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<DateTime<Utc>>,
}

impl GoTrueClient {
    pub fn new(
        base_url: &str,
        anon_key: impl Into<String>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(SessionError::Session(format!(
                "identity provider url must be http(s): {trimmed}"
            )));
        }
        Ok(Self {
            base_url: trimmed.to_string(),
            anon_key: anon_key.into(),
            timeout,
            clock,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post(&self, path: &str, bearer: Option<&str>, body: &Value) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
            .header("x-request-id", format!("req_{}", Uuid::new_v4().simple()))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(http_error(status, &bytes));
        }
        Ok(bytes.to_vec())
    }

    async fn token(&self, grant_type: &str, body: Value) -> Result<AuthSession> {
        let bytes = self
            .post(&format!("token?grant_type={grant_type}"), None, &body)
            .await?;
        let token: TokenResponse = serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::Session(format!("malformed token response: {e}")))?;
        let expires_at = token.expires_at.unwrap_or_else(|| {
            self.clock.now_utc().timestamp() + token.expires_in.unwrap_or(3600)
        });
        debug!(user_id = %token.user.id, grant_type, "token issued");
        Ok(AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: AuthUser {
                id: token.user.id,
                email: token.user.email,
                email_confirmed_at: token.user.email_confirmed_at,
            },
        })
    }
}

#[async_trait]
impl AuthApi for GoTrueClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        self.token(
            "password",
            json!({ "email": email.trim(), "password": password }),
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        self.token("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.post("logout", Some(access_token), &json!({})).await?;
        Ok(())
    }
}

fn transport_error(error: reqwest::Error) -> SessionError {
    if error.is_timeout() {
        SessionError::Timeout("identity provider request")
    } else {
        SessionError::Connectivity(error.to_string())
    }
}

fn http_error(status: StatusCode, body: &[u8]) -> SessionError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("identity provider returned {status}"));
    if status.is_server_error() {
        SessionError::Connectivity(message)
    } else {
        SessionError::Session(message)
    }
}
