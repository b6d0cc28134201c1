//! Admin user API: the GoTrue admin endpoints and an in-memory double.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Users requested per listing page.
pub const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("admin api unreachable: {0}")]
    Connectivity(String),

    #[error("admin api returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("unexpected admin api response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl AdminUser {
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

#[async_trait]
pub trait AdminApi: Send + Sync {
    /// One page of users, 1-based.
    async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<AdminUser>, ApiError>;

    /// Mark the user's email as confirmed.
    async fn confirm_email(&self, user_id: &str) -> Result<(), ApiError>;

    /// Page through all users until one has exactly `email`.
    async fn find_by_email(&self, email: &str) -> Result<Option<AdminUser>, ApiError> {
        let mut page = 1;
        loop {
            let users = self.list_users(page, PAGE_SIZE).await?;
            let short = users.len() < PAGE_SIZE as usize;
            if let Some(user) = users
                .into_iter()
                .find(|u| u.email.as_deref() == Some(email))
            {
                return Ok(Some(user));
            }
            if short {
                return Ok(None);
            }
            page += 1;
        }
    }
}

/// GoTrue admin endpoints authenticated with the service-role key.
pub struct GoTrueAdmin {
    http: reqwest::Client,
    base_url: String,
    service_role_key: String,
}

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<AdminUser>,
}

impl GoTrueAdmin {
    pub fn new(
        base_url: impl Into<String>,
        service_role_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Connectivity(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_role_key: service_role_key.into(),
        })
    }

    fn users_url(&self) -> String {
        format!("{}/auth/v1/admin/users", self.base_url)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Http {
        status: status.as_u16(),
        message: if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            message
        },
    })
}

fn transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() || e.is_connect() {
        ApiError::Connectivity(e.to_string())
    } else {
        ApiError::Http {
            status: e.status().unwrap_or(StatusCode::BAD_GATEWAY).as_u16(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl AdminApi for GoTrueAdmin {
    async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<AdminUser>, ApiError> {
        let response = self
            .authorized(self.http.get(self.users_url()))
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .map_err(transport)?;
        let page: UserPage = check(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(page.users)
    }

    async fn confirm_email(&self, user_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.users_url(), user_id);
        let response = self
            .authorized(self.http.put(url))
            .json(&json!({ "email_confirm": true }))
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }
}

/// In-memory admin API.
#[derive(Default)]
pub struct MemoryAdmin {
    state: Mutex<MemoryAdminState>,
}

#[derive(Default)]
struct MemoryAdminState {
    users: Vec<AdminUser>,
    fail_list: Option<ApiError>,
    fail_confirm: Option<ApiError>,
    confirmations: u32,
}

impl MemoryAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryAdminState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_user(&self, id: &str, email: &str, confirmed_at: Option<DateTime<Utc>>) {
        self.lock().users.push(AdminUser {
            id: id.to_string(),
            email: Some(email.to_string()),
            email_confirmed_at: confirmed_at,
        });
    }

    pub fn user(&self, id: &str) -> Option<AdminUser> {
        self.lock().users.iter().find(|u| u.id == id).cloned()
    }

    pub fn fail_list(&self, error: Option<ApiError>) {
        self.lock().fail_list = error;
    }

    pub fn fail_confirm(&self, error: Option<ApiError>) {
        self.lock().fail_confirm = error;
    }

    /// Number of successful confirmations.
    pub fn confirmations(&self) -> u32 {
        self.lock().confirmations
    }
}

#[async_trait]
impl AdminApi for MemoryAdmin {
    async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<AdminUser>, ApiError> {
        let state = self.lock();
        if let Some(e) = &state.fail_list {
            return Err(e.clone());
        }
        let skip = page.saturating_sub(1) as usize * per_page as usize;
        Ok(state
            .users
            .iter()
            .skip(skip)
            .take(per_page as usize)
            .cloned()
            .collect())
    }

    async fn confirm_email(&self, user_id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        if let Some(e) = &state.fail_confirm {
            return Err(e.clone());
        }
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| ApiError::Http {
                status: 404,
                message: "User not found".to_string(),
            })?;
        user.email_confirmed_at = Some(Utc::now());
        state.confirmations += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_pages_past_first_page() {
        let admin = MemoryAdmin::new();
        for i in 0..(PAGE_SIZE + 5) {
            admin.add_user(&format!("u{i}"), &format!("user{i}@example.com"), None);
        }
        let last = format!("user{}@example.com", PAGE_SIZE + 4);
        let found = admin.find_by_email(&last).await.expect("lookup");
        assert_eq!(found.map(|u| u.id), Some(format!("u{}", PAGE_SIZE + 4)));
    }

    #[tokio::test]
    async fn test_find_requires_exact_email() {
        let admin = MemoryAdmin::new();
        admin.add_user("u1", "ada@example.com", None);
        assert!(admin
            .find_by_email("ADA@example.com")
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn test_confirm_sets_timestamp() {
        let admin = MemoryAdmin::new();
        admin.add_user("u1", "ada@example.com", None);
        admin.confirm_email("u1").await.expect("confirm");
        assert!(admin.user("u1").expect("user").is_confirmed());
        assert_eq!(admin.confirmations(), 1);
    }

    #[test]
    fn test_user_decodes_gotrue_shape() {
        let user: AdminUser = serde_json::from_str(
            r#"{"id":"u1","email":"ada@example.com","email_confirmed_at":null,"aud":"authenticated"}"#,
        )
        .expect("decode");
        assert!(!user.is_confirmed());
    }
}
