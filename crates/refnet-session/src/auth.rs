//! Identity provider contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use refnet_db::queries::session::StoredSession;
use serde::{Deserialize, Serialize};

use crate::{Result, REFRESH_MARGIN_SECS};

/// The authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// When the address was confirmed. `None` means unverified.
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn is_verified(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// A token pair issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds at which `access_token` expires.
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    /// Whether the access token expires within the refresh margin of `now`.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now.timestamp() <= REFRESH_MARGIN_SECS
    }

    pub fn to_stored(&self) -> StoredSession {
        StoredSession {
            user_id: self.user.id.clone(),
            email: self.user.email.clone(),
            email_confirmed_at: self.user.email_confirmed_at.map(|t| t.timestamp()),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        }
    }

    pub fn from_stored(stored: StoredSession) -> Self {
        Self {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at: stored.expires_at,
            user: AuthUser {
                id: stored.user_id,
                email: stored.email,
                email_confirmed_at: stored
                    .email_confirmed_at
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            },
        }
    }
}

/// Operations of the identity provider.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;
}
