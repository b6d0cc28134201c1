//! In-process identity provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use refnet_types::clock::Clock;

use crate::auth::{AuthApi, AuthSession, AuthUser};
use crate::{Result, SessionError};

/// Lifetime of issued access tokens, in seconds.
pub const TOKEN_TTL_SECS: i64 = 3600;

struct Account {
    password: String,
    user: AuthUser,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    refresh_tokens: HashMap<String, String>,
    issued: u64,
    refreshes: u64,
    offline: bool,
}

/// [`AuthApi`] over a fixed set of accounts.
pub struct MemoryAuth {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl MemoryAuth {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register an account. `confirmed_at` of `None` leaves it unverified.
    pub fn add_account(
        &self,
        id: &str,
        email: &str,
        password: &str,
        confirmed_at: Option<DateTime<Utc>>,
    ) {
        self.lock().accounts.insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                user: AuthUser {
                    id: id.to_string(),
                    email: Some(email.to_string()),
                    email_confirmed_at: confirmed_at,
                },
            },
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Number of refresh grants served.
    pub fn refreshes(&self) -> u64 {
        self.lock().refreshes
    }

    /// Issue a session for `user` without a password check.
    pub fn issue(&self, user: AuthUser) -> AuthSession {
        let mut inner = self.lock();
        Self::issue_locked(&mut inner, self.clock.now_utc(), user)
    }

    fn issue_locked(inner: &mut Inner, now: DateTime<Utc>, user: AuthUser) -> AuthSession {
        inner.issued += 1;
        let n = inner.issued;
        let refresh_token = format!("refresh-{n}");
        inner
            .refresh_tokens
            .insert(refresh_token.clone(), user.id.clone());
        AuthSession {
            access_token: format!("access-{n}"),
            refresh_token,
            expires_at: now.timestamp() + TOKEN_TTL_SECS,
            user,
        }
    }
}

#[async_trait]
impl AuthApi for MemoryAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let now = self.clock.now_utc();
        let mut inner = self.lock();
        if inner.offline {
            return Err(SessionError::Connectivity("network unreachable".to_string()));
        }
        let user = match inner.accounts.get(&email.trim().to_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(SessionError::Session("Invalid login credentials".to_string())),
        };
        Ok(Self::issue_locked(&mut inner, now, user))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let now = self.clock.now_utc();
        let mut inner = self.lock();
        if inner.offline {
            return Err(SessionError::Connectivity("network unreachable".to_string()));
        }
        let user_id = inner
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| SessionError::Session("Invalid Refresh Token".to_string()))?;
        let user = inner
            .accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| SessionError::Session("User not found".to_string()))?;
        inner.refreshes += 1;
        Ok(Self::issue_locked(&mut inner, now, user))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<()> {
        if self.lock().offline {
            return Err(SessionError::Connectivity("network unreachable".to_string()));
        }
        Ok(())
    }
}
