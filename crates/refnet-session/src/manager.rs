//! Session lifecycle.
//!
//! [`SessionManager`] owns the current token pair and the signed-in user's
//! profile. Every auth-state change (restore at startup, sign-in, refresh,
//! sign-out) goes through [`SessionManager::apply_session`], which enforces
//! the email-verification gate and publishes a [`SessionSnapshot`] to
//! subscribers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use refnet_db::queries::session as stored_session;
use refnet_store::queries::profiles;
use refnet_store::Store;
use refnet_types::clock::Clock;
use refnet_types::profile::Profile;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::auth::{AuthApi, AuthSession, AuthUser};
use crate::context::SharedDb;
use crate::{Result, SessionError};

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Startup restore has finished (successfully or not).
    pub initialized: bool,
    pub loading: bool,
    /// Verified identity. Unverified sessions never appear here.
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    /// Blocking error to show instead of the app.
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.profile.is_some()
    }

    fn signed_out(error: Option<String>) -> Self {
        Self {
            initialized: true,
            error,
            ..Self::default()
        }
    }
}

/// Owner of the token pair and profile.
pub struct SessionManager {
    auth: Arc<dyn AuthApi>,
    store: Arc<dyn Store>,
    db: SharedDb,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    session: Mutex<Option<AuthSession>>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionManager {
    pub fn new(
        auth: Arc<dyn AuthApi>,
        store: Arc<dyn Store>,
        db: SharedDb,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot {
            loading: true,
            ..SessionSnapshot::default()
        });
        Self {
            auth,
            store,
            db,
            clock,
            timeout,
            session: Mutex::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn user_id(&self) -> Option<String> {
        self.state.borrow().user.as_ref().map(|u| u.id.clone())
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    /// Restore the persisted session, if any.
    pub async fn initialize(&self) -> Result<()> {
        let stored = {
            let conn = self.db.lock().await;
            stored_session::load(&conn)
        };
        match stored {
            Ok(Some(stored)) => {
                info!(user_id = %stored.user_id, "restoring persisted session");
                self.apply_session(Some(AuthSession::from_stored(stored)))
                    .await
            }
            Ok(None) => {
                info!("no persisted session");
                self.state.send_replace(SessionSnapshot::signed_out(None));
                Ok(())
            }
            Err(e) => {
                let err = SessionError::from(e);
                error!(error = %err, "failed to read persisted session");
                self.state
                    .send_replace(SessionSnapshot::signed_out(Some(describe(&err))));
                Err(err)
            }
        }
    }

    /// Apply an auth-state change.
    ///
    /// `None` signs out locally. Unverified sessions are treated as signed
    /// out. Sessions close to expiry are refreshed before use.
    pub async fn apply_session(&self, session: Option<AuthSession>) -> Result<()> {
        let Some(session) = session else {
            self.clear_local().await?;
            self.state.send_replace(SessionSnapshot::signed_out(None));
            return Ok(());
        };

        if !session.user.is_verified() {
            info!(user_id = %session.user.id, "email not verified, treating as signed out");
            *self.session.lock().await = None;
            self.store.set_access_token(None);
            self.state.send_replace(SessionSnapshot::signed_out(None));
            return Ok(());
        }

        let session = if session.needs_refresh(self.clock.now_utc()) {
            match self.refresh(&session).await {
                Ok(fresh) => fresh,
                Err(err) => {
                    error!(error = %err, "session refresh failed");
                    if matches!(err, SessionError::Session(_)) {
                        self.clear_local().await?;
                    }
                    self.state
                        .send_replace(SessionSnapshot::signed_out(Some(describe(&err))));
                    return Err(err);
                }
            }
        } else {
            session
        };

        self.persist(&session).await?;
        let user = session.user.clone();
        self.store.set_access_token(Some(session.access_token.clone()));
        *self.session.lock().await = Some(session);
        self.state.send_modify(|s| {
            s.user = Some(user.clone());
            s.loading = true;
            s.error = None;
        });
        self.load_profile(&user.id).await
    }

    /// Exchange credentials for a session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionSnapshot> {
        let session = self
            .bounded("sign in", self.auth.sign_in_with_password(email, password))
            .await?;
        if !session.user.is_verified() {
            warn!(user_id = %session.user.id, "sign-in with unverified email rejected");
            return Err(SessionError::Session(
                "Please verify your email address before signing in".to_string(),
            ));
        }
        info!(user_id = %session.user.id, "signed in");
        self.apply_session(Some(session)).await?;
        Ok(self.snapshot())
    }

    /// Revoke the session remotely, then forget it locally.
    ///
    /// When the remote call fails the local session is kept.
    pub async fn sign_out(&self) -> Result<()> {
        let current = self.session.lock().await.clone();
        if let Some(session) = current {
            self.bounded("sign out", self.auth.sign_out(&session.access_token))
                .await?;
            info!(user_id = %session.user.id, "signed out");
        }
        self.apply_session(None).await
    }

    /// Re-read the profile of the signed-in user.
    pub async fn refetch_profile(&self) -> Result<Profile> {
        let user_id = self
            .user_id()
            .ok_or_else(|| SessionError::Session("not signed in".to_string()))?;
        self.ensure_fresh().await?;
        self.load_profile(&user_id).await?;
        self.profile().ok_or(SessionError::NoProfile(user_id))
    }

    /// Refresh the access token if it expires within the margin.
    ///
    /// The session lock is held across the refresh so concurrent callers
    /// cannot spend the single-use refresh token twice.
    pub async fn ensure_fresh(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        let Some(current) = guard.as_ref() else {
            return Err(SessionError::Session("not signed in".to_string()));
        };
        if !current.needs_refresh(self.clock.now_utc()) {
            return Ok(());
        }
        match self.refresh(current).await {
            Ok(fresh) => {
                self.persist(&fresh).await?;
                self.store.set_access_token(Some(fresh.access_token.clone()));
                *guard = Some(fresh);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed");
                if matches!(err, SessionError::Session(_)) {
                    *guard = None;
                    drop(guard);
                    self.clear_local().await?;
                    self.state
                        .send_replace(SessionSnapshot::signed_out(Some(describe(&err))));
                }
                Err(err)
            }
        }
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession> {
        let fresh = self
            .bounded(
                "session refresh",
                self.auth.refresh_session(&session.refresh_token),
            )
            .await?;
        info!(user_id = %fresh.user.id, expires_at = fresh.expires_at, "session refreshed");
        Ok(fresh)
    }

    async fn load_profile(&self, user_id: &str) -> Result<()> {
        match self.fetch_profile(user_id).await {
            Ok(profile) => {
                info!(user_id, username = %profile.username, "profile loaded");
                self.state.send_modify(|s| {
                    s.profile = Some(profile.clone());
                    s.error = None;
                    s.loading = false;
                    s.initialized = true;
                });
                Ok(())
            }
            Err(err) => {
                error!(user_id, error = %err, "profile load failed");
                let message = describe(&err);
                self.state.send_modify(|s| {
                    s.profile = None;
                    s.error = Some(message.clone());
                    s.loading = false;
                    s.initialized = true;
                });
                Err(err)
            }
        }
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Profile> {
        let store = self.store.as_ref();
        self.bounded_store("connectivity probe", profiles::probe(store))
            .await?;
        self.bounded_store("profile fetch", profiles::fetch(store, user_id))
            .await?
            .ok_or_else(|| SessionError::NoProfile(user_id.to_string()))
    }

    async fn persist(&self, session: &AuthSession) -> Result<()> {
        let conn = self.db.lock().await;
        stored_session::save(&conn, &session.to_stored(), self.clock.now_utc().timestamp())?;
        Ok(())
    }

    async fn clear_local(&self) -> Result<()> {
        *self.session.lock().await = None;
        self.store.set_access_token(None);
        let conn = self.db.lock().await;
        stored_session::clear(&conn)?;
        Ok(())
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| SessionError::Timeout(operation))?
    }

    async fn bounded_store<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = refnet_store::Result<T>>,
    ) -> Result<T> {
        self.bounded(operation, async { fut.await.map_err(SessionError::from) })
            .await
    }
}

/// User-facing text for a blocking session error.
fn describe(err: &SessionError) -> String {
    match err {
        SessionError::Connectivity(message) => {
            format!("Database connection failed: {message}")
        }
        SessionError::Timeout(operation) => {
            format!("Connection timeout during {operation} - the backend may be slow or unreachable.")
        }
        SessionError::NoProfile(_) => {
            "No profile found - you may need to complete registration".to_string()
        }
        SessionError::Session(message) => format!("Session error: {message}"),
        SessionError::Query(message) => format!("Profile fetch error: {message}"),
        SessionError::Storage(message) => format!("Local storage error: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAuth;
    use chrono::Duration as ChronoDuration;
    use refnet_store::{Collection, MemoryStore};
    use refnet_types::clock::ManualClock;
    use serde_json::json;

    struct Harness {
        clock: Arc<ManualClock>,
        auth: Arc<MemoryAuth>,
        store: Arc<MemoryStore>,
        db: SharedDb,
        manager: SessionManager,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::at("2026-03-10T12:00:00Z").expect("clock"));
        let auth = Arc::new(MemoryAuth::new(clock.clone()));
        auth.add_account("u1", "ada@example.com", "pw", Some(clock.now_utc()));
        auth.add_account("u2", "new@example.com", "pw", None);
        let store = Arc::new(MemoryStore::new());
        store.insert(
            Collection::Profiles,
            json!({"id": "u1", "username": "ada", "referral_code": "ADA1", "account_status": "active"}),
        );
        let db: SharedDb = Arc::new(Mutex::new(refnet_db::open_memory().expect("db")));
        let manager = SessionManager::new(
            auth.clone(),
            store.clone(),
            db.clone(),
            clock.clone(),
            Duration::from_secs(12),
        );
        Harness {
            clock,
            auth,
            store,
            db,
            manager,
        }
    }

    #[tokio::test]
    async fn test_initialize_without_session_is_signed_out() {
        let h = harness();
        assert!(h.manager.snapshot().loading);
        h.manager.initialize().await.expect("init");
        let snap = h.manager.snapshot();
        assert!(snap.initialized);
        assert!(!snap.loading);
        assert!(!snap.is_authenticated());
        assert_eq!(h.store.reads(), 0);
    }

    #[tokio::test]
    async fn test_sign_in_loads_profile_and_persists() {
        let h = harness();
        let snap = h
            .manager
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        assert!(snap.is_authenticated());
        assert_eq!(snap.profile.expect("profile").referral_code, "ADA1");
        assert!(h.store.access_token().is_some());

        let conn = h.db.lock().await;
        let stored = stored_session::load(&conn).expect("load").expect("row");
        assert_eq!(stored.user_id, "u1");
    }

    #[tokio::test]
    async fn test_unverified_email_is_rejected() {
        let h = harness();
        let err = h
            .manager
            .sign_in("new@example.com", "pw")
            .await
            .expect_err("unverified");
        assert!(matches!(err, SessionError::Session(_)));
        assert!(!h.manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_unverified_restored_session_is_signed_out() {
        let h = harness();
        let session = h.auth.issue(AuthUser {
            id: "u2".to_string(),
            email: Some("new@example.com".to_string()),
            email_confirmed_at: None,
        });
        h.manager
            .apply_session(Some(session))
            .await
            .expect("apply");
        assert!(h.manager.snapshot().user.is_none());
        assert_eq!(h.store.reads(), 0);
    }

    #[tokio::test]
    async fn test_restore_refreshes_expiring_token() {
        let h = harness();
        h.manager
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");

        h.clock.advance(ChronoDuration::seconds(3_550));
        let restored = SessionManager::new(
            h.auth.clone(),
            h.store.clone(),
            h.db.clone(),
            h.clock.clone(),
            Duration::from_secs(12),
        );
        restored.initialize().await.expect("restore");
        assert!(restored.is_authenticated());
        assert_eq!(h.auth.refreshes(), 1);
    }

    #[tokio::test]
    async fn test_missing_profile_is_blocking_error() {
        let h = harness();
        h.store.replace(Collection::Profiles, Vec::new());
        let err = h
            .manager
            .sign_in("ada@example.com", "pw")
            .await
            .expect_err("no profile");
        assert_eq!(err, SessionError::NoProfile("u1".to_string()));
        let snap = h.manager.snapshot();
        assert!(snap.user.is_some());
        assert!(snap.profile.is_none());
        assert_eq!(
            snap.error.as_deref(),
            Some("No profile found - you may need to complete registration")
        );
    }

    #[tokio::test]
    async fn test_offline_store_surfaces_connectivity_error() {
        let h = harness();
        h.store.set_offline(true);
        let err = h
            .manager
            .sign_in("ada@example.com", "pw")
            .await
            .expect_err("offline");
        assert!(err.is_blocking());
        assert!(h
            .manager
            .snapshot()
            .error
            .expect("error")
            .starts_with("Database connection failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        let h = harness();
        h.store.set_latency(Some(Duration::from_secs(30)));
        let err = h
            .manager
            .sign_in("ada@example.com", "pw")
            .await
            .expect_err("timeout");
        assert_eq!(err, SessionError::Timeout("connectivity probe"));
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let h = harness();
        h.manager
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        h.manager.sign_out().await.expect("sign out");
        assert!(!h.manager.is_authenticated());
        assert!(h.store.access_token().is_none());
        let conn = h.db.lock().await;
        assert!(stored_session::load(&conn).expect("load").is_none());
    }

    #[tokio::test]
    async fn test_failed_sign_out_keeps_session() {
        let h = harness();
        h.manager
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        h.auth.set_offline(true);
        assert!(h.manager.sign_out().await.is_err());
        assert!(h.manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let h = harness();
        let mut rx = h.manager.subscribe();
        h.manager
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        assert!(rx.has_changed().expect("sender alive"));
        assert!(rx.borrow_and_update().is_authenticated());
    }
}
