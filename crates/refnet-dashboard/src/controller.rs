//! Dashboard controller.
//!
//! Ties the session, the aggregator, the pool tracker and user actions
//! together behind one route guard. Every entry point checks for a verified
//! session with a loaded profile before touching the store. Loaded state
//! belongs to one user and is dropped when another user passes the guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use refnet_session::{AppContext, SessionError, SessionManager};
use refnet_store::{Store, StoreError};
use refnet_types::clock::Clock;
use refnet_types::profile::Profile;
use refnet_types::stats::{Notice, PoolCountdown};
use tracing::{info, warn};

use crate::actions::{self, ActionError, ClaimOutcome};
use crate::aggregator::{DashboardAggregator, DashboardLoad};
use crate::history::{self, HistoryEntry};
use crate::pool::PoolTracker;
use crate::ticker::{lock_tracker, CountdownTicker, SharedTracker};
use crate::view::{activation_fee_label, expired_hint, referral_link, DashboardView, MoneyView};

/// Where unauthenticated callers are sent.
pub const LOGIN_ROUTE: &str = "/login";

/// Default number of history rows.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// No verified session with a profile. Nothing was read.
    #[error("sign-in required")]
    SessionRequired { redirect: &'static str },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Static settings of the controller.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Public origin used for referral links.
    pub site_origin: String,
    pub history_limit: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            site_origin: "http://localhost:3000".to_string(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Clears the in-flight flag when the action finishes.
struct Pending<'a>(&'a AtomicBool);

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Dashboard {
    session: Arc<SessionManager>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    context: AppContext,
    aggregator: DashboardAggregator,
    tracker: SharedTracker,
    /// User whose data `last`, `notice` and `tracker` hold.
    owner: Mutex<Option<String>>,
    last: Mutex<Option<DashboardLoad>>,
    notice: Mutex<Option<Notice>>,
    pending: AtomicBool,
    config: DashboardConfig,
}

impl Dashboard {
    pub fn new(
        session: Arc<SessionManager>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        context: AppContext,
        config: DashboardConfig,
    ) -> Self {
        Self {
            aggregator: DashboardAggregator::new(store.clone(), clock.clone()),
            session,
            store,
            clock,
            context,
            tracker: Arc::new(Mutex::new(PoolTracker::new())),
            owner: Mutex::new(None),
            last: Mutex::new(None),
            notice: Mutex::new(None),
            pending: AtomicBool::new(false),
            config,
        }
    }

    /// Start a countdown ticker over this dashboard's pool tracker.
    pub fn spawn_ticker(&self, period: Duration) -> CountdownTicker {
        CountdownTicker::spawn(self.tracker.clone(), self.clock.clone(), period)
    }

    fn guard(&self) -> Result<(String, Profile), DashboardError> {
        let snapshot = self.session.snapshot();
        match (snapshot.user, snapshot.profile) {
            (Some(user), Some(profile)) => {
                self.adopt(&user.id);
                Ok((user.id, profile))
            }
            _ => Err(DashboardError::SessionRequired {
                redirect: LOGIN_ROUTE,
            }),
        }
    }

    /// Drop state loaded for anyone other than `user_id`.
    fn adopt(&self, user_id: &str) {
        let mut owner = lock(&self.owner);
        if owner.as_deref() == Some(user_id) {
            return;
        }
        if let Some(previous) = owner.replace(user_id.to_string()) {
            info!(previous = %previous, current = user_id, "signed-in user changed");
            self.clear();
        }
    }

    fn begin_action(&self) -> Result<Pending<'_>, ActionError> {
        self.pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ActionError::AlreadyPending)?;
        Ok(Pending(&self.pending))
    }

    pub fn action_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// The most recent aggregation, if any.
    pub fn last_load(&self) -> Option<DashboardLoad> {
        lock(&self.last).clone()
    }

    /// Forget everything loaded for the previous user.
    pub fn reset(&self) {
        *lock(&self.owner) = None;
        self.clear();
    }

    fn clear(&self) {
        *lock(&self.last) = None;
        *lock(&self.notice) = None;
        *lock_tracker(&self.tracker) = PoolTracker::new();
    }

    /// Re-run the full aggregation and return the new view.
    pub async fn refresh(&self) -> Result<DashboardView, DashboardError> {
        self.guard()?;
        self.session.ensure_fresh().await?;
        let (user_id, profile) = self.guard()?;

        let load = self.aggregator.load(&user_id, &profile).await;
        let profile = match &load.rank_update {
            Some(update) if update.written => match self.session.refetch_profile().await {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!(error = %e, "profile reload after rank change failed");
                    profile
                }
            },
            _ => profile,
        };
        if lock(&self.owner).as_deref() != Some(user_id.as_str()) {
            warn!(user_id = %user_id, "signed-in user changed during load, result dropped");
            return Err(DashboardError::SessionRequired {
                redirect: LOGIN_ROUTE,
            });
        }
        lock_tracker(&self.tracker).load(load.pool.clone(), self.clock.now_utc());
        let show = self.context.show_balances().await?;
        let view = self.render(&profile, &load, show);
        *lock(&self.last) = Some(load);
        Ok(view)
    }

    /// The view of the last load, loading first if there is none.
    pub async fn view(&self) -> Result<DashboardView, DashboardError> {
        let (_, profile) = self.guard()?;
        let last = lock(&self.last).clone();
        match last {
            Some(load) => {
                let show = self.context.show_balances().await?;
                Ok(self.render(&profile, &load, show))
            }
            None => self.refresh().await,
        }
    }

    fn render(&self, profile: &Profile, load: &DashboardLoad, show_balances: bool) -> DashboardView {
        let countdown = lock_tracker(&self.tracker).countdown(self.clock.now_utc());
        let stats = load.stats.clone();
        let action_pending = self.action_pending();
        DashboardView {
            username: profile.username.clone(),
            money: MoneyView::new(profile, &stats, show_balances),
            show_balances,
            notice: self.notice(),
            needs_activation: !profile.is_active(),
            activation_fee: activation_fee_label(),
            activation_reward_claimed: profile.activation_reward_claimed,
            rank_requirement: stats.rank.requirement_label(),
            referral_link: referral_link(&self.config.site_origin, &profile.referral_code),
            expired_hint: expired_hint(&countdown, stats.active_referrals),
            can_resolve_pool: expired_hint(&countdown, stats.active_referrals).is_some()
                && !action_pending,
            action_pending,
            countdown,
            stats,
        }
    }

    /// Countdown at this instant.
    pub fn countdown(&self) -> Result<PoolCountdown, DashboardError> {
        self.guard()?;
        Ok(lock_tracker(&self.tracker).countdown(self.clock.now_utc()))
    }

    /// Resolve the expired pool, then reload on success.
    ///
    /// Failures become an error banner and leave every piece of state as
    /// it was.
    pub async fn resolve_expired_pool(&self) -> Result<String, DashboardError> {
        let (user_id, _) = self.guard()?;
        let _pending = self.begin_action()?;

        let mut working = lock_tracker(&self.tracker).clone();
        match actions::resolve_expired_pool(self.store.as_ref(), &mut working, &user_id).await {
            Ok(message) => {
                lock_tracker(&self.tracker).mark_resolved();
                self.set_notice(Notice::success(message.clone()));
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "reload after pool resolution failed");
                }
                Ok(message)
            }
            Err(err) => {
                let message = match &err {
                    ActionError::Remote(e) => format!("Failed to resolve expired pool: {e}"),
                    other => other.to_string(),
                };
                self.set_notice(Notice::error(message));
                Err(err.into())
            }
        }
    }

    /// Claim the one-time activation reward.
    pub async fn claim_activation_reward(&self) -> Result<ClaimOutcome, DashboardError> {
        let (_, profile) = self.guard()?;
        let _pending = self.begin_action()?;

        match actions::claim_activation_reward(self.store.as_ref(), &profile).await {
            Ok(ClaimOutcome::Claimed) => {
                self.set_notice(Notice::success("Activation reward claimed successfully!"));
                if let Err(e) = self.session.refetch_profile().await {
                    warn!(error = %e, "profile reload after claim failed");
                }
                Ok(ClaimOutcome::Claimed)
            }
            Ok(ClaimOutcome::AlreadyClaimed) => {
                info!(profile_id = %profile.id, "activation reward already claimed");
                Ok(ClaimOutcome::AlreadyClaimed)
            }
            Err(err) => {
                self.set_notice(Notice::error(format!(
                    "Failed to claim activation reward: {err}"
                )));
                Err(err.into())
            }
        }
    }

    pub fn notice(&self) -> Option<Notice> {
        lock(&self.notice).clone()
    }

    fn set_notice(&self, notice: Notice) {
        *lock(&self.notice) = Some(notice);
    }

    pub fn dismiss_notice(&self) {
        *lock(&self.notice) = None;
    }

    /// Flip balance visibility, returning the new value.
    pub async fn toggle_balances(&self) -> Result<bool, DashboardError> {
        self.guard()?;
        Ok(self.context.toggle_balances().await?)
    }

    pub fn referral_link(&self) -> Result<String, DashboardError> {
        let (_, profile) = self.guard()?;
        Ok(referral_link(&self.config.site_origin, &profile.referral_code))
    }

    pub async fn transaction_history(&self) -> Result<Vec<HistoryEntry>, DashboardError> {
        let (user_id, _) = self.guard()?;
        self.session.ensure_fresh().await?;
        Ok(history::load(self.store.as_ref(), &user_id, self.config.history_limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refnet_session::memory::MemoryAuth;
    use refnet_session::SharedDb;
    use refnet_store::queries::pools::HANDLE_EXPIRED_POOL;
    use refnet_store::{Collection, MemoryStore};
    use refnet_types::clock::ManualClock;
    use refnet_types::stats::{NoticeKind, PoolPhaseKind};
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryStore>,
        session: Arc<SessionManager>,
        dashboard: Dashboard,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::at("2026-03-11T15:00:00+00:00").expect("clock"));
        let auth = Arc::new(MemoryAuth::new(clock.clone()));
        auth.add_account("u1", "ada@example.com", "pw", Some(clock.now_utc()));
        auth.add_account("u2", "bob@example.com", "pw", Some(clock.now_utc()));
        let store = Arc::new(MemoryStore::new());
        store.insert(
            Collection::Profiles,
            json!({"id": "u1", "username": "ada", "referral_code": "ADA1", "account_status": "active",
                   "rank": "Starter", "current_pool": 1, "activation_reward_claimed": false}),
        );
        store.insert(
            Collection::Profiles,
            json!({"id": "u2", "username": "bob", "referral_code": "BOB1", "account_status": "active",
                   "rank": "Starter", "current_pool": 0, "activation_reward_claimed": false}),
        );
        store.insert(
            Collection::PoolProgress,
            json!({"user_id": "u1", "pool_number": 1, "pool_amount": 10.0, "timer_end": "2026-03-11T14:00:00Z",
                   "time_limit_minutes": 60, "status": "active", "created_at": "2026-03-11T13:00:00Z"}),
        );
        let db: SharedDb = Arc::new(tokio::sync::Mutex::new(
            refnet_db::open_memory().expect("db"),
        ));
        let session = Arc::new(SessionManager::new(
            auth,
            store.clone(),
            db.clone(),
            clock.clone(),
            Duration::from_secs(12),
        ));
        let dashboard = Dashboard::new(
            session.clone(),
            store.clone(),
            clock,
            AppContext::new(db),
            DashboardConfig {
                site_origin: "https://refnet.example".to_string(),
                history_limit: 20,
            },
        );
        Harness {
            store,
            session,
            dashboard,
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_redirects_without_reads() {
        let h = harness();
        h.session.initialize().await.expect("init");
        let err = h.dashboard.refresh().await.expect_err("guarded");
        assert!(matches!(
            err,
            DashboardError::SessionRequired { redirect: "/login" }
        ));
        assert!(h.dashboard.resolve_expired_pool().await.is_err());
        assert!(h.dashboard.transaction_history().await.is_err());
        assert_eq!(h.store.reads(), 0);
        assert!(h.store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_builds_view() {
        let h = harness();
        h.session
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        let view = h.dashboard.refresh().await.expect("view");
        assert_eq!(view.username, "ada");
        assert_eq!(view.countdown.phase, PoolPhaseKind::ExpiredUnresolved);
        assert_eq!(view.stats.pool_time_remaining, "Expired");
        assert!(view.can_resolve_pool);
        assert!(!view.needs_activation);
        assert_eq!(view.referral_link, "https://refnet.example/register?ref=ADA1");
        assert_eq!(view.rank_requirement, "Just getting started");
    }

    #[tokio::test]
    async fn test_declined_resolution_shows_message_verbatim() {
        let h = harness();
        h.store.register_procedure(HANDLE_EXPIRED_POOL, |_, _| {
            Ok(json!({"success": false, "message": "Not enough referrals"}))
        });
        h.session
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        h.dashboard.refresh().await.expect("view");

        let err = h
            .dashboard
            .resolve_expired_pool()
            .await
            .expect_err("declined");
        assert!(matches!(err, DashboardError::Action(ActionError::Rejected(_))));
        let notice = h.dashboard.notice().expect("banner");
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.message, "Not enough referrals");
        assert_eq!(
            h.dashboard.countdown().expect("countdown").phase,
            PoolPhaseKind::ExpiredUnresolved
        );
        assert!(!h.dashboard.action_pending());

        h.dashboard.dismiss_notice();
        assert!(h.dashboard.notice().is_none());
    }

    #[tokio::test]
    async fn test_successful_resolution_reloads() {
        let h = harness();
        h.store.register_procedure(HANDLE_EXPIRED_POOL, |tables, _| {
            if let Some(rows) = tables.get_mut(&Collection::PoolProgress) {
                for row in rows.iter_mut() {
                    row["status"] = json!("completed");
                }
            }
            Ok(json!({"success": true, "message": "Pool completed"}))
        });
        h.session
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        h.dashboard.refresh().await.expect("view");
        let message = h.dashboard.resolve_expired_pool().await.expect("resolved");
        assert_eq!(message, "Pool completed");
        let view = h.dashboard.view().await.expect("view");
        assert_eq!(view.countdown.phase, PoolPhaseKind::NoPool);
        assert_eq!(view.notice.expect("banner").kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn test_claim_twice_is_no_op() {
        let h = harness();
        h.session
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        assert_eq!(
            h.dashboard.claim_activation_reward().await.expect("claim"),
            ClaimOutcome::Claimed
        );
        assert!(h.session.profile().expect("profile").activation_reward_claimed);
        let writes = h.store.writes();
        assert_eq!(
            h.dashboard.claim_activation_reward().await.expect("claim"),
            ClaimOutcome::AlreadyClaimed
        );
        assert_eq!(h.store.writes(), writes);
    }

    #[tokio::test]
    async fn test_toggle_balances_masks_money() {
        let h = harness();
        h.session
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        assert!(!h.dashboard.toggle_balances().await.expect("toggle"));
        let view = h.dashboard.view().await.expect("view");
        assert!(!view.show_balances);
        assert_eq!(view.money.main_wallet, refnet_types::MASKED_AMOUNT);
    }

    #[tokio::test]
    async fn test_reset_forgets_previous_user() {
        let h = harness();
        h.session
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in");
        h.dashboard.refresh().await.expect("view");
        assert!(h.dashboard.last_load().is_some());

        h.dashboard.reset();
        assert!(h.dashboard.last_load().is_none());
        assert_eq!(
            h.dashboard.countdown().expect("countdown").phase,
            PoolPhaseKind::NoPool
        );
    }

    #[tokio::test]
    async fn test_switching_user_drops_previous_load() {
        let h = harness();
        h.store.insert(
            Collection::ReferralBonuses,
            json!({"user_id": "u1", "bonus_type": "level", "amount": 500.0, "status": "completed",
                   "created_at": "2026-03-11T09:00:00Z"}),
        );
        h.session
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in ada");
        let view = h.dashboard.refresh().await.expect("view");
        assert_eq!(view.stats.total_earnings, 500.0);
        h.dashboard.dismiss_notice();

        h.session
            .sign_in("bob@example.com", "pw")
            .await
            .expect("sign in bob");
        let view = h.dashboard.view().await.expect("view");
        assert_eq!(view.username, "bob");
        assert_eq!(view.stats.total_earnings, 0.0);
        assert_eq!(view.countdown.phase, PoolPhaseKind::NoPool);
        assert!(!view.can_resolve_pool);
    }

    #[tokio::test]
    async fn test_countdown_not_carried_to_next_user() {
        let h = harness();
        h.session
            .sign_in("ada@example.com", "pw")
            .await
            .expect("sign in ada");
        h.dashboard.refresh().await.expect("view");
        assert_eq!(
            h.dashboard.countdown().expect("countdown").phase,
            PoolPhaseKind::ExpiredUnresolved
        );

        h.session
            .sign_in("bob@example.com", "pw")
            .await
            .expect("sign in bob");
        assert_eq!(
            h.dashboard.countdown().expect("countdown").phase,
            PoolPhaseKind::NoPool
        );
        assert!(h.dashboard.last_load().is_none());
    }
}
