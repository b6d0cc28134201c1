//! Integration test fixtures for the referral dashboard.
//!
//! [`World`] wires the session manager and dashboard controller to the
//! in-memory store, fake identity provider and a manual clock, so the
//! flows under `tests/` run without any network.
//!
//! ```sh
//! cargo test -p refnet-integration-tests
//! ```

use std::sync::Arc;
use std::time::Duration;

use refnet_dashboard::{Dashboard, DashboardConfig};
use refnet_session::memory::MemoryAuth;
use refnet_session::{AppContext, SessionManager, SharedDb};
use refnet_store::{Collection, MemoryStore};
use refnet_types::clock::{Clock, ManualClock};
use rusqlite::Connection;
use serde_json::{json, Value};

/// Fixed "now" of every scenario: a Wednesday afternoon in UTC.
pub const NOW: &str = "2026-03-11T15:00:00+00:00";

pub const SITE_ORIGIN: &str = "https://refnet.example";

/// Credentials of the seeded member.
pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";
pub const USER_ID: &str = "u-ada";
pub const REFERRAL_CODE: &str = "ADA1";

pub struct World {
    pub clock: Arc<ManualClock>,
    pub auth: Arc<MemoryAuth>,
    pub store: Arc<MemoryStore>,
    pub db: SharedDb,
    pub session: Arc<SessionManager>,
    pub dashboard: Dashboard,
}

impl World {
    /// A world over an in-memory database.
    pub fn new() -> Self {
        let conn = refnet_db::open_memory().expect("open in-memory db");
        Self::with_connection(conn, Arc::new(MemoryStore::new()))
    }

    /// A world over an existing database and store, e.g. to simulate a restart.
    pub fn with_connection(conn: Connection, store: Arc<MemoryStore>) -> Self {
        let clock = Arc::new(ManualClock::at(NOW).expect("parse NOW"));
        let auth = Arc::new(MemoryAuth::new(clock.clone()));
        auth.add_account(USER_ID, EMAIL, PASSWORD, Some(clock.now_utc()));

        let db: SharedDb = Arc::new(tokio::sync::Mutex::new(conn));
        let session = Arc::new(SessionManager::new(
            auth.clone(),
            store.clone(),
            db.clone(),
            clock.clone(),
            Duration::from_secs(12),
        ));
        let dashboard = Dashboard::new(
            session.clone(),
            store.clone(),
            clock.clone(),
            AppContext::new(db.clone()),
            DashboardConfig {
                site_origin: SITE_ORIGIN.to_string(),
                history_limit: 50,
            },
        );
        Self {
            clock,
            auth,
            store,
            db,
            session,
            dashboard,
        }
    }

    /// Insert the seeded member's profile with `overrides` merged on top.
    pub fn seed_member(&self, overrides: Value) {
        let mut profile = json!({
            "id": USER_ID,
            "username": "ada",
            "email": EMAIL,
            "referral_code": REFERRAL_CODE,
            "account_status": "active",
            "rank": "Starter",
            "main_wallet_balance": 12.5,
            "fund_wallet_balance": 30.0,
            "current_pool": 1,
            "activation_reward_claimed": false,
        });
        if let (Some(base), Value::Object(extra)) = (profile.as_object_mut(), overrides) {
            base.extend(extra);
        }
        self.store.insert(Collection::Profiles, profile);
    }

    /// Add `count` direct referrals of the member.
    pub fn seed_referrals(&self, count: u32, status: &str, pool: Option<u32>) {
        for i in 0..count {
            self.store.insert(
                Collection::Profiles,
                json!({
                    "id": format!("ref-{status}-{i}"),
                    "username": format!("ref{i}"),
                    "referred_by": REFERRAL_CODE,
                    "account_status": status,
                    "assigned_pool_id": pool,
                }),
            );
        }
    }

    /// Open a pool attempt ending at `timer_end`.
    pub fn seed_pool(&self, pool_number: u32, timer_end: &str, minutes: u32) {
        self.store.insert(
            Collection::PoolProgress,
            json!({
                "id": format!("pool-{pool_number}"),
                "user_id": USER_ID,
                "pool_number": pool_number,
                "pool_amount": 10.0 * f64::from(pool_number),
                "timer_end": timer_end,
                "time_limit_minutes": minutes,
                "status": "active",
                "created_at": "2026-03-11T12:00:00Z",
            }),
        );
    }

    pub fn seed_bonus(&self, bonus_type: &str, amount: f64, created_at: &str) {
        self.store.insert(
            Collection::ReferralBonuses,
            json!({
                "user_id": USER_ID,
                "bonus_type": bonus_type,
                "amount": amount,
                "status": "completed",
                "created_at": created_at,
            }),
        );
    }

    pub async fn sign_in(&self) {
        self.session
            .sign_in(EMAIL, PASSWORD)
            .await
            .expect("sign in as seeded member");
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
