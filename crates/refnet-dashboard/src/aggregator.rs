//! Dashboard Aggregator.
//!
//! One load issues the fixed set of reads concurrently, joins them, and
//! reduces the rows into [`DashboardStats`]. A failed read degrades only its
//! own metric to zero and is logged; it never aborts the load.

use std::sync::Arc;

use refnet_store::queries::{ledger, pools, profiles};
use refnet_store::Store;
use refnet_types::clock::Clock;
use refnet_types::pool::PoolProgress;
use refnet_types::profile::Profile;
use refnet_types::stats::DashboardStats;
use tracing::{debug, warn};

use crate::pool::countdown;
use crate::rank::{derive_rank, reconcile, RankUpdate};
use crate::stats::{
    income_totals, pool_referral_progress, total_deposits, total_withdrawals, IncomeWindows,
};

/// Everything one load produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardLoad {
    pub stats: DashboardStats,
    /// Latest open pool attempt, for the countdown.
    pub pool: Option<PoolProgress>,
    /// Set when the stored rank was stale.
    pub rank_update: Option<RankUpdate>,
    /// Metrics that fell back to defaults.
    pub degraded: Vec<&'static str>,
}

/// Issues the dashboard reads and reduces them.
pub struct DashboardAggregator {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

fn or_default<T: Default>(
    metric: &'static str,
    result: refnet_store::Result<T>,
    degraded: &mut Vec<&'static str>,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(metric, error = %e, "dashboard read failed, using default");
            degraded.push(metric);
            T::default()
        }
    }
}

impl DashboardAggregator {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Run one full load for `user_id` with the given profile.
    pub async fn load(&self, user_id: &str, profile: &Profile) -> DashboardLoad {
        let store = self.store.as_ref();
        let code = profile.referral_code.as_str();

        let (bonuses, withdrawals, deposits, team, active, pool) = tokio::join!(
            ledger::completed_bonuses(store, user_id),
            ledger::completed_withdrawals(store, user_id),
            ledger::confirmed_deposits(store, user_id),
            profiles::team_size(store, code),
            profiles::active_referral_count(store, code, None),
            pools::current(store, user_id),
        );

        let mut degraded = Vec::new();
        let counts_ok = team.is_ok() && active.is_ok();
        let bonuses = or_default("income", bonuses, &mut degraded);
        let withdrawals = or_default("withdrawals", withdrawals, &mut degraded);
        let deposits = or_default("deposits", deposits, &mut degraded);
        let team_size = or_default("team_size", team, &mut degraded);
        let active_direct = or_default("active_referrals", active, &mut degraded);
        let pool: Option<PoolProgress> = or_default("pool", pool, &mut degraded);

        let pool_active = match &pool {
            Some(p) => or_default(
                "pool_referrals",
                profiles::active_referral_count(store, code, Some(p.pool_number)).await,
                &mut degraded,
            ),
            None => 0,
        };

        let derived = derive_rank(active_direct, team_size);
        // Counts that failed to load read as zero; writing a rank derived
        // from them would demote the user.
        let rank_update = if counts_ok {
            reconcile(store, &profile.id, profile.rank, derived).await
        } else {
            None
        };

        let windows = IncomeWindows::at(self.clock.today(), &self.clock.zone());
        let totals = income_totals(&bonuses, &windows);
        let now_utc = self.clock.now_utc();

        let mut stats = DashboardStats {
            total_earnings: totals.total,
            today_income: totals.today,
            yesterday_income: totals.yesterday,
            weekly_income: totals.weekly,
            monthly_income: totals.monthly,
            level_income: totals.level,
            sponsor_income: totals.sponsor,
            total_withdrawals: total_withdrawals(&withdrawals),
            total_deposits: total_deposits(&deposits),
            direct_referrals: team_size,
            active_referrals: pool_active,
            active_direct_referrals: active_direct,
            team_size,
            current_pool: profile.current_pool,
            pool_referral_progress_pct: pool_referral_progress(pool_active, profile.current_pool),
            rank: if counts_ok { derived } else { profile.rank },
            account_status: profile.account_status,
            ..DashboardStats::default()
        };
        if let Some(p) = &pool {
            stats.pool_time_remaining = countdown(p, now_utc).time_remaining;
            stats.next_pool_reward = p.pool_amount;
            stats.pool_status = Some(p.status);
        }

        debug!(
            user_id,
            total_earnings = stats.total_earnings,
            team_size,
            rank = %stats.rank,
            degraded = degraded.len(),
            "dashboard loaded"
        );

        DashboardLoad {
            stats,
            pool,
            rank_update,
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refnet_store::{Collection, MemoryStore, StoreError};
    use refnet_types::clock::ManualClock;
    use refnet_types::pool::PoolStatus;
    use refnet_types::profile::{AccountStatus, Rank};
    use serde_json::json;

    fn profile() -> Profile {
        Profile {
            referral_code: "ADA1".to_string(),
            rank: Rank::Starter,
            account_status: AccountStatus::Active,
            current_pool: 2,
            ..Profile::blank("u1")
        }
    }

    fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert(Collection::Profiles, json!({"id": "u1", "rank": "Starter", "referral_code": "ADA1"}));
        for (id, status, pool) in [("a", "active", 2), ("b", "active", 1), ("c", "inactive", 2)] {
            store.insert(
                Collection::Profiles,
                json!({"id": id, "referred_by": "ADA1", "account_status": status, "assigned_pool_id": pool}),
            );
        }
        store.replace(
            Collection::ReferralBonuses,
            vec![
                json!({"user_id": "u1", "bonus_type": "direct_referral", "amount": 5.0, "status": "completed", "created_at": "2026-03-11T09:00:00Z"}),
                json!({"user_id": "u1", "bonus_type": "level", "amount": 3.0, "status": "completed", "created_at": "2026-03-10T09:00:00Z"}),
            ],
        );
        store.insert(Collection::Withdrawals, json!({"user_id": "u1", "amount": 4.0, "status": "completed"}));
        store.insert(Collection::Deposits, json!({"user_id": "u1", "amount": 21.0, "status": "confirmed"}));
        store.insert(
            Collection::PoolProgress,
            json!({"user_id": "u1", "pool_number": 2, "pool_amount": 40.0, "timer_end": "2026-03-11T16:00:00Z",
                   "time_limit_minutes": 120, "status": "active", "created_at": "2026-03-11T14:00:00Z"}),
        );
        store
    }

    fn aggregator(store: Arc<MemoryStore>) -> DashboardAggregator {
        let clock = Arc::new(ManualClock::at("2026-03-11T15:00:00+00:00").expect("clock"));
        DashboardAggregator::new(store, clock)
    }

    #[tokio::test]
    async fn test_full_load() {
        let store = seeded();
        let load = aggregator(store.clone()).load("u1", &profile()).await;
        let stats = &load.stats;
        assert!(load.degraded.is_empty());
        assert_eq!(stats.total_earnings, 8.0);
        assert_eq!(stats.today_income, 5.0);
        assert_eq!(stats.yesterday_income, 3.0);
        assert_eq!(stats.level_income, 3.0);
        assert_eq!(stats.total_withdrawals, 4.0);
        assert_eq!(stats.total_deposits, 21.0);
        assert_eq!(stats.team_size, 3);
        assert_eq!(stats.direct_referrals, 3);
        assert_eq!(stats.active_direct_referrals, 2);
        assert_eq!(stats.active_referrals, 1);
        assert_eq!(stats.pool_referral_progress_pct, 50.0);
        assert_eq!(stats.pool_time_remaining, "1h 0m 0s");
        assert_eq!(stats.next_pool_reward, 40.0);
        assert_eq!(stats.pool_status, Some(PoolStatus::Active));
        assert_eq!(stats.rank, Rank::Platinum);

        let update = load.rank_update.expect("stale rank");
        assert!(update.written);
        assert_eq!(store.rows(Collection::Profiles)[0]["rank"], "Platinum");
    }

    #[tokio::test]
    async fn test_failed_read_degrades_single_metric() {
        let store = seeded();
        store.fail_collection(
            Collection::Deposits,
            StoreError::Query {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let load = aggregator(store).load("u1", &profile()).await;
        assert_eq!(load.degraded, vec!["deposits"]);
        assert_eq!(load.stats.total_deposits, 0.0);
        assert_eq!(load.stats.total_earnings, 8.0);
    }

    #[tokio::test]
    async fn test_failed_counts_skip_rank_write() {
        let store = seeded();
        let mut p = profile();
        p.rank = Rank::Diamond;
        store.fail_collection(
            Collection::Profiles,
            StoreError::Connectivity {
                message: "reset".to_string(),
            },
        );
        let load = aggregator(store.clone()).load("u1", &p).await;
        assert!(load.rank_update.is_none());
        assert_eq!(load.stats.rank, Rank::Diamond);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn test_no_pool() {
        let store = seeded();
        store.replace(Collection::PoolProgress, Vec::new());
        let load = aggregator(store).load("u1", &profile()).await;
        assert!(load.pool.is_none());
        assert_eq!(load.stats.pool_time_remaining, "No active pool");
        assert_eq!(load.stats.active_referrals, 0);
        assert_eq!(load.stats.pool_status, None);
    }

    #[tokio::test]
    async fn test_every_load_rereads() {
        let store = seeded();
        let agg = aggregator(store.clone());
        agg.load("u1", &profile()).await;
        let first = store.reads();
        agg.load("u1", &profile()).await;
        assert_eq!(store.reads(), first * 2);
    }
}
