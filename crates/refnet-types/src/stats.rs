//! View-facing aggregates rendered by the dashboard.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::pool::PoolStatus;
use crate::profile::{AccountStatus, Rank};

/// Label shown when the user has no open pool.
pub const NO_ACTIVE_POOL: &str = "No active pool";

/// Label shown once the pool deadline has passed.
pub const POOL_EXPIRED: &str = "Expired";

/// Display metrics computed on each dashboard load.
///
/// Every field has a zero/default value so a failed read degrades a single
/// metric instead of the whole object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct DashboardStats {
    pub total_earnings: f64,
    pub today_income: f64,
    pub yesterday_income: f64,
    pub weekly_income: f64,
    pub monthly_income: f64,
    pub level_income: f64,
    pub sponsor_income: f64,
    pub total_withdrawals: f64,
    pub total_deposits: f64,
    /// Count of direct referrals.
    pub direct_referrals: u32,
    /// Active direct referrals assigned to the current pool.
    pub active_referrals: u32,
    /// Active direct referrals regardless of pool.
    pub active_direct_referrals: u32,
    /// Direct referrals only, not the full downstream tree.
    pub team_size: u32,
    pub current_pool: u32,
    pub pool_time_remaining: String,
    pub next_pool_reward: f64,
    pub pool_status: Option<PoolStatus>,
    /// Pool-specific referral progress towards `current_pool`, in `[0, 100]`.
    pub pool_referral_progress_pct: f64,
    pub rank: Rank,
    pub account_status: AccountStatus,
}

impl Default for DashboardStats {
    fn default() -> Self {
        Self {
            total_earnings: 0.0,
            today_income: 0.0,
            yesterday_income: 0.0,
            weekly_income: 0.0,
            monthly_income: 0.0,
            level_income: 0.0,
            sponsor_income: 0.0,
            total_withdrawals: 0.0,
            total_deposits: 0.0,
            direct_referrals: 0,
            active_referrals: 0,
            active_direct_referrals: 0,
            team_size: 0,
            current_pool: 0,
            pool_time_remaining: NO_ACTIVE_POOL.to_string(),
            next_pool_reward: 0.0,
            pool_status: None,
            pool_referral_progress_pct: 0.0,
            rank: Rank::Starter,
            account_status: AccountStatus::Inactive,
        }
    }
}

/// Phase of the local pool countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum PoolPhaseKind {
    NoPool,
    CountingDown,
    ExpiredUnresolved,
    Resolved,
}

/// Snapshot of the countdown at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct PoolCountdown {
    pub phase: PoolPhaseKind,
    /// `"1h 2m 3s"`, [`POOL_EXPIRED`] or [`NO_ACTIVE_POOL`].
    pub time_remaining: String,
    /// Share of the window still remaining, in `[0, 100]`.
    pub progress_pct: f64,
    pub remaining_secs: i64,
}

impl PoolCountdown {
    /// Countdown for a user without an open pool.
    pub fn none() -> Self {
        Self {
            phase: PoolPhaseKind::NoPool,
            time_remaining: NO_ACTIVE_POOL.to_string(),
            progress_pct: 0.0,
            remaining_secs: 0,
        }
    }
}

/// Severity of an inline banner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A dismissable inline banner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stats_are_zero() {
        let stats = DashboardStats::default();
        assert_eq!(stats.total_earnings, 0.0);
        assert_eq!(stats.team_size, 0);
        assert_eq!(stats.pool_time_remaining, NO_ACTIVE_POOL);
        assert_eq!(stats.rank, Rank::Starter);
    }

    #[test]
    fn test_countdown_none() {
        let c = PoolCountdown::none();
        assert_eq!(c.phase, PoolPhaseKind::NoPool);
        assert_eq!(c.time_remaining, NO_ACTIVE_POOL);
    }

    #[test]
    fn test_notice_serialization() {
        let json = serde_json::to_value(Notice::error("boom")).expect("serialize");
        assert_eq!(json["kind"], "error");
        assert_eq!(json["message"], "boom");
    }
}
