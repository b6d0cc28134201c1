//! Render-ready view model of the dashboard.

use refnet_types::profile::Profile;
use refnet_types::stats::{DashboardStats, Notice, PoolCountdown, PoolPhaseKind};
use refnet_types::{format_usd, format_usd_masked, ACTIVATION_FEE_USD};
use serde::Serialize;

/// Money values as displayed, masked while balances are hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoneyView {
    pub main_wallet: String,
    pub fund_wallet: String,
    pub total_earnings: String,
    pub today_income: String,
    pub yesterday_income: String,
    pub weekly_income: String,
    pub monthly_income: String,
    pub level_income: String,
    pub sponsor_income: String,
    pub total_withdrawals: String,
    pub total_deposits: String,
    pub next_pool_reward: String,
}

impl MoneyView {
    pub fn new(profile: &Profile, stats: &DashboardStats, show: bool) -> Self {
        let fmt = |amount: f64| format_usd_masked(amount, show);
        Self {
            main_wallet: fmt(profile.main_wallet_balance),
            fund_wallet: fmt(profile.fund_wallet_balance),
            total_earnings: fmt(stats.total_earnings),
            today_income: fmt(stats.today_income),
            yesterday_income: fmt(stats.yesterday_income),
            weekly_income: fmt(stats.weekly_income),
            monthly_income: fmt(stats.monthly_income),
            level_income: fmt(stats.level_income),
            sponsor_income: fmt(stats.sponsor_income),
            total_withdrawals: fmt(stats.total_withdrawals),
            total_deposits: fmt(stats.total_deposits),
            // Pool rewards are public tier amounts, never masked.
            next_pool_reward: format_usd(stats.next_pool_reward),
        }
    }
}

/// Everything the dashboard screen renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub username: String,
    pub stats: DashboardStats,
    pub countdown: PoolCountdown,
    pub money: MoneyView,
    pub show_balances: bool,
    pub notice: Option<Notice>,
    pub needs_activation: bool,
    pub activation_fee: String,
    pub activation_reward_claimed: bool,
    pub rank_requirement: &'static str,
    pub referral_link: String,
    /// Banner text while the pool is expired and unresolved.
    pub expired_hint: Option<&'static str>,
    /// The resolve button is enabled.
    pub can_resolve_pool: bool,
    pub action_pending: bool,
}

/// Banner text for an expired pool.
pub fn expired_hint(countdown: &PoolCountdown, pool_active_referrals: u32) -> Option<&'static str> {
    if countdown.phase != PoolPhaseKind::ExpiredUnresolved {
        return None;
    }
    Some(if pool_active_referrals < 1 {
        "Pool expired! Add 1 active referral to complete this pool and move to the next."
    } else {
        "Pool expired! Resolve the expired pool to move to the next."
    })
}

/// `{site_origin}/register?ref={code}`.
pub fn referral_link(site_origin: &str, referral_code: &str) -> String {
    format!(
        "{}/register?ref={}",
        site_origin.trim_end_matches('/'),
        referral_code
    )
}

/// Whole-dollar fee label, e.g. `$21`.
pub fn activation_fee_label() -> String {
    format!("${ACTIVATION_FEE_USD}")
}
