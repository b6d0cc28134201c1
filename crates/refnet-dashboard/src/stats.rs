//! Client-side reduction of fetched rows into display metrics.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use refnet_types::clock::LocalZone;
use refnet_types::ledger::{Deposit, DepositStatus, ReferralBonus, Withdrawal, WithdrawalStatus};

/// Half-open `[start, end)` instant range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Income windows anchored to local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeWindows {
    pub today: Window,
    pub yesterday: Window,
    /// Sunday of the current week through the end of today.
    pub week: Window,
    /// First of the current month through the end of today.
    pub month: Window,
}

impl IncomeWindows {
    /// Windows around the local date `today`, each bounded by a midnight
    /// resolved through `zone`.
    pub fn at(today: NaiveDate, zone: &LocalZone) -> Self {
        let midnight = |date: NaiveDate| zone.start_of_day(date);
        let back = |days: u32| {
            today
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(today)
        };
        let tomorrow = midnight(today.succ_opt().unwrap_or(NaiveDate::MAX));
        let today_start = midnight(today);
        Self {
            today: Window {
                start: today_start,
                end: tomorrow,
            },
            yesterday: Window {
                start: midnight(back(1)),
                end: today_start,
            },
            week: Window {
                start: midnight(back(today.weekday().num_days_from_sunday())),
                end: tomorrow,
            },
            month: Window {
                start: midnight(back(today.day0())),
                end: tomorrow,
            },
        }
    }
}

/// Income sums over one set of bonus rows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IncomeTotals {
    pub total: f64,
    pub today: f64,
    pub yesterday: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub level: f64,
    pub sponsor: f64,
}

/// Sum bonus amounts by time window and income type.
pub fn income_totals(bonuses: &[ReferralBonus], windows: &IncomeWindows) -> IncomeTotals {
    let mut totals = IncomeTotals::default();
    for bonus in bonuses {
        let at = bonus.created_at;
        totals.total += bonus.amount;
        if windows.today.contains(at) {
            totals.today += bonus.amount;
        }
        if windows.yesterday.contains(at) {
            totals.yesterday += bonus.amount;
        }
        if windows.week.contains(at) {
            totals.weekly += bonus.amount;
        }
        if windows.month.contains(at) {
            totals.monthly += bonus.amount;
        }
        if bonus.bonus_type.is_level_income() {
            totals.level += bonus.amount;
        }
        if bonus.bonus_type.is_sponsor_income() {
            totals.sponsor += bonus.amount;
        }
    }
    totals
}

/// Sum of completed withdrawals.
pub fn total_withdrawals(rows: &[Withdrawal]) -> f64 {
    rows.iter()
        .filter(|w| w.status == WithdrawalStatus::Completed)
        .map(|w| w.amount)
        .sum()
}

/// Sum of confirmed deposits.
pub fn total_deposits(rows: &[Deposit]) -> f64 {
    rows.iter()
        .filter(|d| d.status == DepositStatus::Confirmed)
        .map(|d| d.amount)
        .sum()
}

/// Pool-assigned active referrals as a share of the pool tier's target.
///
/// `min(active / current_pool, 1) × 100`; 0 when there is no tier.
pub fn pool_referral_progress(active_pool_referrals: u32, current_pool: u32) -> f64 {
    if current_pool == 0 {
        return 0.0;
    }
    let ratio = f64::from(active_pool_referrals) / f64::from(current_pool);
    ratio.min(1.0) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use refnet_types::ledger::BonusType;

    fn utc(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("time")
            .with_timezone(&Utc)
    }

    /// Windows as seen at `rfc3339`, taking its offset as the local zone.
    fn windows_at(rfc3339: &str) -> IncomeWindows {
        let now = DateTime::parse_from_rfc3339(rfc3339).expect("time");
        IncomeWindows::at(now.date_naive(), &LocalZone::Fixed(*now.offset()))
    }

    fn bonus(amount: f64, at: &str, bonus_type: BonusType) -> ReferralBonus {
        ReferralBonus {
            bonus_type,
            amount,
            status: Some("completed".to_string()),
            created_at: utc(at),
        }
    }

    #[test]
    fn test_today_and_yesterday() {
        let windows = windows_at("2026-03-11T15:00:00+00:00");
        let rows = vec![
            bonus(5.0, "2026-03-11T09:00:00+00:00", BonusType::DirectReferral),
            bonus(3.0, "2026-03-10T21:00:00+00:00", BonusType::DirectReferral),
        ];
        let totals = income_totals(&rows, &windows);
        assert_eq!(totals.today, 5.0);
        assert_eq!(totals.yesterday, 3.0);
        assert_eq!(totals.total, 8.0);
    }

    #[test]
    fn test_windows_follow_local_midnight() {
        // 01:00 local at +03:00 is still the previous day in UTC.
        let windows = windows_at("2026-03-11T01:00:00+03:00");
        assert_eq!(windows.today.start.to_rfc3339(), "2026-03-10T21:00:00+00:00");
        assert_eq!(windows.today.end.to_rfc3339(), "2026-03-11T21:00:00+00:00");

        let rows = vec![bonus(4.0, "2026-03-10T22:30:00+00:00", BonusType::Level)];
        let totals = income_totals(&rows, &windows);
        assert_eq!(totals.today, 4.0);
        assert_eq!(totals.yesterday, 0.0);
    }

    #[test]
    fn test_week_starts_sunday_and_month_on_first() {
        // 2026-03-11 is a Wednesday.
        let windows = windows_at("2026-03-11T10:00:00+00:00");
        assert_eq!(windows.week.start.to_rfc3339(), "2026-03-08T00:00:00+00:00");
        assert_eq!(windows.month.start.to_rfc3339(), "2026-03-01T00:00:00+00:00");

        let rows = vec![
            bonus(1.0, "2026-03-07T23:59:59+00:00", BonusType::Level),
            bonus(2.0, "2026-03-08T00:00:00+00:00", BonusType::Sponsor),
            bonus(4.0, "2026-03-12T00:00:00+00:00", BonusType::Rank),
        ];
        let totals = income_totals(&rows, &windows);
        assert_eq!(totals.weekly, 2.0);
        assert_eq!(totals.monthly, 3.0);
        assert_eq!(totals.level, 1.0);
        assert_eq!(totals.sponsor, 6.0);
        assert_eq!(totals.total, 7.0);
    }

    #[test]
    fn test_windows_across_daylight_saving_change() {
        // New York moved to EDT on Sunday 8 March; the 11th is in EDT.
        let zone = LocalZone::parse("America/New_York").expect("zone");
        let today = NaiveDate::from_ymd_opt(2026, 3, 11).expect("date");
        let windows = IncomeWindows::at(today, &zone);
        assert_eq!(windows.today.start.to_rfc3339(), "2026-03-11T04:00:00+00:00");
        assert_eq!(windows.yesterday.start.to_rfc3339(), "2026-03-10T04:00:00+00:00");
        assert_eq!(windows.week.start.to_rfc3339(), "2026-03-08T05:00:00+00:00");
        assert_eq!(windows.month.start.to_rfc3339(), "2026-03-01T05:00:00+00:00");

        // 23:30 EST on 28 February belongs to February.
        let rows = vec![
            bonus(7.0, "2026-02-28T23:30:00-05:00", BonusType::Level),
            bonus(2.0, "2026-03-01T00:30:00-05:00", BonusType::Level),
        ];
        let totals = income_totals(&rows, &windows);
        assert_eq!(totals.monthly, 2.0);
        assert_eq!(totals.weekly, 0.0);
    }

    #[test]
    fn test_settled_sums() {
        let withdrawals = vec![
            Withdrawal {
                amount: 10.0,
                status: WithdrawalStatus::Completed,
            },
            Withdrawal {
                amount: 99.0,
                status: WithdrawalStatus::Pending,
            },
        ];
        let deposits = vec![
            Deposit {
                amount: 21.0,
                status: DepositStatus::Confirmed,
            },
            Deposit {
                amount: 5.0,
                status: DepositStatus::Failed,
            },
        ];
        assert_eq!(total_withdrawals(&withdrawals), 10.0);
        assert_eq!(total_deposits(&deposits), 21.0);
        assert_eq!(total_deposits(&[]), 0.0);
    }

    #[test]
    fn test_pool_referral_progress() {
        assert_eq!(pool_referral_progress(0, 0), 0.0);
        assert_eq!(pool_referral_progress(1, 2), 50.0);
        assert_eq!(pool_referral_progress(5, 2), 100.0);
    }
}
