//! Profile records and the enumerations stored on them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ParseLabelError;

/// Account lifecycle status of a profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    #[default]
    Inactive,
    Passive,
}

impl AccountStatus {
    /// Label as stored in the `profiles.account_status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Passive => "passive",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "passive" => Ok(Self::Passive),
            other => Err(ParseLabelError::new("account_status", other)),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rank tier, ordered from lowest to highest.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
pub enum Rank {
    #[default]
    Starter,
    Gold,
    Platinum,
    Diamond,
    Ambassador,
}

impl Rank {
    /// All ranks, lowest first.
    pub const ALL: [Rank; 5] = [
        Rank::Starter,
        Rank::Gold,
        Rank::Platinum,
        Rank::Diamond,
        Rank::Ambassador,
    ];

    /// Label as stored in the `profiles.rank` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starter => "Starter",
            Self::Gold => "Gold",
            Self::Platinum => "Platinum",
            Self::Diamond => "Diamond",
            Self::Ambassador => "Ambassador",
        }
    }

    /// Short human description of what the rank requires.
    pub fn requirement_label(self) -> &'static str {
        match self {
            Self::Starter => "Just getting started",
            Self::Gold => "1 direct referral",
            Self::Platinum => "2 direct referrals",
            Self::Diamond => "4 direct referrals",
            Self::Ambassador => "10 direct referrals & 50 team size",
        }
    }
}

impl FromStr for Rank {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rank| rank.as_str() == s)
            .ok_or_else(|| ParseLabelError::new("rank", s))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized user profile.
///
/// Mutated by the remote store in response to remote procedures. The client
/// only re-derives and writes back `rank` and flips `activation_reward_claimed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub email: String,
    /// Unique code other users register with.
    pub referral_code: String,
    /// Code of the referring profile. A back-reference, not ownership.
    pub referred_by: Option<String>,
    pub rank: Rank,
    pub account_status: AccountStatus,
    pub main_wallet_balance: f64,
    pub fund_wallet_balance: f64,
    /// Current pool tier (0 = none).
    pub current_pool: u32,
    /// Pool this profile counts towards for its referrer.
    pub assigned_pool_id: Option<u32>,
    pub total_direct_referrals: u32,
    pub active_direct_referrals: u32,
    #[ts(type = "string | null")]
    pub activation_date: Option<DateTime<Utc>>,
    pub activation_reward_claimed: bool,
    pub first_reactivation_claimed: bool,
    #[ts(type = "string | null")]
    pub cycle_completed_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub created_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// An empty profile for the given id, with every counter at its default.
    pub fn blank(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: String::new(),
            email: String::new(),
            referral_code: String::new(),
            referred_by: None,
            rank: Rank::Starter,
            account_status: AccountStatus::Inactive,
            main_wallet_balance: 0.0,
            fund_wallet_balance: 0.0,
            current_pool: 0,
            assigned_pool_id: None,
            total_direct_referrals: 0,
            active_direct_referrals: 0,
            activation_date: None,
            activation_reward_claimed: false,
            first_reactivation_claimed: false,
            cycle_completed_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Whether the account has paid activation.
    pub fn is_active(&self) -> bool {
        self.account_status == AccountStatus::Active
    }
}
