//! Ledger rows: referral bonuses, withdrawals, deposits and transfers.
//!
//! All of these are append-only on the remote side. The client only sums and
//! lists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Income category of a referral bonus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum BonusType {
    DirectReferral,
    Level,
    Sponsor,
    Rank,
    Pool,
    Activation,
    #[default]
    #[serde(other)]
    Other,
}

impl BonusType {
    /// Whether this bonus counts towards "level income".
    pub fn is_level_income(self) -> bool {
        matches!(self, Self::Level)
    }

    /// Whether this bonus counts towards "sponsor/rank income".
    pub fn is_sponsor_income(self) -> bool {
        matches!(self, Self::Sponsor | Self::Rank)
    }
}

/// An immutable referral bonus ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct ReferralBonus {
    #[serde(default)]
    pub bonus_type: BonusType,
    pub amount: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Settlement status of a withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
    #[serde(other)]
    Other,
}

/// A withdrawal request row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct Withdrawal {
    pub amount: f64,
    pub status: WithdrawalStatus,
}

/// Settlement status of a deposit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    Confirmed,
    Failed,
    #[serde(other)]
    Other,
}

/// A deposit row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct Deposit {
    pub amount: f64,
    pub status: DepositStatus,
}

/// A fund wallet movement (top-ups, activation payments, transfers in/out).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct FundWalletTransaction {
    pub id: String,
    pub amount: f64,
    pub transaction_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// A peer-to-peer transfer as returned by `get_user_transfer_history`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct P2pTransfer {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub amount: f64,
    #[serde(default)]
    pub sender_username: Option<String>,
    #[serde(default)]
    pub receiver_username: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}
