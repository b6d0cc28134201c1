//! Pool progress records.
//!
//! A pool is a time-boxed reward tier. Each attempt is one `pool_progress`
//! row, created and transitioned exclusively by the remote store. At most one
//! row per user is `active` or `expired_needs_referrals` at a time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ParseLabelError;

/// Lifecycle status of a pool attempt as stored remotely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Active,
    ExpiredNeedsReferrals,
    Completed,
}

impl PoolStatus {
    /// Statuses the client treats as "the current pool".
    pub const OPEN: [PoolStatus; 2] = [PoolStatus::Active, PoolStatus::ExpiredNeedsReferrals];

    /// Label as stored in the `pool_progress.status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::ExpiredNeedsReferrals => "expired_needs_referrals",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for PoolStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired_needs_referrals" => Ok(Self::ExpiredNeedsReferrals),
            "completed" => Ok(Self::Completed),
            other => Err(ParseLabelError::new("pool_status", other)),
        }
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pool attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TS)]
pub struct PoolProgress {
    /// Pool tier number.
    pub pool_number: u32,
    /// Reward paid on completion.
    pub pool_amount: f64,
    /// Absolute deadline.
    #[ts(type = "string")]
    pub timer_end: DateTime<Utc>,
    /// Length of the whole window.
    pub time_limit_minutes: u32,
    pub status: PoolStatus,
    #[serde(default)]
    pub assigned_pool_id: Option<u32>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub created_at: Option<DateTime<Utc>>,
}

impl PoolProgress {
    /// Total window length in milliseconds.
    pub fn window_millis(&self) -> i64 {
        i64::from(self.time_limit_minutes) * 60 * 1000
    }
}

/// Result of the remote `handle_expired_pool` procedure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PoolResolution {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_status_labels() {
        assert_eq!(PoolStatus::ExpiredNeedsReferrals.as_str(), "expired_needs_referrals");
        assert_eq!(
            "completed".parse::<PoolStatus>().expect("parse"),
            PoolStatus::Completed
        );
        assert!("paused".parse::<PoolStatus>().is_err());
    }

    #[test]
    fn test_pool_progress_decodes_store_row() {
        let row = serde_json::json!({
            "pool_number": 2,
            "pool_amount": 15.0,
            "timer_end": "2026-01-01T12:00:00Z",
            "time_limit_minutes": 60,
            "status": "expired_needs_referrals",
        });
        let pool: PoolProgress = serde_json::from_value(row).expect("decode");
        assert_eq!(pool.status, PoolStatus::ExpiredNeedsReferrals);
        assert_eq!(pool.window_millis(), 3_600_000);
        assert!(pool.assigned_pool_id.is_none());
    }

    #[test]
    fn test_resolution_message_defaults_empty() {
        let res: PoolResolution =
            serde_json::from_value(serde_json::json!({"success": false})).expect("decode");
        assert!(!res.success);
        assert!(res.message.is_empty());
    }
}
