//! Event types for daemon-to-UI notification.
//!
//! All events are emitted via the JSON-RPC event subscription channel.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Envelope for all daemon events.
#[derive(Clone, Debug, Serialize, Deserialize, TS)]
pub struct Event {
    pub event_type: EventType,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    #[ts(type = "unknown")]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, timestamp: i64, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            timestamp,
            payload,
        }
    }
}

/// All event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Session events
    SessionChanged,
    ProfileRefreshed,

    // Dashboard events
    DashboardRefreshed,
    RankChanged,

    // Pool events
    PoolCountdownTick,
    PoolExpired,
    PoolResolved,

    // Wallet events
    ActivationRewardClaimed,

    // System events
    DaemonStatus,
    ErrorOccurred,
}

impl EventType {
    /// Coarse category used by subscription filters.
    pub fn category(self) -> &'static str {
        match self {
            Self::SessionChanged | Self::ProfileRefreshed => "session",
            Self::DashboardRefreshed | Self::RankChanged | Self::ActivationRewardClaimed => {
                "dashboard"
            }
            Self::PoolCountdownTick | Self::PoolExpired | Self::PoolResolved => "pool",
            Self::DaemonStatus | Self::ErrorOccurred => "system",
        }
    }
}
