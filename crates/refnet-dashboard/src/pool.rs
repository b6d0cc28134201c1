//! Pool countdown state machine.
//!
//! ```text
//!   NoPool ──load(active, future deadline)──▶ CountingDown
//!   CountingDown ──tick(now ≥ timer_end)──▶ ExpiredUnresolved
//!   ExpiredUnresolved ──resolution succeeded──▶ Resolved
//!   any ──load(next fetch)──▶ NoPool | CountingDown | ExpiredUnresolved
//! ```
//!
//! Time only enters through the `now` arguments, so every transition is
//! reproducible: the same pool at the same instant always yields the same
//! countdown.

use chrono::{DateTime, Utc};
use refnet_types::pool::{PoolProgress, PoolStatus};
use refnet_types::stats::{PoolCountdown, PoolPhaseKind, POOL_EXPIRED};

/// Current phase, carrying the pool attempt it concerns.
#[derive(Clone, Debug, PartialEq)]
pub enum PoolPhase {
    NoPool,
    CountingDown(PoolProgress),
    ExpiredUnresolved(PoolProgress),
    Resolved,
}

impl PoolPhase {
    pub fn kind(&self) -> PoolPhaseKind {
        match self {
            Self::NoPool => PoolPhaseKind::NoPool,
            Self::CountingDown(_) => PoolPhaseKind::CountingDown,
            Self::ExpiredUnresolved(_) => PoolPhaseKind::ExpiredUnresolved,
            Self::Resolved => PoolPhaseKind::Resolved,
        }
    }

    pub fn pool(&self) -> Option<&PoolProgress> {
        match self {
            Self::CountingDown(p) | Self::ExpiredUnresolved(p) => Some(p),
            Self::NoPool | Self::Resolved => None,
        }
    }
}

/// Drives [`PoolPhase`] from fetched rows and clock ticks.
#[derive(Clone, Debug)]
pub struct PoolTracker {
    phase: PoolPhase,
}

impl Default for PoolTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolTracker {
    pub fn new() -> Self {
        Self {
            phase: PoolPhase::NoPool,
        }
    }

    pub fn phase(&self) -> &PoolPhase {
        &self.phase
    }

    pub fn kind(&self) -> PoolPhaseKind {
        self.phase.kind()
    }

    /// Replace the phase from the latest open pool row.
    ///
    /// A row already marked `expired_needs_referrals`, or whose deadline has
    /// passed, starts out expired.
    pub fn load(&mut self, pool: Option<PoolProgress>, now: DateTime<Utc>) {
        self.phase = match pool {
            None => PoolPhase::NoPool,
            Some(p) if p.status == PoolStatus::Completed => PoolPhase::NoPool,
            Some(p) if p.status == PoolStatus::ExpiredNeedsReferrals || p.timer_end <= now => {
                PoolPhase::ExpiredUnresolved(p)
            }
            Some(p) => PoolPhase::CountingDown(p),
        };
    }

    /// Advance to `now`. Returns true on the tick that crosses the deadline.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let expired = match &self.phase {
            PoolPhase::CountingDown(p) if p.timer_end <= now => p.clone(),
            _ => return false,
        };
        self.phase = PoolPhase::ExpiredUnresolved(expired);
        true
    }

    /// Record a successful remote resolution.
    ///
    /// Only valid while expired; returns false (and changes nothing)
    /// otherwise.
    pub fn mark_resolved(&mut self) -> bool {
        if matches!(self.phase, PoolPhase::ExpiredUnresolved(_)) {
            self.phase = PoolPhase::Resolved;
            true
        } else {
            false
        }
    }

    /// Countdown view at `now`, without changing the phase.
    pub fn countdown(&self, now: DateTime<Utc>) -> PoolCountdown {
        match &self.phase {
            PoolPhase::NoPool => PoolCountdown::none(),
            PoolPhase::Resolved => PoolCountdown {
                phase: PoolPhaseKind::Resolved,
                ..PoolCountdown::none()
            },
            PoolPhase::CountingDown(p) | PoolPhase::ExpiredUnresolved(p) => {
                let mut view = countdown(p, now);
                // A loaded-expired row stays expired even if its deadline is
                // still ahead (remote already marked it).
                if matches!(self.phase, PoolPhase::ExpiredUnresolved(_)) {
                    view.phase = PoolPhaseKind::ExpiredUnresolved;
                    view.time_remaining = POOL_EXPIRED.to_string();
                    view.progress_pct = 0.0;
                    view.remaining_secs = 0;
                }
                view
            }
        }
    }
}

/// Countdown of one pool attempt at `now`.
pub fn countdown(pool: &PoolProgress, now: DateTime<Utc>) -> PoolCountdown {
    let remaining_ms = (pool.timer_end - now).num_milliseconds();
    if remaining_ms <= 0 {
        return PoolCountdown {
            phase: PoolPhaseKind::ExpiredUnresolved,
            time_remaining: POOL_EXPIRED.to_string(),
            progress_pct: 0.0,
            remaining_secs: 0,
        };
    }
    let remaining_secs = remaining_ms / 1000;
    PoolCountdown {
        phase: PoolPhaseKind::CountingDown,
        time_remaining: format_remaining(remaining_secs),
        progress_pct: progress_pct(remaining_ms, pool.window_millis()),
        remaining_secs,
    }
}

/// `"{h}h {m}m {s}s"`; hours are not wrapped into days.
pub fn format_remaining(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

/// `100 × (1 − elapsed / window)`, clamped to `[0, 100]`.
///
/// A zero-length window reports 0.
pub fn progress_pct(remaining_ms: i64, window_ms: i64) -> f64 {
    if window_ms <= 0 {
        return 0.0;
    }
    let elapsed = (window_ms - remaining_ms) as f64;
    (100.0 * (1.0 - elapsed / window_ms as f64)).clamp(0.0, 100.0)
}
