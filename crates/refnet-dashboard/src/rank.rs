//! Rank derivation and write-back.

use refnet_store::queries::profiles;
use refnet_store::Store;
use refnet_types::profile::Rank;
use tracing::{error, info};

/// Active direct referrals required for Ambassador.
pub const AMBASSADOR_ACTIVE: u32 = 10;
/// Team size required for Ambassador.
pub const AMBASSADOR_TEAM: u32 = 50;
pub const DIAMOND_ACTIVE: u32 = 4;
pub const PLATINUM_ACTIVE: u32 = 2;
pub const GOLD_ACTIVE: u32 = 1;

/// Rank for the given referral counts, checked from the highest tier down.
pub fn derive_rank(active_referrals: u32, team_size: u32) -> Rank {
    if active_referrals >= AMBASSADOR_ACTIVE && team_size >= AMBASSADOR_TEAM {
        Rank::Ambassador
    } else if active_referrals >= DIAMOND_ACTIVE {
        Rank::Diamond
    } else if active_referrals >= PLATINUM_ACTIVE {
        Rank::Platinum
    } else if active_referrals >= GOLD_ACTIVE {
        Rank::Gold
    } else {
        Rank::Starter
    }
}

/// Result of reconciling a stored rank with the derived one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankUpdate {
    pub previous: Rank,
    pub derived: Rank,
    /// Whether the correcting write was accepted.
    pub written: bool,
}

/// Write `derived` back when it differs from `stored`.
///
/// Returns `None` when nothing needed writing. A rejected write is logged
/// and reported with `written: false`; it is never an error.
pub async fn reconcile(
    store: &dyn Store,
    profile_id: &str,
    stored: Rank,
    derived: Rank,
) -> Option<RankUpdate> {
    if stored == derived {
        return None;
    }
    let written = match profiles::update_rank(store, profile_id, derived).await {
        Ok(()) => {
            info!(profile_id, from = %stored, to = %derived, "rank updated");
            true
        }
        Err(e) => {
            error!(profile_id, from = %stored, to = %derived, error = %e, "error updating rank");
            false
        }
    };
    Some(RankUpdate {
        previous: stored,
        derived,
        written,
    })
}
