//! User-initiated remote actions.

use refnet_store::queries::{pools, profiles};
use refnet_store::{Store, StoreError};
use refnet_types::profile::Profile;
use refnet_types::stats::PoolPhaseKind;
use tracing::{info, warn};

use crate::pool::PoolTracker;

/// Failure of a user-initiated action. Shown as a dismissable banner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The pool is not in the expired-unresolved phase.
    #[error("there is no expired pool to resolve")]
    NotExpired,

    /// An invocation of the same action is still running.
    #[error("another request is already in progress")]
    AlreadyPending,

    /// The remote procedure ran and declined; its message is shown verbatim.
    #[error("{0}")]
    Rejected(String),

    /// The remote call itself failed.
    #[error("{0}")]
    Remote(#[from] StoreError),
}

/// Outcome of an activation-reward claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// Already claimed earlier; nothing was written.
    AlreadyClaimed,
}

/// Invoke pool resolution for an expired pool.
///
/// On success the tracker moves to resolved and the remote message is
/// returned. On any failure the tracker is left untouched.
pub async fn resolve_expired_pool(
    store: &dyn Store,
    tracker: &mut PoolTracker,
    user_id: &str,
) -> Result<String, ActionError> {
    if tracker.kind() != PoolPhaseKind::ExpiredUnresolved {
        return Err(ActionError::NotExpired);
    }
    let resolution = pools::resolve_expired(store, user_id).await?;
    if !resolution.success {
        warn!(user_id, message = %resolution.message, "pool resolution declined");
        return Err(ActionError::Rejected(resolution.message));
    }
    tracker.mark_resolved();
    info!(user_id, message = %resolution.message, "pool resolved");
    Ok(resolution.message)
}

/// Claim the one-time activation reward.
///
/// A profile that already shows the flag issues no write. Otherwise the
/// remote update only matches an unclaimed row, so a concurrent duplicate
/// also comes back as [`ClaimOutcome::AlreadyClaimed`].
pub async fn claim_activation_reward(
    store: &dyn Store,
    profile: &Profile,
) -> Result<ClaimOutcome, ActionError> {
    if profile.activation_reward_claimed {
        return Ok(ClaimOutcome::AlreadyClaimed);
    }
    if profiles::mark_activation_reward_claimed(store, &profile.id).await? {
        info!(profile_id = %profile.id, "activation reward claimed");
        Ok(ClaimOutcome::Claimed)
    } else {
        Ok(ClaimOutcome::AlreadyClaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use refnet_store::queries::pools::HANDLE_EXPIRED_POOL;
    use refnet_store::{Collection, MemoryStore};
    use refnet_types::pool::{PoolProgress, PoolStatus};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2026-03-10T12:00:00Z".parse().expect("time")
    }

    fn expired_tracker() -> PoolTracker {
        let mut tracker = PoolTracker::new();
        tracker.load(
            Some(PoolProgress {
                pool_number: 1,
                pool_amount: 10.0,
                timer_end: now() - Duration::seconds(1),
                time_limit_minutes: 60,
                status: PoolStatus::Active,
                assigned_pool_id: None,
                created_at: None,
            }),
            now(),
        );
        tracker
    }

    #[tokio::test]
    async fn test_declined_resolution_keeps_state_and_message() {
        let store = MemoryStore::new();
        store.register_procedure(HANDLE_EXPIRED_POOL, |_, _| {
            Ok(json!({"success": false, "message": "You need 1 more active referral"}))
        });
        let mut tracker = expired_tracker();
        let err = resolve_expired_pool(&store, &mut tracker, "u1")
            .await
            .expect_err("declined");
        assert_eq!(err.to_string(), "You need 1 more active referral");
        assert_eq!(tracker.kind(), PoolPhaseKind::ExpiredUnresolved);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_state() {
        let store = MemoryStore::new();
        store.fail_procedure(
            HANDLE_EXPIRED_POOL,
            StoreError::Connectivity {
                message: "timeout".to_string(),
            },
        );
        let mut tracker = expired_tracker();
        let err = resolve_expired_pool(&store, &mut tracker, "u1")
            .await
            .expect_err("offline");
        assert!(matches!(err, ActionError::Remote(_)));
        assert_eq!(tracker.kind(), PoolPhaseKind::ExpiredUnresolved);
    }

    #[tokio::test]
    async fn test_successful_resolution() {
        let store = MemoryStore::new();
        store.register_procedure(HANDLE_EXPIRED_POOL, |_, _| {
            Ok(json!({"success": true, "message": "Moved to pool 2"}))
        });
        let mut tracker = expired_tracker();
        let message = resolve_expired_pool(&store, &mut tracker, "u1")
            .await
            .expect("resolved");
        assert_eq!(message, "Moved to pool 2");
        assert_eq!(tracker.kind(), PoolPhaseKind::Resolved);
    }

    #[tokio::test]
    async fn test_resolution_requires_expired_pool() {
        let store = MemoryStore::new();
        let mut tracker = PoolTracker::new();
        let err = resolve_expired_pool(&store, &mut tracker, "u1")
            .await
            .expect_err("no pool");
        assert_eq!(err, ActionError::NotExpired);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_second_claim_is_a_no_op() {
        let store = MemoryStore::new();
        store.insert(
            Collection::Profiles,
            json!({"id": "u1", "activation_reward_claimed": false}),
        );
        let mut profile = Profile::blank("u1");
        assert_eq!(
            claim_activation_reward(&store, &profile).await.expect("first"),
            ClaimOutcome::Claimed
        );
        // Stale local copy: the conditional update matches nothing.
        assert_eq!(
            claim_activation_reward(&store, &profile).await.expect("second"),
            ClaimOutcome::AlreadyClaimed
        );
        profile.activation_reward_claimed = true;
        let writes = store.writes();
        assert_eq!(
            claim_activation_reward(&store, &profile).await.expect("third"),
            ClaimOutcome::AlreadyClaimed
        );
        assert_eq!(store.writes(), writes);
    }
}
