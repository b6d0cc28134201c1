//! The `profiles` collection.
//!
//! Profile rows are sanitized rather than rejected: missing or null fields
//! take their defaults and unknown enum labels fall back to the lowest tier.

use chrono::{DateTime, Utc};
use refnet_types::profile::{AccountStatus, Profile, Rank};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::count_u32;
use crate::query::{Collection, Query};
use crate::{Result, Store, StoreError};

/// Cheap reachability check: a head count bounded to one row.
pub async fn probe(store: &dyn Store) -> Result<()> {
    let query = Query::from(Collection::Profiles).select("id").limit(1);
    store.count(&query).await.map(|_| ())
}

/// Fetch and sanitize the profile of `user_id`. `None` when no row exists.
pub async fn fetch(store: &dyn Store, user_id: &str) -> Result<Option<Profile>> {
    let query = Query::from(Collection::Profiles).eq("id", user_id).limit(1);
    let rows = store.select(&query).await?;
    let Some(row) = rows.into_iter().next() else {
        return Ok(None);
    };
    let raw: ProfileRow =
        serde_json::from_value(row).map_err(|e| StoreError::decode("profiles", e))?;
    Ok(Some(raw.sanitize(user_id)))
}

/// Team size: profiles whose `referred_by` is `referral_code`.
pub async fn team_size(store: &dyn Store, referral_code: &str) -> Result<u32> {
    if referral_code.is_empty() {
        return Ok(0);
    }
    let query = Query::from(Collection::Profiles)
        .select("id")
        .eq("referred_by", referral_code);
    store.count(&query).await.map(count_u32)
}

/// Active direct referrals, optionally restricted to those assigned to `pool`.
pub async fn active_referral_count(
    store: &dyn Store,
    referral_code: &str,
    pool: Option<u32>,
) -> Result<u32> {
    if referral_code.is_empty() {
        return Ok(0);
    }
    let mut query = Query::from(Collection::Profiles)
        .select("id")
        .eq("referred_by", referral_code)
        .eq("account_status", AccountStatus::Active.as_str());
    if let Some(pool) = pool {
        query = query.eq("assigned_pool_id", pool);
    }
    store.count(&query).await.map(count_u32)
}

/// Write a re-derived rank back to the profile.
pub async fn update_rank(store: &dyn Store, profile_id: &str, rank: Rank) -> Result<()> {
    let query = Query::from(Collection::Profiles).eq("id", profile_id);
    store.update(&query, &json!({ "rank": rank.as_str() })).await?;
    Ok(())
}

/// Set `activation_reward_claimed` if it is still unset.
///
/// The update is conditional on the flag being false, so only one claim can
/// ever match. Returns whether this call flipped it.
pub async fn mark_activation_reward_claimed(store: &dyn Store, profile_id: &str) -> Result<bool> {
    let query = Query::from(Collection::Profiles)
        .eq("id", profile_id)
        .eq("activation_reward_claimed", false);
    let updated = store
        .update(&query, &json!({ "activation_reward_claimed": true }))
        .await?;
    debug!(profile_id, claimed = !updated.is_empty(), "activation reward claim");
    Ok(!updated.is_empty())
}

/// Loosely-typed profile row as the remote returns it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileRow {
    id: Option<String>,
    username: Option<String>,
    email: Option<String>,
    referral_code: Option<String>,
    referred_by: Option<String>,
    rank: Option<String>,
    account_status: Option<String>,
    main_wallet_balance: Option<Value>,
    fund_wallet_balance: Option<Value>,
    current_pool: Option<Value>,
    assigned_pool_id: Option<Value>,
    total_direct_referrals: Option<Value>,
    active_direct_referrals: Option<Value>,
    activation_date: Option<String>,
    activation_reward_claimed: Option<bool>,
    first_reactivation_claimed: Option<bool>,
    cycle_completed_at: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl ProfileRow {
    fn sanitize(self, user_id: &str) -> Profile {
        Profile {
            id: non_empty(self.id).unwrap_or_else(|| user_id.to_string()),
            username: self.username.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            referral_code: self.referral_code.unwrap_or_default(),
            referred_by: non_empty(self.referred_by),
            rank: self
                .rank
                .and_then(|r| r.parse().ok())
                .unwrap_or_default(),
            account_status: self
                .account_status
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            main_wallet_balance: number(self.main_wallet_balance.as_ref()),
            fund_wallet_balance: number(self.fund_wallet_balance.as_ref()),
            current_pool: counter(self.current_pool.as_ref()),
            assigned_pool_id: self
                .assigned_pool_id
                .as_ref()
                .filter(|v| !v.is_null())
                .map(|v| counter(Some(v))),
            total_direct_referrals: counter(self.total_direct_referrals.as_ref()),
            active_direct_referrals: counter(self.active_direct_referrals.as_ref()),
            activation_date: timestamp(self.activation_date),
            activation_reward_claimed: self.activation_reward_claimed.unwrap_or(false),
            first_reactivation_claimed: self.first_reactivation_claimed.unwrap_or(false),
            cycle_completed_at: timestamp(self.cycle_completed_at),
            created_at: timestamp(self.created_at),
            updated_at: timestamp(self.updated_at),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Numeric cell that may arrive as a number or a numeric string (Postgres `numeric`).
fn number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite()).unwrap_or(0.0)
}

fn counter(value: Option<&Value>) -> u32 {
    let n = number(value);
    if n <= 0.0 {
        0
    } else if n >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        n.trunc() as u32
    }
}

fn timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn store_with(rows: Vec<Value>) -> MemoryStore {
        let store = MemoryStore::new();
        store.replace(Collection::Profiles, rows);
        store
    }

    #[tokio::test]
    async fn test_fetch_sanitizes_missing_fields() {
        let store = store_with(vec![json!({
            "id": "u1",
            "username": "ada",
            "rank": "Bronze",
            "account_status": null,
            "main_wallet_balance": "12.50",
            "current_pool": null,
        })]);
        let profile = fetch(&store, "u1").await.expect("fetch").expect("row");
        assert_eq!(profile.username, "ada");
        assert_eq!(profile.email, "");
        assert_eq!(profile.rank, Rank::Starter);
        assert_eq!(profile.account_status, AccountStatus::Inactive);
        assert!((profile.main_wallet_balance - 12.5).abs() < f64::EPSILON);
        assert_eq!(profile.current_pool, 0);
        assert_eq!(profile.assigned_pool_id, None);
        assert!(!profile.activation_reward_claimed);
    }

    #[tokio::test]
    async fn test_fetch_missing_row_is_none() {
        let store = store_with(vec![]);
        assert!(fetch(&store, "nobody").await.expect("fetch").is_none());
    }

    #[tokio::test]
    async fn test_referral_counts() {
        let store = store_with(vec![
            json!({"id": "a", "referred_by": "CODE", "account_status": "active", "assigned_pool_id": 1}),
            json!({"id": "b", "referred_by": "CODE", "account_status": "active", "assigned_pool_id": 2}),
            json!({"id": "c", "referred_by": "CODE", "account_status": "inactive"}),
            json!({"id": "d", "referred_by": "OTHER", "account_status": "active"}),
        ]);
        assert_eq!(team_size(&store, "CODE").await.expect("team"), 3);
        assert_eq!(
            active_referral_count(&store, "CODE", None).await.expect("active"),
            2
        );
        assert_eq!(
            active_referral_count(&store, "CODE", Some(2)).await.expect("pool"),
            1
        );
    }

    #[tokio::test]
    async fn test_empty_referral_code_issues_no_read() {
        let store = store_with(vec![json!({"id": "a", "referred_by": ""})]);
        assert_eq!(team_size(&store, "").await.expect("team"), 0);
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_activation_claim_is_one_shot() {
        let store = store_with(vec![json!({"id": "u1", "activation_reward_claimed": false})]);
        assert!(mark_activation_reward_claimed(&store, "u1").await.expect("first"));
        assert!(!mark_activation_reward_claimed(&store, "u1").await.expect("second"));
        assert_eq!(
            store.rows(Collection::Profiles)[0]["activation_reward_claimed"],
            json!(true)
        );
    }

    #[tokio::test]
    async fn test_update_rank_writes_label() {
        let store = store_with(vec![json!({"id": "u1", "rank": "Starter"})]);
        update_rank(&store, "u1", Rank::Diamond).await.expect("update");
        assert_eq!(store.rows(Collection::Profiles)[0]["rank"], "Diamond");
    }
}
