//! The `pool_progress` collection and the pool-resolution procedure.

use refnet_types::pool::{PoolProgress, PoolResolution, PoolStatus};
use serde_json::{json, Value};

use super::decode_rows;
use crate::query::{Collection, Query};
use crate::{Result, Store, StoreError};

/// Remote procedure that resolves an expired pool attempt.
pub const HANDLE_EXPIRED_POOL: &str = "handle_expired_pool";

/// Latest open (`active` or `expired_needs_referrals`) attempt of `user_id`.
pub async fn current(store: &dyn Store, user_id: &str) -> Result<Option<PoolProgress>> {
    let query = Query::from(Collection::PoolProgress)
        .eq("user_id", user_id)
        .is_in("status", PoolStatus::OPEN.map(PoolStatus::as_str))
        .order("created_at", false)
        .limit(1);
    let rows = store.select(&query).await?;
    Ok(decode_rows(Collection::PoolProgress.as_str(), rows)?
        .into_iter()
        .next())
}

/// Invoke `handle_expired_pool` for `user_id`.
///
/// The procedure may return a single object or a one-row set.
pub async fn resolve_expired(store: &dyn Store, user_id: &str) -> Result<PoolResolution> {
    let out = store
        .call(HANDLE_EXPIRED_POOL, &json!({ "user_id_param": user_id }))
        .await?;
    let out = match out {
        Value::Array(rows) => rows.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };
    if out.is_null() {
        return Err(StoreError::decode(HANDLE_EXPIRED_POOL, "empty result"));
    }
    serde_json::from_value(out).map_err(|e| StoreError::decode(HANDLE_EXPIRED_POOL, e))
}
