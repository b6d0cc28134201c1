//! Session command handlers.

use std::sync::Arc;

use refnet_types::events::EventType;
use serde_json::{json, Value};

use super::{to_value, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

pub async fn get_session(state: &Arc<DaemonState>) -> Result {
    to_value(&state.session.snapshot())
}

pub async fn sign_in(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = params
        .get("email")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RpcError::invalid_params("email required"))?;
    let password = params
        .get("password")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params("password required"))?;

    let snapshot = state.session.sign_in(email, password).await?;
    to_value(&snapshot)
}

pub async fn sign_out(state: &Arc<DaemonState>) -> Result {
    state.session.sign_out().await?;
    state.dashboard.reset();
    Ok(json!({ "signed_out": true }))
}

pub async fn refetch_profile(state: &Arc<DaemonState>) -> Result {
    let profile = state.session.refetch_profile().await?;
    state.emit(EventType::ProfileRefreshed, json!({ "profile_id": profile.id }));
    to_value(&profile)
}
