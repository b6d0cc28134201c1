//! Dashboard command handlers.

use std::sync::Arc;

use refnet_dashboard::{ActionError, ClaimOutcome, DashboardError};
use refnet_types::events::EventType;
use serde_json::json;

use super::{to_value, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Report a failed user action on the bus, then hand back the RPC error.
fn action_failed(state: &DaemonState, action: &str, err: DashboardError) -> RpcError {
    if let DashboardError::Action(ref inner) = err {
        if !matches!(inner, ActionError::AlreadyPending) {
            state.emit(
                EventType::ErrorOccurred,
                json!({ "action": action, "message": inner.to_string() }),
            );
        }
    }
    err.into()
}

pub async fn get_dashboard(state: &Arc<DaemonState>) -> Result {
    let had_load = state.dashboard.last_load().is_some();
    let view = state.dashboard.view().await?;
    if !had_load {
        announce_refresh(state);
    }
    to_value(&view)
}

pub async fn refresh_dashboard(state: &Arc<DaemonState>) -> Result {
    let view = state.dashboard.refresh().await?;
    announce_refresh(state);
    to_value(&view)
}

fn announce_refresh(state: &DaemonState) {
    let Some(load) = state.dashboard.last_load() else {
        return;
    };
    if let Some(update) = load.rank_update.filter(|u| u.written) {
        state.emit(
            EventType::RankChanged,
            json!({ "previous": update.previous, "rank": update.derived }),
        );
    }
    state.emit(
        EventType::DashboardRefreshed,
        json!({ "degraded": load.degraded }),
    );
}

pub async fn get_pool_countdown(state: &Arc<DaemonState>) -> Result {
    to_value(&state.dashboard.countdown()?)
}

pub async fn resolve_expired_pool(state: &Arc<DaemonState>) -> Result {
    match state.dashboard.resolve_expired_pool().await {
        Ok(message) => {
            state.emit(EventType::PoolResolved, json!({ "message": message }));
            announce_refresh(state);
            Ok(json!({ "success": true, "message": message }))
        }
        Err(err) => Err(action_failed(state, "resolve_expired_pool", err)),
    }
}

pub async fn claim_activation_reward(state: &Arc<DaemonState>) -> Result {
    match state.dashboard.claim_activation_reward().await {
        Ok(outcome) => {
            let claimed = outcome == ClaimOutcome::Claimed;
            if claimed {
                state.emit(EventType::ActivationRewardClaimed, json!({}));
            }
            Ok(json!({ "claimed": claimed }))
        }
        Err(err) => Err(action_failed(state, "claim_activation_reward", err)),
    }
}

pub async fn dismiss_notice(state: &Arc<DaemonState>) -> Result {
    state.dashboard.dismiss_notice();
    Ok(json!({ "dismissed": true }))
}

pub async fn toggle_balances(state: &Arc<DaemonState>) -> Result {
    let show = state.dashboard.toggle_balances().await?;
    Ok(json!({ "show_balances": show }))
}

pub async fn get_referral_link(state: &Arc<DaemonState>) -> Result {
    Ok(json!({ "link": state.dashboard.referral_link()? }))
}

pub async fn get_transaction_history(state: &Arc<DaemonState>) -> Result {
    to_value(&state.dashboard.transaction_history().await?)
}
