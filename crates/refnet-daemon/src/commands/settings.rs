//! Theme command handlers. Available without a session.

use std::sync::Arc;

use refnet_types::settings::Theme;
use serde_json::{json, Value};

use super::Result;
use crate::rpc::RpcError;
use crate::DaemonState;

pub async fn get_theme(state: &Arc<DaemonState>) -> Result {
    let theme = state.context.theme().await?;
    Ok(json!({ "theme": theme }))
}

pub async fn set_theme(state: &Arc<DaemonState>, params: &Value) -> Result {
    let theme: Theme = params
        .get("theme")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params("theme required"))?
        .parse()
        .map_err(|e: refnet_types::ParseLabelError| RpcError::settings_invalid(&e.to_string()))?;
    let theme = state.context.set_theme(theme).await?;
    Ok(json!({ "theme": theme }))
}

pub async fn toggle_theme(state: &Arc<DaemonState>) -> Result {
    let theme = state.context.toggle_theme().await?;
    Ok(json!({ "theme": theme }))
}
