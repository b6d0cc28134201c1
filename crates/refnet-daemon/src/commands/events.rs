//! Event subscription handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use super::Result;
use crate::events::EventFilter;
use crate::rpc::{Connection, RpcError, RpcNotification};
use crate::DaemonState;

/// Start forwarding matching events to this connection.
pub fn subscribe_events(state: &Arc<DaemonState>, conn: &Connection, params: &Value) -> Result {
    let filter: EventFilter = match params.get("filter") {
        Some(filter) if !filter.is_null() => serde_json::from_value(filter.clone())
            .map_err(|e| RpcError::invalid_params(&e.to_string()))?,
        _ => EventFilter::default(),
    };

    let subscription_id = uuid::Uuid::new_v4().simple().to_string();
    let mut subscription = state
        .event_bus
        .subscription(subscription_id.clone(), filter);
    let outbound = conn.outbound();

    let task = tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            let notification = RpcNotification::event(
                json!({ "subscription_id": subscription.id, "event": event }),
            );
            let Ok(line) = serde_json::to_string(&notification) else {
                continue;
            };
            if outbound.send(line).await.is_err() {
                break;
            }
        }
        debug!(subscription = %subscription.id, "subscription ended");
    });
    conn.add_subscription(subscription_id.clone(), task);

    Ok(json!({ "subscription_id": subscription_id }))
}

pub fn unsubscribe_events(conn: &Connection, params: &Value) -> Result {
    let subscription_id = params
        .get("subscription_id")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params("subscription_id required"))?;

    Ok(json!({ "unsubscribed": conn.remove_subscription(subscription_id) }))
}
