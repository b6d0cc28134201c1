//! Peer-to-peer transfer history.

use refnet_types::ledger::P2pTransfer;
use serde_json::{json, Value};

use super::decode_rows;
use crate::{Result, Store, StoreError};

/// Remote procedure returning a user's transfers, newest first.
pub const GET_USER_TRANSFER_HISTORY: &str = "get_user_transfer_history";

/// Transfers sent or received by `user_id`, at most `limit` of them.
pub async fn history(store: &dyn Store, user_id: &str, limit: u32) -> Result<Vec<P2pTransfer>> {
    let out = store
        .call(
            GET_USER_TRANSFER_HISTORY,
            &json!({ "user_id_param": user_id, "limit_param": limit }),
        )
        .await?;
    match out {
        Value::Null => Ok(Vec::new()),
        Value::Array(rows) => decode_rows(GET_USER_TRANSFER_HISTORY, rows),
        other => Err(StoreError::decode(
            GET_USER_TRANSFER_HISTORY,
            format!("expected a row set, got {other}"),
        )),
    }
}
