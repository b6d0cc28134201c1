//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category.

pub mod dashboard;
pub mod events;
pub mod session;
pub mod settings;

use serde_json::Value;

use crate::rpc::RpcError;

type Result = std::result::Result<Value, RpcError>;

fn to_value<T: serde::Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}
