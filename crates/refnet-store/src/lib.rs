//! # refnet-store
//!
//! Data-access boundary to the remote structured-query service.
//!
//! Everything the client knows about the backend goes through the [`Store`]
//! trait: row reads and writes against named collections, head counts, and
//! remote procedure calls. Rows come back as JSON and are decoded into the
//! tagged records of `refnet-types` by the functions in [`queries`], so
//! malformed rows fail loudly at this boundary instead of leaking downstream.
//!
//! ## Modules
//!
//! - [`query`]: collections, filters and the query builder
//! - [`rest`]: HTTP implementation against a PostgREST-style endpoint
//! - [`memory`]: in-process implementation for tests and offline runs
//! - [`queries`]: typed reads, writes and procedure calls per collection

pub mod memory;
pub mod queries;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

pub use memory::MemoryStore;
pub use query::{Collection, Filter, FilterValue, Order, Query};
pub use rest::{RestStore, RestStoreConfig};

/// Default bound on every remote call, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 12;

/// Error types for remote store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Network failure or the call exceeded its time bound.
    #[error("connectivity failure: {message}")]
    Connectivity {
        /// Transport-level detail.
        message: String,
    },

    /// The remote rejected the caller's credentials.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Message returned by the remote.
        message: String,
    },

    /// The remote rejected a read or write.
    #[error("query rejected ({status}): {message}")]
    Query {
        /// HTTP status of the rejection (0 for in-process stores).
        status: u16,
        /// Message returned by the remote.
        message: String,
    },

    /// A row did not match the expected record shape.
    #[error("malformed {collection} row: {message}")]
    Decode {
        /// Collection or procedure the row came from.
        collection: String,
        /// Decoder detail.
        message: String,
    },

    /// The named remote procedure does not exist.
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),

    /// The store was configured with unusable settings.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    /// Whether the failure was a network problem or a timeout.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    pub(crate) fn decode(collection: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            collection: collection.into(),
            message: err.to_string(),
        }
    }
}

/// Convenience result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Fixed query/RPC contract of the remote store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read rows matching `query`.
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Count rows matching `query` without transferring them.
    async fn count(&self, query: &Query) -> Result<u64>;

    /// Merge `patch` into every row matching `query`, returning the updated rows.
    async fn update(&self, query: &Query, patch: &Value) -> Result<Vec<Value>>;

    /// Invoke a remote procedure with named arguments.
    async fn call(&self, procedure: &str, args: &Value) -> Result<Value>;

    /// Authenticate subsequent calls as a signed-in user, or fall back to
    /// anonymous access with `None`.
    fn set_access_token(&self, _token: Option<String>) {}
}
