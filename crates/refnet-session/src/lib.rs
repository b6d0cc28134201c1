//! # refnet-session
//!
//! Profile/Session State: who is signed in and their denormalized profile.
//!
//! ## Modules
//!
//! - [`auth`]: identity provider contract and session records
//! - [`gotrue`]: HTTP identity provider client
//! - [`memory`]: in-process identity provider for tests and offline runs
//! - [`manager`]: session lifecycle: restore, sign-in/out, refresh, profile fetch
//! - [`context`]: injected application state (theme, balance visibility)

pub mod auth;
pub mod context;
pub mod gotrue;
pub mod manager;
pub mod memory;

use refnet_db::DbError;
use refnet_store::StoreError;

pub use auth::{AuthApi, AuthSession, AuthUser};
pub use context::{AppContext, SharedDb};
pub use manager::{SessionManager, SessionSnapshot};

/// Seconds before expiry at which an access token is refreshed.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Error types for session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Network failure reaching the identity provider or the store.
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    /// Missing, unverified or rejected session.
    #[error("session error: {0}")]
    Session(String),

    /// The store rejected a profile read.
    #[error("query failed: {0}")]
    Query(String),

    /// Signed in, but no profile row exists.
    #[error("no profile found for user {0}")]
    NoProfile(String),

    /// An operation exceeded the client-side bound.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// Local database failure.
    #[error("local storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Whether this failure should block the app with a full-page error.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            Self::Connectivity(_) | Self::Timeout(_) | Self::Session(_) | Self::Storage(_)
        )
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connectivity { message } => Self::Connectivity(message),
            StoreError::Unauthorized { message } => Self::Session(message),
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<DbError> for SessionError {
    fn from(err: DbError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Convenience result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
