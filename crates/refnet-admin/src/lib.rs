//! Administrative email verification.
//!
//! Serves `POST /api/verify-email`: looks a user up by email with the
//! service-role key and confirms the address when it is not yet confirmed.

pub mod api;
pub mod router;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub use api::{AdminApi, AdminUser, ApiError, GoTrueAdmin, MemoryAdmin};
pub use router::{build_router, AdminServer};

/// Failures of the verify-email endpoint.
///
/// The display text is the message returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Email is required")]
    MissingEmail,

    #[error("Failed to verify email status")]
    Lookup(#[source] ApiError),

    #[error("User not found")]
    UserNotFound,

    #[error("Failed to verify email")]
    Confirm(#[source] ApiError),

    #[error("Internal server error")]
    Internal(String),
}

impl AdminError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingEmail => StatusCode::BAD_REQUEST,
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::Lookup(_) | Self::Confirm(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match &self {
            Self::Lookup(e) => tracing::error!(error = %e, "user lookup failed"),
            Self::Confirm(e) => tracing::error!(error = %e, "email confirmation failed"),
            Self::Internal(detail) => tracing::error!(%detail, "verify-email failed"),
            Self::MissingEmail | Self::UserNotFound => {}
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AdminError>;
