//! HTTP surface of the admin service: `POST /api/verify-email`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

use crate::api::AdminApi;
use crate::{AdminError, Result};

#[derive(Clone)]
struct AdminState {
    api: Arc<dyn AdminApi>,
}

#[derive(Debug, Deserialize)]
struct VerifyEmailBody {
    #[serde(default)]
    email: Option<Value>,
}

/// The address to look up. Absent and falsy values are a missing email;
/// any other non-string can never match an account.
fn requested_email(email: Option<Value>) -> Result<Option<String>> {
    match email {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err(AdminError::MissingEmail),
        Some(Value::String(s)) if s.is_empty() => Err(AdminError::MissingEmail),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Err(AdminError::MissingEmail),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Ok(None),
    }
}

pub fn build_router(api: Arc<dyn AdminApi>) -> Router {
    Router::new()
        .route("/api/verify-email", post(verify_email))
        .with_state(AdminState { api })
}

async fn verify_email(State(state): State<AdminState>, body: Bytes) -> Result<Json<Value>> {
    let body: VerifyEmailBody =
        serde_json::from_slice(&body).map_err(|e| AdminError::Internal(e.to_string()))?;
    let Some(email) = requested_email(body.email)? else {
        return Err(AdminError::UserNotFound);
    };

    let user = state
        .api
        .find_by_email(&email)
        .await
        .map_err(AdminError::Lookup)?
        .ok_or(AdminError::UserNotFound)?;

    if user.is_confirmed() {
        return Ok(Json(json!({ "verified": true })));
    }

    state
        .api
        .confirm_email(&user.id)
        .await
        .map_err(AdminError::Confirm)?;
    info!(user_id = %user.id, "email confirmed manually");
    Ok(Json(json!({ "verified": true, "manuallyVerified": true })))
}

/// A running admin listener.
pub struct AdminServer {
    pub address: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
}

impl AdminServer {
    /// Bind `addr` and serve the admin router until closed.
    pub async fn start(addr: SocketAddr, api: Arc<dyn AdminApi>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let address = listener.local_addr()?;
        let app = build_router(api);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "admin listener stopped");
            }
        });
        info!(%address, "admin listener started");

        Ok(Self {
            address,
            shutdown: Some(shutdown_tx),
            join,
        })
    }

    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "admin listener join failed");
        }
    }
}
