//! JSON-RPC server over a Unix socket.
//!
//! One request per line, one response per line. Event subscriptions push
//! `event` notifications on the same connection.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use refnet_dashboard::{ActionError, DashboardError};
use refnet_session::SessionError;
use refnet_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::DaemonState;

/// Outbound lines buffered per connection.
const OUTBOUND_BUFFER: usize = 256;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RpcError {
    pub code: i32,
    /// Stable error name.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn new(code: i32, message: &str, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    // Standard JSON-RPC errors

    pub fn parse_error() -> Self {
        Self::new(-32700, "PARSE_ERROR", None)
    }

    pub fn invalid_request() -> Self {
        Self::new(-32600, "INVALID_REQUEST", None)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, "METHOD_NOT_FOUND", Some(json!({ "method": method })))
    }

    pub fn invalid_params(detail: &str) -> Self {
        Self::new(-32602, "INVALID_PARAMS", Some(json!({ "detail": detail })))
    }

    pub fn internal_error(detail: &str) -> Self {
        Self::new(-32603, "INTERNAL_ERROR", Some(json!({ "detail": detail })))
    }

    // Application errors

    /// No verified session. The UI navigates to `redirect`.
    pub fn session_required() -> Self {
        Self::new(
            -32010,
            "SESSION_REQUIRED",
            Some(json!({ "redirect": refnet_dashboard::LOGIN_ROUTE })),
        )
    }

    pub fn session_failed(detail: &str) -> Self {
        Self::new(-32011, "SESSION_FAILED", Some(json!({ "detail": detail })))
    }

    pub fn no_profile(detail: &str) -> Self {
        Self::new(-32012, "NO_PROFILE", Some(json!({ "detail": detail })))
    }

    pub fn connectivity(detail: &str) -> Self {
        Self::new(-32020, "CONNECTIVITY", Some(json!({ "detail": detail })))
    }

    pub fn timeout(detail: &str) -> Self {
        Self::new(-32021, "TIMEOUT", Some(json!({ "detail": detail })))
    }

    pub fn query_failed(detail: &str) -> Self {
        Self::new(-32030, "QUERY_FAILED", Some(json!({ "detail": detail })))
    }

    /// The remote declined the action; `message` is shown as-is.
    pub fn action_rejected(message: &str) -> Self {
        Self::new(-32040, "ACTION_REJECTED", Some(json!({ "message": message })))
    }

    pub fn action_pending() -> Self {
        Self::new(-32041, "ACTION_PENDING", None)
    }

    pub fn pool_not_expired() -> Self {
        Self::new(-32042, "POOL_NOT_EXPIRED", None)
    }

    pub fn settings_invalid(detail: &str) -> Self {
        Self::new(-32125, "SETTINGS_INVALID", Some(json!({ "detail": detail })))
    }
}

impl From<SessionError> for RpcError {
    fn from(err: SessionError) -> Self {
        let detail = err.to_string();
        match err {
            SessionError::Connectivity(_) => Self::connectivity(&detail),
            SessionError::Timeout(_) => Self::timeout(&detail),
            SessionError::Session(_) => Self::session_failed(&detail),
            SessionError::NoProfile(_) => Self::no_profile(&detail),
            SessionError::Query(_) => Self::query_failed(&detail),
            SessionError::Storage(_) => Self::internal_error(&detail),
        }
    }
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        let detail = err.to_string();
        match err {
            StoreError::Connectivity { .. } => Self::connectivity(&detail),
            StoreError::Unauthorized { .. } => Self::session_failed(&detail),
            _ => Self::query_failed(&detail),
        }
    }
}

impl From<ActionError> for RpcError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::NotExpired => Self::pool_not_expired(),
            ActionError::AlreadyPending => Self::action_pending(),
            ActionError::Rejected(message) => Self::action_rejected(&message),
            ActionError::Remote(e) => e.into(),
        }
    }
}

impl From<DashboardError> for RpcError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::SessionRequired { .. } => Self::session_required(),
            DashboardError::Session(e) => e.into(),
            DashboardError::Action(e) => e.into(),
            DashboardError::Store(e) => e.into(),
        }
    }
}

/// JSON-RPC notification pushed to subscribers.
#[derive(Debug, Serialize)]
pub struct RpcNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl RpcNotification {
    pub fn event(params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method: "event",
            params,
        }
    }
}

/// Per-connection state: the outbound line queue and live subscriptions.
pub struct Connection {
    outbound: mpsc::Sender<String>,
    subscriptions: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl Connection {
    fn new(outbound: mpsc::Sender<String>) -> Self {
        Self {
            outbound,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn outbound(&self) -> mpsc::Sender<String> {
        self.outbound.clone()
    }

    fn subscriptions(&self) -> MutexGuard<'_, Vec<(String, JoinHandle<()>)>> {
        match self.subscriptions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_subscription(&self, id: String, task: JoinHandle<()>) {
        self.subscriptions().push((id, task));
    }

    /// Stop one subscription. Returns whether it existed.
    pub fn remove_subscription(&self, id: &str) -> bool {
        let mut subscriptions = self.subscriptions();
        match subscriptions.iter().position(|(sid, _)| sid == id) {
            Some(index) => {
                let (_, task) = subscriptions.remove(index);
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for (_, task) in self.subscriptions().drain(..) {
            task.abort();
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = ?self.socket_path, "IPC server listening");

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!(error = %e, "connection error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

/// Serve one client until EOF.
pub async fn handle_connection<S>(state: Arc<DaemonState>, stream: S) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let writer_task = tokio::spawn(async move {
        while let Some(mut line) = outbound_rx.recv().await {
            line.push('\n');
            if writer.write_all(line.as_bytes()).await.is_err() || writer.flush().await.is_err()
            {
                break;
            }
        }
    });

    let conn = Connection::new(outbound_tx.clone());
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.jsonrpc != "2.0" => {
                RpcResponse::error(request.id, RpcError::invalid_request())
            }
            Ok(request) => dispatch_request(&state, &conn, request).await,
            Err(_) => RpcResponse::error(Value::Null, RpcError::parse_error()),
        };

        if outbound_tx.send(serde_json::to_string(&response)?).await.is_err() {
            break;
        }
    }

    drop(conn);
    drop(outbound_tx);
    let _ = writer_task.await;
    Ok(())
}

/// Methods callable without a verified session.
fn is_public(method: &str) -> bool {
    matches!(
        method,
        "get_session" | "sign_in" | "get_theme" | "set_theme" | "toggle_theme"
    )
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(
    state: &Arc<DaemonState>,
    conn: &Connection,
    request: RpcRequest,
) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!(method, "dispatching RPC method");

    if !is_public(method) && !state.session.is_authenticated() {
        return RpcResponse::error(id, RpcError::session_required());
    }

    let result = match method {
        // Session
        "get_session" => commands::session::get_session(state).await,
        "sign_in" => commands::session::sign_in(state, params).await,
        "sign_out" => commands::session::sign_out(state).await,
        "refetch_profile" => commands::session::refetch_profile(state).await,

        // Dashboard
        "get_dashboard" => commands::dashboard::get_dashboard(state).await,
        "refresh_dashboard" => commands::dashboard::refresh_dashboard(state).await,
        "get_pool_countdown" => commands::dashboard::get_pool_countdown(state).await,
        "resolve_expired_pool" => commands::dashboard::resolve_expired_pool(state).await,
        "claim_activation_reward" => commands::dashboard::claim_activation_reward(state).await,
        "dismiss_notice" => commands::dashboard::dismiss_notice(state).await,
        "toggle_balances" => commands::dashboard::toggle_balances(state).await,
        "get_referral_link" => commands::dashboard::get_referral_link(state).await,
        "get_transaction_history" => commands::dashboard::get_transaction_history(state).await,

        // Settings
        "get_theme" => commands::settings::get_theme(state).await,
        "set_theme" => commands::settings::set_theme(state, params).await,
        "toggle_theme" => commands::settings::toggle_theme(state).await,

        // Event subscription
        "subscribe_events" => commands::events::subscribe_events(state, conn, params),
        "unsubscribe_events" => commands::events::unsubscribe_events(conn, params),

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
