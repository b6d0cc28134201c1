//! refnet-daemon: the local referral dashboard daemon.
//!
//! Single OS process running a Tokio async runtime. The UI talks to the
//! daemon via JSON-RPC over a Unix socket and receives pushed events.

mod bridge;
mod commands;
mod config;
mod events;
mod rpc;

use std::sync::Arc;

use refnet_admin::{AdminServer, GoTrueAdmin};
use refnet_dashboard::{Dashboard, DashboardConfig};
use refnet_session::gotrue::GoTrueClient;
use refnet_session::{AppContext, AuthApi, SessionManager, SharedDb};
use refnet_store::{RestStore, RestStoreConfig, Store};
use refnet_types::clock::{Clock, SystemClock};
use refnet_types::events::EventType;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::rpc::RpcServer;

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Theme and balance-visibility preferences.
    pub context: AppContext,
    pub session: Arc<SessionManager>,
    pub dashboard: Arc<Dashboard>,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
}

impl DaemonState {
    pub fn new(
        config: &DaemonConfig,
        db: SharedDb,
        auth: Arc<dyn AuthApi>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(
            auth,
            store.clone(),
            db.clone(),
            clock.clone(),
            config.timeout(),
        ));
        let context = AppContext::new(db);
        let dashboard = Arc::new(Dashboard::new(
            session.clone(),
            store,
            clock.clone(),
            context.clone(),
            DashboardConfig {
                site_origin: config.app.site_origin.clone(),
                history_limit: config.app.transfer_history_limit,
            },
        ));
        Self {
            event_bus: EventBus::new(clock),
            context,
            session,
            dashboard,
        }
    }

    pub fn emit(&self, event_type: EventType, payload: Value) {
        self.event_bus.emit(event_type, payload);
    }
}

fn init_tracing(config: &DaemonConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("refnet={}", config.advanced.log_level).parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.advanced.log_file.is_empty() {
        builder.init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.advanced.log_file)?;
        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }
    Ok(())
}

/// Resolves on SIGTERM, or never if the handler cannot be installed.
async fn terminated() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config and start logging
    let config = DaemonConfig::load()?;
    init_tracing(&config)?;
    config.validate()?;
    info!("refnet daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open the local database
    let conn = refnet_db::open(&data_dir.join("refnet.db"))?;
    let db: SharedDb = Arc::new(tokio::sync::Mutex::new(conn));

    // 3. Remote collaborators
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.zone()?));
    let store = RestStore::new(RestStoreConfig {
        base_url: config.backend.url.clone(),
        anon_key: config.backend.anon_key.clone(),
        timeout: config.timeout(),
    })?;
    let auth = GoTrueClient::new(
        &config.backend.url,
        config.backend.anon_key.clone(),
        config.timeout(),
        clock.clone(),
    )?;

    // 4. Build daemon state
    let state = Arc::new(DaemonState::new(
        &config,
        db,
        Arc::new(auth),
        Arc::new(store),
        clock,
    ));

    // 5. Forward session and countdown changes to the bus
    let bridge = tokio::spawn(bridge::run(state.clone()));

    // 6. Restore any persisted session
    if let Err(e) = state.session.initialize().await {
        warn!(error = %e, "session restore failed");
    }

    // 7. Optional admin listener
    let admin = if config.admin_enabled() {
        let key = config.backend.service_role_key.clone().unwrap_or_default();
        let api = GoTrueAdmin::new(&config.backend.url, key, config.timeout())?;
        Some(AdminServer::start(config.admin_addr()?, Arc::new(api)).await?)
    } else {
        None
    };

    // 8. Start IPC server
    let socket_path = data_dir.join("daemon.sock");
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    state.emit(
        EventType::DaemonStatus,
        json!({ "status": "started", "version": env!("CARGO_PKG_VERSION") }),
    );

    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "RPC server error");
            }
        }
        _ = terminated() => {
            info!("SIGTERM received, shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!("daemon shutting down");
    bridge.abort();
    if let Some(admin) = admin {
        admin.close().await;
    }
    let _ = std::fs::remove_file(&socket_path);

    info!("daemon stopped");
    Ok(())
}
