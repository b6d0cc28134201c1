//! Turns session and countdown changes into bus events.
//!
//! The countdown ticker runs only while a verified session exists and is
//! dropped (and so cancelled) on sign-out. Dashboard state is reset on
//! sign-out and whenever a different user signs in.

use std::sync::Arc;

use refnet_dashboard::{CountdownTicker, TICK_PERIOD};
use refnet_session::SessionSnapshot;
use refnet_types::events::EventType;
use refnet_types::stats::{PoolCountdown, PoolPhaseKind};
use serde_json::json;
use tokio::sync::watch;
use tracing::debug;

use crate::DaemonState;

enum Wake {
    Session,
    Tick,
    TickerStopped,
    Closed,
}

/// Payload of a `SessionChanged` event.
fn session_payload(snapshot: &SessionSnapshot) -> serde_json::Value {
    json!({
        "authenticated": snapshot.is_authenticated(),
        "user_id": snapshot.user.as_ref().map(|u| u.id.clone()),
        "error": snapshot.error,
    })
}

/// Whether a tick crossed from counting down to expired.
fn crossed_expiry(previous: PoolPhaseKind, current: &PoolCountdown) -> bool {
    previous == PoolPhaseKind::CountingDown && current.phase == PoolPhaseKind::ExpiredUnresolved
}

pub async fn run(state: Arc<DaemonState>) {
    let mut session_rx = state.session.subscribe();
    let mut ticker: Option<(CountdownTicker, watch::Receiver<PoolCountdown>)> = None;
    let mut last_phase = PoolPhaseKind::NoPool;
    let mut authenticated = false;
    let mut current_user: Option<String> = None;

    loop {
        let wake = {
            let tick = async {
                match ticker.as_mut() {
                    Some((_, rx)) => rx.changed().await.is_ok(),
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_ok() { Wake::Session } else { Wake::Closed }
                }
                alive = tick => {
                    if alive { Wake::Tick } else { Wake::TickerStopped }
                }
            }
        };

        match wake {
            Wake::Closed => break,
            Wake::TickerStopped => ticker = None,
            Wake::Session => {
                let snapshot = session_rx.borrow_and_update().clone();
                let now_authenticated = snapshot.is_authenticated();
                let user_id = snapshot.user.as_ref().map(|u| u.id.clone());
                if now_authenticated && ticker.is_none() {
                    let spawned = state.dashboard.spawn_ticker(TICK_PERIOD);
                    let rx = spawned.subscribe();
                    ticker = Some((spawned, rx));
                    debug!("countdown ticker started");
                } else if !now_authenticated && authenticated {
                    ticker = None;
                    state.dashboard.reset();
                    last_phase = PoolPhaseKind::NoPool;
                    debug!("countdown ticker stopped");
                } else if now_authenticated && authenticated && user_id != current_user {
                    state.dashboard.reset();
                    last_phase = PoolPhaseKind::NoPool;
                    debug!("signed-in user changed");
                }
                authenticated = now_authenticated;
                current_user = user_id;
                state.emit(EventType::SessionChanged, session_payload(&snapshot));
            }
            Wake::Tick => {
                let Some((_, rx)) = ticker.as_mut() else {
                    continue;
                };
                let countdown = rx.borrow_and_update().clone();
                if crossed_expiry(last_phase, &countdown) {
                    state.emit(EventType::PoolExpired, json!({}));
                }
                last_phase = countdown.phase;
                if countdown.phase == PoolPhaseKind::CountingDown {
                    state.emit(
                        EventType::PoolCountdownTick,
                        serde_json::to_value(&countdown).unwrap_or_default(),
                    );
                }
            }
        }
    }
}
