//! One-second countdown ticker.
//!
//! Re-evaluates the shared [`PoolTracker`] against the clock once per period
//! and publishes the countdown on a watch channel. The task lives exactly
//! as long as the [`CountdownTicker`] handle: dropping it aborts the task.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use refnet_types::clock::Clock;
use refnet_types::stats::PoolCountdown;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::pool::PoolTracker;

/// Default re-evaluation period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Pool tracker shared between the controller and the ticker.
pub type SharedTracker = Arc<Mutex<PoolTracker>>;

pub(crate) fn lock_tracker(tracker: &SharedTracker) -> MutexGuard<'_, PoolTracker> {
    match tracker.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Handle to the running ticker task.
pub struct CountdownTicker {
    handle: JoinHandle<()>,
    rx: watch::Receiver<PoolCountdown>,
}

impl CountdownTicker {
    /// Start ticking. Must be called inside a tokio runtime.
    pub fn spawn(tracker: SharedTracker, clock: Arc<dyn Clock>, period: Duration) -> Self {
        let initial = lock_tracker(&tracker).countdown(clock.now_utc());
        let (tx, rx) = watch::channel(initial);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = clock.now_utc();
                let (crossed, view) = {
                    let mut tracker = lock_tracker(&tracker);
                    let crossed = tracker.tick(now);
                    (crossed, tracker.countdown(now))
                };
                if crossed {
                    info!("pool deadline passed");
                }
                tx.send_if_modified(|current| {
                    if *current == view {
                        false
                    } else {
                        *current = view;
                        true
                    }
                });
                if tx.is_closed() {
                    debug!("no countdown subscribers left, stopping ticker");
                    break;
                }
            }
        });
        Self { handle, rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<PoolCountdown> {
        self.rx.clone()
    }

    /// Latest published countdown.
    pub fn current(&self) -> PoolCountdown {
        self.rx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
