//! # refnet-dashboard
//!
//! The Dashboard Aggregator and everything the dashboard screen does with
//! its output.
//!
//! ## Modules
//!
//! - [`rank`]: rank thresholds and the correcting write
//! - [`pool`]: pool countdown state machine
//! - [`stats`]: income windows and sums
//! - [`aggregator`]: concurrent reads joined into [`DashboardStats`](refnet_types::stats::DashboardStats)
//! - [`actions`]: pool resolution and activation-reward claim
//! - [`ticker`]: the one-second countdown task
//! - [`history`]: merged transaction history
//! - [`view`]: render-ready view model
//! - [`controller`]: route guard, banners and the in-flight guard

pub mod actions;
pub mod aggregator;
pub mod controller;
pub mod history;
pub mod pool;
pub mod rank;
pub mod stats;
pub mod ticker;
pub mod view;

pub use actions::{ActionError, ClaimOutcome};
pub use aggregator::{DashboardAggregator, DashboardLoad};
pub use controller::{Dashboard, DashboardConfig, DashboardError, LOGIN_ROUTE};
pub use pool::{PoolPhase, PoolTracker};
pub use rank::derive_rank;
pub use ticker::{CountdownTicker, TICK_PERIOD};
pub use view::DashboardView;
