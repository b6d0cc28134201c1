//! # refnet-types
//!
//! Shared domain records used across the refnet workspace.
//!
//! Every row read from the remote store is decoded into one of these tagged
//! records at the data-access boundary. Nothing downstream touches loosely
//! typed JSON.

pub mod clock;
pub mod events;
pub mod ledger;
pub mod pool;
pub mod profile;
pub mod settings;
pub mod stats;

/// Identifier of an authenticated user (the `profiles.id` primary key).
pub type UserId = String;

/// Activation fee shown on the activation prompt, in USD.
pub const ACTIVATION_FEE_USD: u32 = 21;

/// Placeholder rendered instead of money values while balances are hidden.
pub const MASKED_AMOUNT: &str = "••••";

/// Error returned when a stored enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseLabelError {
    /// Which enumeration failed to parse.
    pub kind: &'static str,
    /// The offending raw value.
    pub value: String,
}

impl ParseLabelError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Format a money amount the way the dashboard shows it (`$12.50`).
pub fn format_usd(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Format a money amount, or the mask when balances are hidden.
pub fn format_usd_masked(amount: f64, show: bool) -> String {
    if show {
        format_usd(amount)
    } else {
        MASKED_AMOUNT.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(12.5), "$12.50");
        assert_eq!(format_usd_masked(12.5, false), MASKED_AMOUNT);
    }

    #[test]
    #[ignore] // Run manually to generate bindings
    fn export_ts_bindings() {
        use ts_rs::TS;
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../bindings");
        std::fs::create_dir_all(&dir).expect("bindings dir");
        crate::stats::DashboardStats::export_all_to(&dir).expect("export stats");
        crate::stats::PoolCountdown::export_all_to(&dir).expect("export countdown");
        crate::stats::Notice::export_all_to(&dir).expect("export notice");
        crate::profile::Profile::export_all_to(&dir).expect("export profile");
        crate::events::Event::export_all_to(&dir).expect("export event");
        crate::settings::Theme::export_all_to(&dir).expect("export theme");
    }
}
