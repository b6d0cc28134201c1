//! Transaction history: peer transfers and fund-wallet entries, merged.

use chrono::{DateTime, Utc};
use refnet_store::queries::{ledger, transfers};
use refnet_store::Store;
use refnet_types::ledger::{FundWalletTransaction, P2pTransfer};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    TransferSent,
    TransferReceived,
    FundWallet,
}

/// One row of the merged history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub kind: HistoryKind,
    pub amount: f64,
    pub description: String,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn from_transfer(t: P2pTransfer, user_id: &str) -> Self {
        let sent = t.sender_id == user_id;
        let description = if sent {
            format!("Transfer to {}", t.receiver_username.as_deref().unwrap_or("user"))
        } else {
            format!("Transfer from {}", t.sender_username.as_deref().unwrap_or("user"))
        };
        Self {
            id: t.id,
            kind: if sent {
                HistoryKind::TransferSent
            } else {
                HistoryKind::TransferReceived
            },
            amount: t.amount,
            description,
            status: t.status,
            created_at: t.created_at,
        }
    }

    fn from_fund_wallet(t: FundWalletTransaction) -> Self {
        let description = t
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| t.transaction_type.replace('_', " "));
        Self {
            id: t.id,
            kind: HistoryKind::FundWallet,
            amount: t.amount,
            description,
            status: None,
            created_at: t.created_at,
        }
    }
}

/// Load both sources concurrently and merge them newest first.
///
/// One failing source is logged and skipped; if both fail the transfer
/// error is returned.
pub async fn load(
    store: &dyn Store,
    user_id: &str,
    limit: u32,
) -> refnet_store::Result<Vec<HistoryEntry>> {
    let (transfers, wallet) = tokio::join!(
        transfers::history(store, user_id, limit),
        ledger::fund_wallet_transactions(store, user_id, limit),
    );
    let mut entries = match (transfers, wallet) {
        (Err(e), Err(other)) => {
            warn!(user_id, error = %other, "fund wallet history failed");
            return Err(e);
        }
        (Ok(transfers), wallet) => {
            let mut entries: Vec<HistoryEntry> = transfers
                .into_iter()
                .map(|t| HistoryEntry::from_transfer(t, user_id))
                .collect();
            match wallet {
                Ok(rows) => entries.extend(rows.into_iter().map(HistoryEntry::from_fund_wallet)),
                Err(e) => warn!(user_id, error = %e, "fund wallet history failed"),
            }
            entries
        }
        (Err(e), Ok(rows)) => {
            warn!(user_id, error = %e, "transfer history failed");
            rows.into_iter().map(HistoryEntry::from_fund_wallet).collect()
        }
    };
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    entries.truncate(limit as usize);
    Ok(entries)
}
