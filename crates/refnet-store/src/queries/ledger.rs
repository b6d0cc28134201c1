//! Ledger collections: bonuses, withdrawals, deposits and fund-wallet entries.

use refnet_types::ledger::{Deposit, FundWalletTransaction, ReferralBonus, Withdrawal};

use super::decode_rows;
use crate::query::{Collection, Query};
use crate::{Result, Store};

/// Completed referral bonuses credited to `user_id`.
pub async fn completed_bonuses(store: &dyn Store, user_id: &str) -> Result<Vec<ReferralBonus>> {
    let query = Query::from(Collection::ReferralBonuses)
        .select("bonus_type,amount,status,created_at")
        .eq("user_id", user_id)
        .eq("status", "completed");
    decode_rows(
        Collection::ReferralBonuses.as_str(),
        store.select(&query).await?,
    )
}

/// Completed withdrawals of `user_id`.
pub async fn completed_withdrawals(store: &dyn Store, user_id: &str) -> Result<Vec<Withdrawal>> {
    let query = Query::from(Collection::Withdrawals)
        .select("amount,status")
        .eq("user_id", user_id)
        .eq("status", "completed");
    decode_rows(Collection::Withdrawals.as_str(), store.select(&query).await?)
}

/// Confirmed deposits of `user_id`.
pub async fn confirmed_deposits(store: &dyn Store, user_id: &str) -> Result<Vec<Deposit>> {
    let query = Query::from(Collection::Deposits)
        .select("amount,status")
        .eq("user_id", user_id)
        .eq("status", "confirmed");
    decode_rows(Collection::Deposits.as_str(), store.select(&query).await?)
}

/// Most recent fund-wallet entries of `user_id`, newest first.
pub async fn fund_wallet_transactions(
    store: &dyn Store,
    user_id: &str,
    limit: u32,
) -> Result<Vec<FundWalletTransaction>> {
    let query = Query::from(Collection::FundWalletTransactions)
        .eq("user_id", user_id)
        .order("created_at", false)
        .limit(limit);
    decode_rows(
        Collection::FundWalletTransactions.as_str(),
        store.select(&query).await?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use refnet_types::ledger::{BonusType, DepositStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_only_settled_rows_are_read() {
        let store = MemoryStore::new();
        store.replace(
            Collection::ReferralBonuses,
            vec![
                json!({"user_id": "u1", "bonus_type": "level", "amount": 4.0, "status": "completed", "created_at": "2026-03-01T00:00:00Z"}),
                json!({"user_id": "u1", "bonus_type": "level", "amount": 9.0, "status": "pending", "created_at": "2026-03-01T00:00:00Z"}),
                json!({"user_id": "u1", "bonus_type": "mystery", "amount": 1.0, "status": "completed", "created_at": "2026-03-02T00:00:00Z"}),
            ],
        );
        store.replace(
            Collection::Deposits,
            vec![
                json!({"user_id": "u1", "amount": 21.0, "status": "confirmed"}),
                json!({"user_id": "u1", "amount": 50.0, "status": "failed"}),
            ],
        );

        let bonuses = completed_bonuses(&store, "u1").await.expect("bonuses");
        assert_eq!(bonuses.len(), 2);
        assert_eq!(bonuses[0].bonus_type, BonusType::Level);
        assert_eq!(bonuses[1].bonus_type, BonusType::Other);

        let deposits = confirmed_deposits(&store, "u1").await.expect("deposits");
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].status, DepositStatus::Confirmed);

        assert!(completed_withdrawals(&store, "u1")
            .await
            .expect("withdrawals")
            .is_empty());
    }

    #[tokio::test]
    async fn test_fund_wallet_transactions_newest_first() {
        let store = MemoryStore::new();
        for (id, at) in [("t1", "2026-03-01T00:00:00Z"), ("t2", "2026-03-03T00:00:00Z"), ("t3", "2026-03-02T00:00:00Z")] {
            store.insert(
                Collection::FundWalletTransactions,
                json!({"id": id, "user_id": "u1", "amount": 1.0, "transaction_type": "deposit", "created_at": at}),
            );
        }
        let txs = fund_wallet_transactions(&store, "u1", 2).await.expect("txs");
        let ids: Vec<&str> = txs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3"]);
    }
}
