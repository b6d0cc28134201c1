//! Integration test: a full dashboard load.
//!
//! Seeds a member with referrals, bonuses, withdrawals, deposits and an
//! open pool, then checks every derived metric, the rank write-back,
//! balance masking and the merged transaction history.

use refnet_dashboard::history::HistoryKind;
use refnet_integration_tests::{World, REFERRAL_CODE, SITE_ORIGIN, USER_ID};
use refnet_store::queries::transfers::GET_USER_TRANSFER_HISTORY;
use refnet_store::{Collection, StoreError};
use refnet_types::profile::Rank;
use refnet_types::stats::PoolPhaseKind;
use refnet_types::MASKED_AMOUNT;
use serde_json::json;

fn seeded() -> World {
    let world = World::new();
    world.seed_member(json!({}));
    world.seed_referrals(2, "active", Some(1));
    world.seed_referrals(1, "active", Some(2));
    world.seed_referrals(1, "inactive", None);
    world.seed_pool(1, "2026-03-11T16:00:00Z", 120);

    world.seed_bonus("direct_referral", 5.0, "2026-03-11T09:00:00Z");
    world.seed_bonus("level", 3.0, "2026-03-10T09:00:00Z");
    world.seed_bonus("sponsor", 4.0, "2026-03-09T09:00:00Z");
    world.seed_bonus("level", 2.0, "2026-02-20T09:00:00Z");

    world.store.insert(
        Collection::Withdrawals,
        json!({"user_id": USER_ID, "amount": 4.0, "status": "completed"}),
    );
    world.store.insert(
        Collection::Withdrawals,
        json!({"user_id": USER_ID, "amount": 10.0, "status": "pending"}),
    );
    world.store.insert(
        Collection::Deposits,
        json!({"user_id": USER_ID, "amount": 21.0, "status": "confirmed"}),
    );
    world
}

#[tokio::test]
async fn full_dashboard_load() {
    let world = seeded();
    world.sign_in().await;

    let view = world.dashboard.refresh().await.expect("dashboard");
    let stats = &view.stats;

    // Income windows: Wednesday, week from Sunday the 8th.
    assert_eq!(stats.total_earnings, 14.0);
    assert_eq!(stats.today_income, 5.0);
    assert_eq!(stats.yesterday_income, 3.0);
    assert_eq!(stats.weekly_income, 12.0);
    assert_eq!(stats.monthly_income, 12.0);
    assert_eq!(stats.level_income, 5.0);
    assert_eq!(stats.sponsor_income, 4.0);
    assert_eq!(stats.total_withdrawals, 4.0, "pending withdrawals excluded");
    assert_eq!(stats.total_deposits, 21.0);

    // Referral counts.
    assert_eq!(stats.direct_referrals, 4);
    assert_eq!(stats.team_size, 4);
    assert_eq!(stats.active_direct_referrals, 3);
    assert_eq!(stats.active_referrals, 2, "only referrals in pool 1");
    assert_eq!(stats.pool_referral_progress_pct, 100.0);

    // Pool countdown.
    assert_eq!(stats.pool_time_remaining, "1h 0m 0s");
    assert_eq!(view.countdown.phase, PoolPhaseKind::CountingDown);
    assert_eq!(view.countdown.progress_pct, 50.0);
    assert_eq!(stats.next_pool_reward, 10.0);
    assert!(view.expired_hint.is_none());
    assert!(!view.can_resolve_pool);

    // Rank derived from three active referrals and written back.
    assert_eq!(stats.rank, Rank::Platinum);
    assert_eq!(view.rank_requirement, "2 direct referrals");
    let member = world
        .store
        .rows(Collection::Profiles)
        .into_iter()
        .find(|r| r["id"] == USER_ID)
        .expect("member row");
    assert_eq!(member["rank"], "Platinum");

    // Money and links.
    assert_eq!(view.money.main_wallet, "$12.50");
    assert_eq!(view.money.fund_wallet, "$30.00");
    assert_eq!(
        view.referral_link,
        format!("{SITE_ORIGIN}/register?ref={REFERRAL_CODE}")
    );
    assert!(!view.needs_activation);
    assert_eq!(view.activation_fee, "$21");
}

#[tokio::test]
async fn every_refresh_rereads_the_store() {
    let world = seeded();
    world.sign_in().await;

    world.dashboard.refresh().await.expect("first load");
    let reads = world.store.reads();
    world.seed_bonus("direct_referral", 6.0, "2026-03-11T14:00:00Z");

    let view = world.dashboard.refresh().await.expect("second load");
    assert!(world.store.reads() > reads);
    assert_eq!(view.stats.today_income, 11.0);

    // A stored rank that already matches is not rewritten.
    let writes = world.store.writes();
    world.dashboard.refresh().await.expect("third load");
    assert_eq!(world.store.writes(), writes);
}

#[tokio::test]
async fn failed_reads_degrade_single_metrics() {
    let world = seeded();
    world.sign_in().await;
    world.store.fail_collection(
        Collection::Deposits,
        StoreError::Query {
            status: 500,
            message: "deposits unavailable".to_string(),
        },
    );

    let view = world.dashboard.refresh().await.expect("dashboard");
    assert_eq!(view.stats.total_deposits, 0.0);
    assert_eq!(view.stats.total_earnings, 14.0);
    assert_eq!(
        world.dashboard.last_load().expect("load").degraded,
        vec!["deposits"]
    );
}

#[tokio::test]
async fn hidden_balances_are_masked() {
    let world = seeded();
    world.sign_in().await;

    assert!(!world.dashboard.toggle_balances().await.expect("toggle"));
    let view = world.dashboard.refresh().await.expect("dashboard");
    assert!(!view.show_balances);
    assert_eq!(view.money.main_wallet, MASKED_AMOUNT);
    assert_eq!(view.money.total_earnings, MASKED_AMOUNT);
    assert_eq!(view.money.next_pool_reward, "$10.00");
    // Raw numbers are still computed.
    assert_eq!(view.stats.total_earnings, 14.0);
}

#[tokio::test]
async fn transaction_history_merges_sources() {
    let world = seeded();
    world
        .store
        .register_procedure(GET_USER_TRANSFER_HISTORY, |_, args| {
            assert_eq!(args["user_id_param"], USER_ID);
            Ok(json!([
                {"id": "t1", "sender_id": USER_ID, "receiver_id": "u-bob", "amount": 3.0,
                 "receiver_username": "bob", "created_at": "2026-03-10T10:00:00Z"}
            ]))
        });
    world.store.insert(
        Collection::FundWalletTransactions,
        json!({"id": "f1", "user_id": USER_ID, "amount": 21.0, "transaction_type": "account_activation",
               "description": "Account activation", "created_at": "2026-03-11T08:00:00Z"}),
    );
    world.sign_in().await;

    let history = world
        .dashboard
        .transaction_history()
        .await
        .expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, HistoryKind::FundWallet);
    assert_eq!(history[0].description, "Account activation");
    assert_eq!(history[1].kind, HistoryKind::TransferSent);
    assert_eq!(history[1].description, "Transfer to bob");
}
