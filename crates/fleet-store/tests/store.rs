//! Integration tests against a throwaway in-memory SQLite database.

use alloy::primitives::{Address, U256};
use fleet_core::domain::{OperationPayload, OperationStatus, OperationType, StrategyMode, WalletType};
use fleet_store::ports::{
    ClusterStore, LedgerStore, OperationStore, PositionStore, SwingConfigStore, SwingConfigUpdate,
    WalletStore,
};
use fleet_store::SqliteStore;
use sqlx::sqlite::SqlitePoolOptions;

async fn test_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    let store = SqliteStore::new(pool);
    store.run_migrations().await.expect("run migrations");
    store
}

#[tokio::test]
async fn wallet_name_collision_is_rejected() {
    let store = test_store().await;
    store
        .create_wallet(
            "alpha-01",
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            "provider-1",
            WalletType::Smart,
            false,
        )
        .await
        .expect("first wallet");

    let err = store
        .create_wallet(
            "alpha-01",
            Address::repeat_byte(3),
            Address::repeat_byte(4),
            "provider-2",
            WalletType::Smart,
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, fleet_store::StoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn only_one_wallet_may_be_master() {
    let store = test_store().await;
    store
        .create_wallet(
            "master-1",
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            "provider-master-1",
            WalletType::Smart,
            true,
        )
        .await
        .expect("first master");

    let err = store
        .create_wallet(
            "master-2",
            Address::repeat_byte(3),
            Address::repeat_byte(4),
            "provider-master-2",
            WalletType::Smart,
            true,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, fleet_store::StoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn master_wallet_cannot_join_a_cluster() {
    let store = test_store().await;
    let master = store
        .create_wallet(
            "master",
            Address::repeat_byte(9),
            Address::repeat_byte(8),
            "provider-master",
            WalletType::Smart,
            true,
        )
        .await
        .expect("create master");
    let cluster = store
        .create_cluster("alpha", StrategyMode::Sync)
        .await
        .expect("create cluster");

    let err = store
        .set_cluster_wallets(cluster.id, &[master.id])
        .await
        .unwrap_err();
    assert!(matches!(err, fleet_store::StoreError::StateConflict(_)));
}

#[tokio::test]
async fn cluster_membership_preserves_dispatch_order() {
    let store = test_store().await;
    let cluster = store
        .create_cluster("alpha", StrategyMode::Staggered)
        .await
        .expect("create cluster");

    let mut ids = Vec::new();
    for i in 0..3u8 {
        let wallet = store
            .create_wallet(
                &format!("alpha-{i}"),
                Address::repeat_byte(10 + i),
                Address::repeat_byte(20 + i),
                &format!("provider-{i}"),
                WalletType::Smart,
                false,
            )
            .await
            .expect("create wallet");
        ids.push(wallet.id);
    }
    // Reverse the expected dispatch order to prove `position` is respected,
    // not insertion order.
    let ordered: Vec<i64> = ids.iter().rev().copied().collect();
    store
        .set_cluster_wallets(cluster.id, &ordered)
        .await
        .expect("set cluster wallets");

    let members = store
        .list_cluster_wallet_details(cluster.id)
        .await
        .expect("list members");
    let member_ids: Vec<i64> = members.iter().map(|w| w.id).collect();
    assert_eq!(member_ids, ordered);
}

#[tokio::test]
async fn operation_lattice_rejects_out_of_order_transition() {
    let store = test_store().await;
    let cluster = store
        .create_cluster("alpha", StrategyMode::Sync)
        .await
        .expect("create cluster");
    let operation = store
        .create_operation(
            OperationType::FundingRequest,
            cluster.id,
            "test-harness",
            OperationPayload::FundingRequest {
                cluster_id: cluster.id,
                amount_wei: U256::from(1_000_000u64),
            },
        )
        .await
        .expect("create operation");
    assert_eq!(operation.status, OperationStatus::Pending);

    let err = store
        .update_operation_status(operation.id, OperationStatus::Executing, None)
        .await
        .unwrap_err();
    assert!(matches!(err, fleet_store::StoreError::StateConflict(_)));

    let approved = store
        .set_operation_approved(operation.id, "approver")
        .await
        .expect("approve");
    assert_eq!(approved.status, OperationStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("approver"));
}

#[tokio::test]
async fn approved_operation_can_fail_without_executing() {
    let store = test_store().await;
    let cluster = store.create_cluster("alpha", StrategyMode::Sync).await.unwrap();
    let operation = store
        .create_operation(
            OperationType::FundingRequest,
            cluster.id,
            "test-harness",
            OperationPayload::FundingRequest {
                cluster_id: cluster.id,
                amount_wei: U256::from(1u64),
            },
        )
        .await
        .unwrap();
    store.set_operation_approved(operation.id, "approver").await.expect("approve");

    // The execution engine's boundary re-check can reject an already-approved
    // operation before it ever reaches `executing` (e.g. the kill switch
    // flips between approval and execution).
    let failed = store
        .set_operation_result(operation.id, OperationStatus::Failed, serde_json::json!({"items": []}), Some("POLICY_REJECT: kill switch engaged"))
        .await
        .expect("approved operations may fail directly");
    assert_eq!(failed.status, OperationStatus::Failed);
    assert!(failed.status.is_terminal());
}

#[tokio::test]
async fn cancel_operation_only_works_while_pending() {
    let store = test_store().await;
    let cluster = store.create_cluster("alpha", StrategyMode::Sync).await.unwrap();
    let operation = store
        .create_operation(
            OperationType::FundingRequest,
            cluster.id,
            "test-harness",
            OperationPayload::FundingRequest {
                cluster_id: cluster.id,
                amount_wei: U256::from(1u64),
            },
        )
        .await
        .unwrap();

    let cancelled = store.cancel_operation(operation.id).await.expect("cancel");
    assert_eq!(cancelled.status, OperationStatus::Cancelled);
    assert!(cancelled.status.is_terminal());

    let err = store.cancel_operation(operation.id).await.unwrap_err();
    assert!(matches!(err, fleet_store::StoreError::StateConflict(_)));
}

#[tokio::test]
async fn position_holdings_clamp_at_zero_on_oversell() {
    let store = test_store().await;
    let wallet = store
        .create_wallet(
            "alpha-01",
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            "provider-1",
            WalletType::Smart,
            false,
        )
        .await
        .unwrap();
    let coin = Address::repeat_byte(0xAB);

    store
        .upsert_position(
            wallet.id,
            coin,
            U256::from(1_000u64),
            U256::ZERO,
            U256::from(500u64),
            true,
        )
        .await
        .expect("buy");

    let position = store
        .upsert_position(
            wallet.id,
            coin,
            U256::ZERO,
            U256::from(2_000u64),
            U256::from(9_999u64),
            false,
        )
        .await
        .expect("oversell");

    assert_eq!(position.holdings_raw, U256::ZERO);
    assert_eq!(position.buy_count, 1);
    assert_eq!(position.sell_count, 1);
    assert_eq!(position.total_received_wei, U256::from(2_000u64));
}

#[tokio::test]
async fn swing_config_partial_update_leaves_other_fields_untouched() {
    let store = test_store().await;
    let config = store
        .create_swing_config("alpha", Address::repeat_byte(0xCD), 1_500, 2_000, None, 300, 100)
        .await
        .expect("create swing config");

    let updated = store
        .update_swing_config(
            config.id,
            SwingConfigUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .expect("update swing config");

    assert!(!updated.enabled);
    assert_eq!(updated.take_profit_bps, 1_500);
    assert_eq!(updated.stop_loss_bps, 2_000);
    assert_eq!(updated.cooldown_sec, 300);
}

#[tokio::test]
async fn ledger_round_trips_trade_and_funding_rows() {
    let store = test_store().await;
    let wallet = store
        .create_wallet(
            "alpha-01",
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            "provider-1",
            WalletType::Smart,
            false,
        )
        .await
        .unwrap();

    store
        .create_funding(
            wallet.id,
            U256::from(5_000u64),
            Some("0xuserop"),
            None,
            fleet_core::domain::TradeStatus::Complete,
            None,
        )
        .await
        .expect("create funding");

    store
        .create_trade(
            wallet.id,
            Address::ZERO,
            Address::repeat_byte(0xEF),
            U256::from(2_000u64),
            Some(U256::from(40_000u64)),
            Some("0xuserop2"),
            None,
            fleet_core::domain::TradeStatus::Complete,
            None,
        )
        .await
        .expect("create trade");

    assert_eq!(store.list_funding().await.unwrap().len(), 1);
    assert_eq!(store.list_trades().await.unwrap().len(), 1);
}
