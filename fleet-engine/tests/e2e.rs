//! End-to-end tests driving the operation lifecycle through the real
//! execution engine, policy, and bundler router, against a throwaway
//! in-memory SQLite store and scripted account/bundler/swap boundaries.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use fleet_core::domain::{OperationPayload, OperationStatus, OperationType, StrategyMode, WalletType};
use fleet_core::ports::{Call, ReceiptOutcome, SwapEncoder, SwapParams};
use fleet_core::Result as CoreResult;
use fleet_engine::accounts::StubAccountProvider;
use fleet_engine::bundler::fake::{FakeBundler, ScriptedReceipt, ScriptedSend};
use fleet_engine::bundler::{BundlerRouter, BundlerTiming};
use fleet_engine::config::PolicySettings;
use fleet_engine::engine::ExecutionEngine;
use fleet_engine::policy::{self, Intent, PolicyContext};
use fleet_store::ports::{ClusterStore, LedgerStore, OperationStore, PositionStore, WalletStore};
use fleet_store::SqliteStore;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::Mutex as AsyncMutex;

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

fn timing() -> BundlerTiming {
    BundlerTiming {
        send_timeout: Duration::from_millis(500),
        hedge_delay: Duration::from_millis(20),
        receipt_poll_interval: Duration::from_millis(5),
        receipt_timeout: Duration::from_millis(200),
    }
}

fn permissive_policy() -> PolicySettings {
    PolicySettings {
        kill_switch: false,
        max_funding_wei: "1000000000000000000000".into(),
        max_trade_wei: "1000000000000000000000".into(),
        max_per_wallet_wei: "1000000000000000000000".into(),
        wallet_min_balance_wei: "0".into(),
        max_slippage_bps: 500,
        cluster_cooldown_sec: 0,
        require_watchlist_coin: false,
        require_watchlist_name: None,
        allowed_coin_addresses: vec![],
    }
}

/// A [`SwapEncoder`] that records each call's `amount_in` and replays it as
/// `parse_amount_out` on the next receipt, 1:1. Relies on the engine's
/// concurrency=1 unit dispatch (the `local` signer backend) so a unit's own
/// encode/parse pair is never interleaved with another unit's.
#[derive(Debug, Default)]
struct RecordingSwapEncoder {
    recorded: AsyncMutex<VecDeque<U256>>,
}

#[async_trait]
impl SwapEncoder for RecordingSwapEncoder {
    async fn encode_buy(&self, params: SwapParams) -> CoreResult<Vec<Call>> {
        self.recorded.lock().await.push_back(params.amount_in);
        Ok(vec![Call::value_transfer(params.to_token, params.amount_in)])
    }

    async fn encode_sell(&self, params: SwapParams) -> CoreResult<Vec<Call>> {
        self.recorded.lock().await.push_back(params.amount_in);
        Ok(vec![Call::value_transfer(params.to_token, params.amount_in)])
    }

    fn parse_amount_out(&self, receipt: &ReceiptOutcome) -> CoreResult<U256> {
        if receipt.success != Some(true) {
            return Ok(U256::ZERO);
        }
        Ok(self
            .recorded
            .try_lock()
            .map(|mut q| q.pop_front().unwrap_or(U256::ZERO))
            .unwrap_or(U256::ZERO))
    }

    async fn quote_coin_to_eth(&self, _coin: Address, amount: U256) -> CoreResult<U256> {
        Ok(amount)
    }
}

struct Fixture {
    store: Arc<SqliteStore>,
    engine: ExecutionEngine,
    accounts: Arc<StubAccountProvider>,
    wallet_ids: Vec<i64>,
    cluster_id: i64,
}

/// Wires a two-wallet cluster `alpha` over a `FakeBundler` primary, a
/// `RecordingSwapEncoder`, and the real store/policy/engine stack.
async fn build_fixture(primary: FakeBundler, policy_settings: PolicySettings) -> Fixture {
    let store = Arc::new(test_store().await);

    let owner = Address::repeat_byte(0xA0);
    let w1 = store
        .create_wallet("alpha-01", Address::repeat_byte(1), owner, "alpha-01", WalletType::Smart, false)
        .await
        .expect("create wallet 1");
    let w2 = store
        .create_wallet("alpha-02", Address::repeat_byte(2), owner, "alpha-02", WalletType::Smart, false)
        .await
        .expect("create wallet 2");

    let cluster = store.create_cluster("alpha", StrategyMode::Sync).await.expect("create cluster");
    store
        .set_cluster_wallets(cluster.id, &[w1.id, w2.id])
        .await
        .expect("set cluster wallets");

    let router = Arc::new(BundlerRouter::new(Arc::new(primary), None, timing()));
    let accounts = Arc::new(
        StubAccountProvider::new(router)
            .with_account("alpha-01", w1.address)
            .with_account("alpha-02", w2.address),
    );
    let swaps = Arc::new(RecordingSwapEncoder::default());

    let engine = ExecutionEngine::new(
        Arc::clone(&store) as Arc<dyn OperationStore>,
        Arc::clone(&store) as Arc<dyn ClusterStore>,
        Arc::clone(&store) as Arc<dyn LedgerStore>,
        Arc::clone(&store) as Arc<dyn PositionStore>,
        Arc::clone(&accounts) as Arc<dyn fleet_core::ports::AccountProvider>,
        swaps,
        policy_settings,
        1,
    );

    Fixture {
        store,
        engine,
        accounts,
        wallet_ids: vec![w1.id, w2.id],
        cluster_id: cluster.id,
    }
}

/// Scripts `n` successful sends and inclusions on a `FakeBundler`, one pair
/// per unit dispatched against it.
fn scripted_success(name: &str, n: usize) -> FakeBundler {
    let mut bundler = FakeBundler::new(name);
    for i in 0..n {
        bundler = bundler
            .with_send(ScriptedSend::Ok(format!("0xuserop{i}")))
            .with_receipt(ScriptedReceipt::Included {
                tx_hash: format!("0xtx{i}"),
                success: true,
                reason: None,
            });
    }
    bundler
}

#[tokio::test]
async fn fund_then_buy_then_sell_updates_ledger_and_positions() {
    // 2 wallets x 3 operations (fund, buy, sell) = 6 send/receipt pairs.
    let fixture = build_fixture(scripted_success("primary", 6), permissive_policy()).await;
    let coin = Address::repeat_byte(0xC0);

    let funding = fixture
        .store
        .create_operation(
            OperationType::FundingRequest,
            fixture.cluster_id,
            "operator",
            OperationPayload::FundingRequest {
                cluster_id: fixture.cluster_id,
                amount_wei: U256::from(1_000u64),
            },
        )
        .await
        .expect("create funding operation");
    fixture.store.set_operation_approved(funding.id, "operator").await.expect("approve funding");
    let funding = fixture.engine.execute_operation(funding.id).await.expect("execute funding");
    assert_eq!(funding.status, OperationStatus::Complete);

    let buy = fixture
        .store
        .create_operation(
            OperationType::SupportCoin,
            fixture.cluster_id,
            "operator",
            OperationPayload::SupportCoin {
                cluster_id: fixture.cluster_id,
                coin_address: coin,
                total_amount_wei: U256::from(2_000u64),
                slippage_bps: 100,
                strategy_mode: StrategyMode::Sync,
            },
        )
        .await
        .expect("create buy operation");
    fixture.store.set_operation_approved(buy.id, "operator").await.expect("approve buy");
    let buy = fixture.engine.execute_operation(buy.id).await.expect("execute buy");
    assert_eq!(buy.status, OperationStatus::Complete);

    for wallet_id in &fixture.wallet_ids {
        let position = fixture
            .store
            .get_position(*wallet_id, coin)
            .await
            .expect("query position")
            .expect("position exists after buy");
        assert!(position.holdings_raw > U256::ZERO, "buy must leave a positive holding");
    }

    let sell = fixture
        .store
        .create_operation(
            OperationType::ExitCoin,
            fixture.cluster_id,
            "operator",
            OperationPayload::ExitCoin {
                cluster_id: fixture.cluster_id,
                coin_address: coin,
                total_amount_wei: U256::from(1_000u64),
                slippage_bps: 100,
                strategy_mode: StrategyMode::Sync,
            },
        )
        .await
        .expect("create sell operation");
    fixture.store.set_operation_approved(sell.id, "operator").await.expect("approve sell");
    let sell = fixture.engine.execute_operation(sell.id).await.expect("execute sell");
    assert_eq!(sell.status, OperationStatus::Complete);

    let trades = fixture.store.list_trades().await.expect("list trades");
    assert_eq!(trades.len(), 4, "2 wallets x (buy + sell)");
    let fundings = fixture.store.list_funding().await.expect("list funding");
    assert_eq!(fundings.len(), 2);
}

#[tokio::test]
async fn wallet_min_balance_wei_filters_already_funded_wallets() {
    let mut policy_settings = permissive_policy();
    policy_settings.wallet_min_balance_wei = "500".into();
    let fixture = build_fixture(scripted_success("primary", 1), policy_settings).await;

    fixture.accounts.set_native_balance("alpha-01", U256::from(1_000u64)).await;
    fixture.accounts.set_native_balance("alpha-02", U256::from(10u64)).await;

    let funding = fixture
        .store
        .create_operation(
            OperationType::FundingRequest,
            fixture.cluster_id,
            "operator",
            OperationPayload::FundingRequest {
                cluster_id: fixture.cluster_id,
                amount_wei: U256::from(1_000u64),
            },
        )
        .await
        .expect("create funding operation");
    fixture.store.set_operation_approved(funding.id, "operator").await.expect("approve funding");
    let funding = fixture.engine.execute_operation(funding.id).await.expect("execute funding");
    assert_eq!(funding.status, OperationStatus::Complete);

    let fundings = fixture.store.list_funding().await.expect("list funding");
    assert_eq!(fundings.len(), 1, "only the under-floor wallet should have been funded");
}

#[tokio::test]
async fn cluster_cooldown_rejects_a_second_operation_too_soon() {
    let mut policy_settings = permissive_policy();
    policy_settings.cluster_cooldown_sec = 45;
    let fixture = build_fixture(scripted_success("primary", 4), policy_settings).await;
    let coin = Address::repeat_byte(0xC1);

    let first = fixture
        .store
        .create_operation(
            OperationType::SupportCoin,
            fixture.cluster_id,
            "operator",
            OperationPayload::SupportCoin {
                cluster_id: fixture.cluster_id,
                coin_address: coin,
                total_amount_wei: U256::from(2_000u64),
                slippage_bps: 100,
                strategy_mode: StrategyMode::Sync,
            },
        )
        .await
        .expect("create first operation");
    fixture.store.set_operation_approved(first.id, "operator").await.expect("approve first");
    let first = fixture.engine.execute_operation(first.id).await.expect("execute first");
    assert_eq!(first.status, OperationStatus::Complete);

    let second = fixture
        .store
        .create_operation(
            OperationType::SupportCoin,
            fixture.cluster_id,
            "operator",
            OperationPayload::SupportCoin {
                cluster_id: fixture.cluster_id,
                coin_address: coin,
                total_amount_wei: U256::from(2_000u64),
                slippage_bps: 100,
                strategy_mode: StrategyMode::Sync,
            },
        )
        .await
        .expect("create second operation");
    fixture.store.set_operation_approved(second.id, "operator").await.expect("approve second");
    let second = fixture.engine.execute_operation(second.id).await.expect("execute second");
    assert_eq!(second.status, OperationStatus::Failed);
    assert!(second.error_message.as_deref().unwrap_or_default().contains("POLICY_REJECT"));

    let trades = fixture.store.list_trades().await.expect("list trades");
    assert_eq!(trades.len(), 2, "only the first operation's wallets should have traded");
}

#[tokio::test]
async fn kill_switch_rejects_at_the_execution_boundary() {
    let mut policy_settings = permissive_policy();
    policy_settings.kill_switch = true;
    let fixture = build_fixture(scripted_success("primary", 2), policy_settings).await;

    let operation = fixture
        .store
        .create_operation(
            OperationType::FundingRequest,
            fixture.cluster_id,
            "operator",
            OperationPayload::FundingRequest {
                cluster_id: fixture.cluster_id,
                amount_wei: U256::from(1_000u64),
            },
        )
        .await
        .expect("create operation");
    assert_eq!(operation.status, OperationStatus::Pending);
    fixture.store.set_operation_approved(operation.id, "operator").await.expect("approve");

    let result = fixture.engine.execute_operation(operation.id).await.expect("execute");
    assert_eq!(result.status, OperationStatus::Failed);
    assert!(result.error_message.as_deref().unwrap_or_default().contains("POLICY_REJECT"));

    let fundings = fixture.store.list_funding().await.expect("list funding");
    assert!(fundings.is_empty(), "kill switch must block every unit before dispatch");
}

#[tokio::test]
async fn bundler_failover_carries_the_secondary_hash_onto_the_trade() {
    let secondary_tx_hash = format!("0x{}", "22".repeat(32));
    let primary = FakeBundler::new("primary").with_send(ScriptedSend::Err("429 rate limit".into()));
    let secondary = FakeBundler::new("secondary")
        .with_send(ScriptedSend::Ok("0xsecondary-op".into()))
        .with_receipt(ScriptedReceipt::Included {
            tx_hash: secondary_tx_hash.clone(),
            success: true,
            reason: None,
        });

    let store = Arc::new(test_store().await);
    let owner = Address::repeat_byte(0xA0);
    let wallet = store
        .create_wallet("solo-01", Address::repeat_byte(5), owner, "solo-01", WalletType::Smart, false)
        .await
        .expect("create wallet");
    let cluster = store.create_cluster("solo", StrategyMode::Sync).await.expect("create cluster");
    store.set_cluster_wallets(cluster.id, &[wallet.id]).await.expect("set cluster wallets");

    let router = Arc::new(BundlerRouter::new(Arc::new(primary), Some(Arc::new(secondary)), timing()));
    let accounts = Arc::new(StubAccountProvider::new(router).with_account("solo-01", wallet.address));
    let swaps = Arc::new(RecordingSwapEncoder::default());

    let engine = ExecutionEngine::new(
        Arc::clone(&store) as Arc<dyn OperationStore>,
        Arc::clone(&store) as Arc<dyn ClusterStore>,
        Arc::clone(&store) as Arc<dyn LedgerStore>,
        Arc::clone(&store) as Arc<dyn PositionStore>,
        accounts as Arc<dyn fleet_core::ports::AccountProvider>,
        swaps,
        permissive_policy(),
        1,
    );

    let operation = store
        .create_operation(
            OperationType::FundingRequest,
            cluster.id,
            "operator",
            OperationPayload::FundingRequest {
                cluster_id: cluster.id,
                amount_wei: U256::from(500u64),
            },
        )
        .await
        .expect("create operation");
    store.set_operation_approved(operation.id, "operator").await.expect("approve");

    let result = engine.execute_operation(operation.id).await.expect("execute");
    assert_eq!(result.status, OperationStatus::Complete);

    let fundings = store.list_funding().await.expect("list funding");
    assert_eq!(fundings.len(), 1);
    assert_eq!(
        fundings[0].tx_hash.map(|h| h.to_string().to_lowercase()),
        Some(secondary_tx_hash)
    );
}

/// Standalone sanity check that [`policy::evaluate`] and the engine's
/// execution-boundary re-check agree: the same `Intent` rejected by
/// `policy::evaluate` directly is what the engine surfaces as a `POLICY_REJECT`.
#[tokio::test]
async fn policy_evaluate_matches_engine_rejection_reason() {
    let settings = {
        let mut s = permissive_policy();
        s.kill_switch = true;
        s
    };
    let intent = Intent {
        cluster_id: 1,
        wallet_count: 1,
        amount_wei: U256::from(1u64),
        coin_address: None,
        slippage_bps: None,
    };
    let error = policy::evaluate(
        &intent,
        OperationType::FundingRequest,
        &settings,
        PolicyContext {
            cluster_age_sec: None,
            coin_in_watchlist: None,
        },
    )
    .unwrap_err();
    assert!(error.to_lowercase().contains("kill switch"));
}
