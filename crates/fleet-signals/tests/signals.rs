//! Integration tests against a throwaway in-memory SQLite database.

use alloy::primitives::Address;
use fleet_signals::{SignalAdapter, SignalError, SignalMode, SqliteSignalStore};
use sqlx::sqlite::SqlitePoolOptions;

async fn test_store() -> SqliteSignalStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    let store = SqliteSignalStore::new(pool);
    store.run_migrations().await.expect("run migrations");
    store
}

async fn seed_coin(store: &SqliteSignalStore, address: Address, symbol: &str, momentum: f64) {
    sqlx::query("INSERT INTO coins (address, symbol, name, chain_id, volume_24h) VALUES (?, ?, ?, 1, 1000)")
        .bind(address.to_string())
        .bind(symbol)
        .bind(format!("{symbol} Coin"))
        .execute(store.pool())
        .await
        .expect("seed coin");
    sqlx::query(
        "INSERT INTO coin_analytics (coin_address, momentum_score, swap_count_24h, net_flow_usdc_24h) \
         VALUES (?, ?, 50, 1234.5)",
    )
    .bind(address.to_string())
    .bind(momentum)
    .execute(store.pool())
    .await
    .expect("seed analytics");
}

#[tokio::test]
async fn top_movers_sorts_descending_by_momentum() {
    let store = test_store().await;
    seed_coin(&store, Address::repeat_byte(1), "AAA", 10.0).await;
    seed_coin(&store, Address::repeat_byte(2), "BBB", 90.0).await;
    seed_coin(&store, Address::repeat_byte(3), "CCC", 50.0).await;

    let movers = store.top_movers(10, 0.0).await.expect("top movers");
    let symbols: Vec<&str> = movers.iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BBB", "CCC", "AAA"]);
}

#[tokio::test]
async fn top_movers_respects_minimum_momentum() {
    let store = test_store().await;
    seed_coin(&store, Address::repeat_byte(1), "LOW", 5.0).await;
    seed_coin(&store, Address::repeat_byte(2), "HIGH", 95.0).await;

    let movers = store.top_movers(10, 50.0).await.expect("top movers");
    assert_eq!(movers.len(), 1);
    assert_eq!(movers[0].symbol, "HIGH");
}

#[tokio::test]
async fn watchlist_signals_excludes_disabled_rows() {
    let store = test_store().await;
    let enabled = Address::repeat_byte(1);
    let disabled = Address::repeat_byte(2);
    seed_coin(&store, enabled, "ON", 60.0).await;
    seed_coin(&store, disabled, "OFF", 80.0).await;

    store.add_to_watchlist("momentum-list", enabled).await.unwrap();
    store.add_to_watchlist("momentum-list", disabled).await.unwrap();
    store.remove_from_watchlist("momentum-list", disabled).await.unwrap();

    let signals = store.watchlist_signals("momentum-list", 10).await.unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].symbol, "ON");
}

#[tokio::test]
async fn select_signal_coin_fails_with_no_signal_when_nothing_qualifies() {
    let store = test_store().await;
    seed_coin(&store, Address::repeat_byte(1), "LOW", 1.0).await;

    let err = store
        .select_signal_coin(SignalMode::TopMomentum, None, 99.0)
        .await
        .unwrap_err();
    assert!(matches!(err, SignalError::NoSignal));
}

#[tokio::test]
async fn select_signal_coin_top_momentum_picks_the_single_best() {
    let store = test_store().await;
    seed_coin(&store, Address::repeat_byte(1), "LOW", 10.0).await;
    seed_coin(&store, Address::repeat_byte(2), "BEST", 77.0).await;

    let picked = store
        .select_signal_coin(SignalMode::TopMomentum, None, 0.0)
        .await
        .expect("select");
    assert_eq!(picked.symbol, "BEST");
}

#[tokio::test]
async fn is_coin_in_watchlist_reflects_enabled_state() {
    let store = test_store().await;
    let coin = Address::repeat_byte(7);
    seed_coin(&store, coin, "WL", 40.0).await;

    assert!(!store.is_coin_in_watchlist(coin, Some("alpha")).await.unwrap());
    store.add_to_watchlist("alpha", coin).await.unwrap();
    assert!(store.is_coin_in_watchlist(coin, Some("alpha")).await.unwrap());
    store.remove_from_watchlist("alpha", coin).await.unwrap();
    assert!(!store.is_coin_in_watchlist(coin, Some("alpha")).await.unwrap());
}
