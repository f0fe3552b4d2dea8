//! Configuration: environment-first, with an optional TOML file underneath.
//!
//! A `config::Config` builder seeded with defaults, optionally layered with
//! a file, always topped with `FLEET_`-prefixed environment variables (the
//! last source wins). Call
//! [`FleetConfig::load`] at boot; [`dotenvy::dotenv`] is invoked once before
//! that so a local `.env` file populates the process environment the same
//! way it would in production.

use std::path::Path;

use alloy::primitives::{Address, U256};
use config::{Config, ConfigError, Environment, File};
use fleet_core::wei;
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// Service identity and storage file locations.
    pub service: ServiceSettings,
    /// Policy thresholds (kill switch, value caps, slippage bounds, watchlist/allowlist gates).
    pub policy: PolicySettings,
    /// Auto-approver settings.
    pub auto_approve: AutoApproveSettings,
    /// Autonomy loop settings.
    pub autonomy: AutonomySettings,
    /// Swing loop settings.
    pub swing: SwingSettings,
    /// Bundler router settings.
    pub bundler: BundlerSettings,
    /// Signer backend, governing execution concurrency.
    pub signer: SignerSettings,
}

impl FleetConfig {
    /// Load configuration: built-in defaults, an optional TOML file, then
    /// `FLEET_`-prefixed environment variables, each layer overriding the last.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a file exists but fails to parse, or if
    /// the merged configuration cannot be deserialized into [`FleetConfig`].
    pub fn load(file_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("service.name", "fleet-engine")?
            .set_default("service.primary_store_path", "fleet.sqlite3")?
            .set_default("service.signal_store_path", "signals.sqlite3")?
            .set_default("service.master_wallet_address", Option::<String>::None)?
            .set_default("policy.kill_switch", false)?
            .set_default("policy.max_funding_wei", "1000000000000000000")?
            .set_default("policy.max_trade_wei", "1000000000000000000")?
            .set_default("policy.max_per_wallet_wei", "1000000000000000000")?
            .set_default("policy.wallet_min_balance_wei", "0")?
            .set_default("policy.max_slippage_bps", 500)?
            .set_default("policy.cluster_cooldown_sec", 60)?
            .set_default("policy.require_watchlist_coin", false)?
            .set_default("policy.require_watchlist_name", Option::<String>::None)?
            .set_default("policy.allowed_coin_addresses", Vec::<String>::new())?
            .set_default("auto_approve.enabled", false)?
            .set_default("auto_approve.requesters", Vec::<String>::new())?
            .set_default("auto_approve.operation_types", Vec::<String>::new())?
            .set_default("auto_approve.max_funding_wei", "0")?
            .set_default("auto_approve.max_trade_wei", "0")?
            .set_default("autonomy.enabled", false)?
            .set_default("autonomy.interval_sec", 300)?
            .set_default("autonomy.mode", "top_momentum")?
            .set_default("autonomy.watchlist_name", Option::<String>::None)?
            .set_default("autonomy.min_momentum", 0.0)?
            .set_default("autonomy.cluster_ids", Vec::<i64>::new())?
            .set_default("autonomy.amount_wei", "0")?
            .set_default("autonomy.slippage_bps", 100)?
            .set_default("autonomy.strategy_mode", "sync")?
            .set_default("swing.enabled", false)?
            .set_default("swing.interval_sec", 60)?
            .set_default("bundler.primary_url", "http://localhost:4337")?
            .set_default("bundler.secondary_url", Option::<String>::None)?
            .set_default("bundler.send_timeout_ms", 10_000)?
            .set_default("bundler.hedge_delay_ms", 500)?
            .set_default("bundler.receipt_poll_ms", 2_000)?
            .set_default("bundler.receipt_timeout_ms", 60_000)?
            .set_default("signer.backend", "local")?
            .set_default("signer.concurrency", 3)?;

        if let Some(path) = file_path {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("FLEET")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("policy.allowed_coin_addresses")
                .with_list_parse_key("auto_approve.requesters")
                .with_list_parse_key("auto_approve.operation_types")
                .with_list_parse_key("autonomy.cluster_ids"),
        );

        builder.build()?.try_deserialize()
    }

    /// Validate cross-field invariants that a naive per-field deserialize
    /// can't express.
    ///
    /// # Errors
    ///
    /// Returns a list of human-readable validation failures; empty means valid.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.policy.max_slippage_bps == 0 {
            errors.push("policy.max_slippage_bps must be at least 1".into());
        }
        if self.policy.require_watchlist_coin && self.policy.require_watchlist_name.is_none() {
            errors.push("policy.require_watchlist_name is required when require_watchlist_coin is set".into());
        }
        if let Some(raw) = &self.service.master_wallet_address {
            if raw.parse::<Address>().is_err() {
                errors.push(format!("service.master_wallet_address: invalid address {raw:?}"));
            }
        }
        for raw in &self.policy.allowed_coin_addresses {
            if raw.parse::<Address>().is_err() {
                errors.push(format!("policy.allowed_coin_addresses: invalid address {raw:?}"));
            }
        }
        for (field, raw) in [
            ("policy.max_funding_wei", &self.policy.max_funding_wei),
            ("policy.max_trade_wei", &self.policy.max_trade_wei),
            ("policy.max_per_wallet_wei", &self.policy.max_per_wallet_wei),
            ("policy.wallet_min_balance_wei", &self.policy.wallet_min_balance_wei),
            ("auto_approve.max_funding_wei", &self.auto_approve.max_funding_wei),
            ("auto_approve.max_trade_wei", &self.auto_approve.max_trade_wei),
            ("autonomy.amount_wei", &self.autonomy.amount_wei),
        ] {
            if wei::parse_wei(raw).is_err() {
                errors.push(format!("{field}: invalid decimal wei amount {raw:?}"));
            }
        }
        if self.autonomy.enabled && self.autonomy.mode == "watchlist_top" && self.autonomy.watchlist_name.is_none()
        {
            errors.push("autonomy.watchlist_name is required when autonomy.mode is watchlist_top".into());
        }
        if self.signer.concurrency == 0 {
            errors.push("signer.concurrency must be non-zero".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Parsed allowlist, or `None` if none is configured.
    #[must_use]
    pub fn allowed_coin_addresses(&self) -> Option<Vec<Address>> {
        if self.policy.allowed_coin_addresses.is_empty() {
            return None;
        }
        Some(
            self.policy
                .allowed_coin_addresses
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),
        )
    }
}

/// Service identity and storage file locations.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    /// Process name, used in logs.
    pub name: String,
    /// Path to the primary SQLite database file.
    pub primary_store_path: String,
    /// Path to the read-only signal-intelligence SQLite database file.
    pub signal_store_path: String,
    /// The master wallet's address as reported by the external key-management
    /// system at this deployment. Compared against the persisted master
    /// wallet's address at boot; a mismatch is a fatal `KEY_MISMATCH` (see
    /// `fleet_core::domain::Wallet`'s boot-derivation invariant). `None`
    /// skips the check (no master wallet provisioned yet).
    pub master_wallet_address: Option<String>,
}

/// Policy thresholds (see `fleet_engine::policy`).
#[derive(Debug, Clone, Deserialize)]
pub struct PolicySettings {
    /// Global kill switch; when true, every execution is refused.
    pub kill_switch: bool,
    /// Per-operation funding cap, in wei (decimal string).
    pub max_funding_wei: String,
    /// Per-operation trade cap, in wei (decimal string).
    pub max_trade_wei: String,
    /// Per-wallet cap, in wei (decimal string), applied to both variants.
    pub max_per_wallet_wei: String,
    /// A `FUNDING_REQUEST` skips any wallet whose balance is already at or
    /// above this floor, in wei (decimal string).
    pub wallet_min_balance_wei: String,
    /// Upper bound on slippage, in basis points; lower bound is fixed at 1.
    pub max_slippage_bps: u32,
    /// Minimum seconds between terminal operations on the same cluster.
    pub cluster_cooldown_sec: u64,
    /// Whether the target coin must be on a named watchlist.
    pub require_watchlist_coin: bool,
    /// The watchlist name checked when `require_watchlist_coin` is set.
    pub require_watchlist_name: Option<String>,
    /// Optional exact-match coin allowlist, as hex address strings.
    pub allowed_coin_addresses: Vec<String>,
}

/// Auto-approver settings (see `fleet_engine::auto_approve`).
#[derive(Debug, Clone, Deserialize)]
pub struct AutoApproveSettings {
    /// Whether auto-approval is active at all.
    pub enabled: bool,
    /// Requester ids eligible for auto-approval.
    pub requesters: Vec<String>,
    /// Operation type tags eligible for auto-approval (`FUNDING_REQUEST`, `SUPPORT_COIN`, `EXIT_COIN`).
    pub operation_types: Vec<String>,
    /// Per-`FUNDING_REQUEST` maximum value, in wei (decimal string).
    pub max_funding_wei: String,
    /// Per-`SUPPORT_COIN`/`EXIT_COIN` maximum value, in wei (decimal string).
    pub max_trade_wei: String,
}

/// Autonomy loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AutonomySettings {
    /// Whether the autonomy loop runs at all.
    pub enabled: bool,
    /// Tick interval, in seconds.
    pub interval_sec: u64,
    /// Signal selection mode: `top_momentum` or `watchlist_top`.
    pub mode: String,
    /// Watchlist name, required when `mode == "watchlist_top"`.
    pub watchlist_name: Option<String>,
    /// Minimum momentum score a candidate must meet.
    pub min_momentum: f64,
    /// Clusters this loop drives.
    pub cluster_ids: Vec<i64>,
    /// Total amount to spend per tick per cluster, in wei (decimal string).
    pub amount_wei: String,
    /// Slippage tolerance applied to the synthesized intent, in basis points.
    pub slippage_bps: u32,
    /// Strategy mode applied to the synthesized intent.
    pub strategy_mode: String,
}

/// Swing loop settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SwingSettings {
    /// Whether the swing loop runs at all.
    pub enabled: bool,
    /// Tick interval, in seconds.
    pub interval_sec: u64,
}

/// Bundler router tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct BundlerSettings {
    /// Primary bundler provider URL.
    pub primary_url: String,
    /// Optional secondary (failover) bundler provider URL.
    pub secondary_url: Option<String>,
    /// Timeout for a single send attempt, in milliseconds.
    pub send_timeout_ms: u64,
    /// Delay before racing the secondary in `send_hedged`, in milliseconds.
    pub hedge_delay_ms: u64,
    /// Interval between receipt polls, in milliseconds.
    pub receipt_poll_ms: u64,
    /// Overall receipt wait timeout, in milliseconds.
    pub receipt_timeout_ms: u64,
}

/// Signer backend, governing execution concurrency.
#[derive(Debug, Clone, Deserialize)]
pub struct SignerSettings {
    /// `local` or `cdp`; `local` clamps concurrency to 1 regardless of
    /// `concurrency`.
    pub backend: String,
    /// Concurrency pool size when `backend != "local"`.
    pub concurrency: usize,
}

impl SignerSettings {
    /// The effective per-operation concurrency pool size.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        if self.backend == "local" { 1 } else { self.concurrency }
    }
}

/// Parse a config-supplied decimal wei string, falling back to zero on a
/// value already rejected by [`FleetConfig::validate`].
#[must_use]
pub fn parse_wei_or_zero(raw: &str) -> U256 {
    wei::parse_wei(raw).unwrap_or(U256::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file_or_env() {
        let config = FleetConfig::load(None).expect("load defaults");
        assert_eq!(config.service.name, "fleet-engine");
        assert!(!config.policy.kill_switch);
        assert_eq!(config.policy.max_slippage_bps, 500);
        assert_eq!(config.signer.backend, "local");
        assert_eq!(config.signer.effective_concurrency(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_slippage_bound_is_invalid() {
        let mut config = FleetConfig::load(None).expect("load defaults");
        config.policy.max_slippage_bps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn watchlist_top_without_a_list_name_is_invalid() {
        let mut config = FleetConfig::load(None).expect("load defaults");
        config.autonomy.enabled = true;
        config.autonomy.mode = "watchlist_top".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_allowlist_address_is_invalid() {
        let mut config = FleetConfig::load(None).expect("load defaults");
        config.policy.allowed_coin_addresses = vec!["not-an-address".into()];
        assert!(config.validate().is_err());
    }
}
