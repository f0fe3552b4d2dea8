//! Domain primitives for the fleet controller.
//!
//! This crate provides chain-agnostic building blocks shared by every other
//! crate in the workspace: the domain entities persisted by `fleet-store`,
//! the capability traits (`ports`) that `fleet-engine` implements against
//! real chain/DEX/bundler providers and tests implement against fakes, the
//! fleet controller's error taxonomy, and two small pure-function utilities
//! (`wei`, `jiggle`) used at the decimal-string/`U256` boundary and by the
//! momentum strategy.
//!
//! # Crate relationships
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  fleet-engine (service binary)                               │
//! │  └─ policy, auto-approve, bundler router, execution engine   │
//! │  └─ autonomy and swing loops                                 │
//! └───────────────────┬──────────────────────────┬───────────────┘
//!                      │                          │
//!                      ▼                          ▼
//! ┌──────────────────────────────┐   ┌─────────────────────────────┐
//! │  fleet-core  ◄── YOU ARE HERE │   │  fleet-store / fleet-signals│
//! │  └─ domain: Wallet, Cluster,  │   │  └─ SQLite-backed ports     │
//! │     Operation, Trade, ...     │   └─────────────────────────────┘
//! │  └─ ports: AccountProvider,   │
//! │     SwapEncoder, Clock,       │
//! │     BundlerAdapter            │
//! │  └─ error: FleetError         │
//! │  └─ wei, jiggle, scheduler    │
//! └────────────────────────────────┘
//! ```
//!
//! # Core concepts
//!
//! ## Domain
//!
//! [`domain`] holds the plain, `serde`-derived entities ([`domain::Wallet`],
//! [`domain::Cluster`], [`domain::Operation`], [`domain::Trade`],
//! [`domain::FundingRecord`], [`domain::Position`], [`domain::SwingConfig`])
//! that mirror the rows owned by `fleet-store`. None of them hold a database
//! handle or a capability trait object.
//!
//! ## Ports
//!
//! [`ports`] defines the capability seams: [`ports::AccountProvider`] and
//! [`ports::SwapEncoder`] hide key management and DEX calldata encoding,
//! [`ports::BundlerAdapter`] is one concrete bundler provider's
//! submit/estimate/receipt surface, and [`ports::Clock`] hides wall-clock
//! time so tests can fake it.
//!
//! ## Errors
//!
//! [`error::FleetError`] is the fleet controller's full error taxonomy.
//! `is_fatal()` marks the two kinds that halt the process at boot;
//! `is_unit_level()` marks the four kinds the execution engine captures into
//! an operation's result instead of propagating out of `execute_operation`.
//!
//! ## Wei and jiggle
//!
//! [`wei`] is the single sanctioned crossing point between decimal-string
//! wire values and `U256`. [`jiggle::jiggle_amounts`] splits a total into `n`
//! randomized-but-summing shares, used by the momentum strategy and by any
//! cluster operation that fans a total out across member wallets.
//!
//! ## Scheduling
//!
//! [`scheduler::Scheduler`] computes jittered tick intervals for the
//! autonomy and swing loops.
//!
//! # Feature flags
//!
//! This crate has no optional features - all functionality is always available.

#![doc(html_root_url = "https://docs.ghostnet.io/fleet-core")]

// ═══════════════════════════════════════════════════════════════════════════════
// MODULES
// ═══════════════════════════════════════════════════════════════════════════════

pub mod domain;
pub mod error;
pub mod jiggle;
pub mod ports;
pub mod scheduler;
pub mod wei;

// ═══════════════════════════════════════════════════════════════════════════════
// RE-EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

pub use error::{FleetError, Result};
pub use scheduler::Scheduler;

// ═══════════════════════════════════════════════════════════════════════════════
// PRELUDE
// ═══════════════════════════════════════════════════════════════════════════════

/// Convenience re-exports for common use.
///
/// ```ignore
/// use fleet_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::domain::{
        Cluster, FundingRecord, Operation, OperationPayload, OperationStatus, OperationType,
        Position, StrategyMode, SwingConfig, Trade, TradeStatus, Wallet, WalletType,
    };
    pub use crate::error::{FleetError, Result};
    pub use crate::jiggle::jiggle_amounts;
    pub use crate::ports::{
        AccountProvider, AccountSession, BundlerAdapter, Call, Clock, ReceiptOutcome, SwapEncoder,
        SwapParams, SystemClock,
    };
    pub use crate::scheduler::Scheduler;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CRATE INFO
// ═══════════════════════════════════════════════════════════════════════════════

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
        assert!(version().starts_with("0."));
    }

    #[test]
    fn prelude_works() {
        use crate::prelude::*;
        use rand::SeedableRng;

        let _scheduler = Scheduler::new();
        let amounts = jiggle_amounts(
            alloy::primitives::U256::from(1_000u64),
            4,
            0.2,
            &mut rand::rngs::StdRng::seed_from_u64(1),
        );
        assert_eq!(amounts.len(), 4);
    }
}
