//! Primary persistence for the fleet controller.
//!
//! One [`sqlite::SqliteStore`] backs every trait in [`ports`]: wallets,
//! clusters, operations, trades, funding, positions, and swing configs.
//! Everything else in the workspace talks to storage only through these
//! traits; no other crate constructs a [`sqlx::SqlitePool`] against this
//! database file.

pub mod error;
pub mod ports;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use ports::{
    ClusterStore, LedgerStore, OperationStore, PositionStore, SwingConfigStore, SwingConfigUpdate,
    WalletStore,
};
pub use sqlite::SqliteStore;
