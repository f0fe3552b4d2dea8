//! Domain entities shared by every crate in the fleet controller workspace.
//!
//! These are plain, `serde`-derived structs that mirror the rows owned by
//! `fleet-store`. No entity here owns a database handle or a capability
//! trait object; they are values copied across component boundaries.

mod cluster;
mod funding;
mod operation;
mod position;
mod swing;
mod trade;
mod wallet;

pub use cluster::{Cluster, StrategyMode};
pub use funding::FundingRecord;
pub use operation::{Operation, OperationPayload, OperationStatus, OperationType};
pub use position::Position;
pub use swing::SwingConfig;
pub use trade::{Trade, TradeStatus};
pub use wallet::{Wallet, WalletType};
