//! Read-only signal-intelligence store for the fleet controller.
//!
//! Populated by an external signal ingester this workspace does not
//! implement; [`SqliteSignalStore`] only reads it, plus the narrow
//! watchlist-toggle writes the ingester delegates here. Has no dependency
//! on `fleet-store` — a read slice, not a tenant of the primary store.

pub mod error;
pub mod ports;
pub mod sqlite;
pub mod types;

pub use error::{Result, SignalError};
pub use ports::SignalAdapter;
pub use sqlite::SqliteSignalStore;
pub use types::{SignalCoin, SignalMode};
