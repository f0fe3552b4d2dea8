//! The store's own error type. `fleet_engine::service` maps this into
//! `fleet_core::FleetError` at the boundary where the store is consumed.

use thiserror::Error;

/// Result type alias for fleet store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the SQLite-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (name/address collision, etc).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// An operation-status transition was attempted out of order.
    #[error("invalid state transition: {0}")]
    StateConflict(String),

    /// A row in the database could not be converted back into its domain type.
    #[error("corrupt row: {0}")]
    CorruptRow(String),

    /// The underlying SQLite driver or migration runner failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migrations failed to apply.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
