//! The signal adapter's own error type.

use thiserror::Error;

/// Result type alias for signal adapter operations.
pub type Result<T> = std::result::Result<T, SignalError>;

/// Errors raised by [`crate::SignalAdapter`].
#[derive(Debug, Error)]
pub enum SignalError {
    /// No candidate satisfied the requested mode and thresholds.
    #[error("no signal available")]
    NoSignal,

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
