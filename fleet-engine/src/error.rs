//! Error types for the fleet engine service.

use thiserror::Error;

/// Result type for fleet engine operations.
pub type Result<T> = std::result::Result<T, FleetServiceError>;

/// Errors that can occur in the fleet engine service.
#[derive(Debug, Error)]
pub enum FleetServiceError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fleet core error (policy rejects, state conflicts, unit failures, etc.).
    #[error("Fleet error: {0}")]
    Fleet(#[from] fleet_core::FleetError),

    /// Primary store error.
    #[error("Store error: {0}")]
    Store(#[from] fleet_store::StoreError),

    /// Signal adapter error.
    #[error("Signal error: {0}")]
    Signal(#[from] fleet_signals::SignalError),

    /// Bundler router error: every allowed provider failed a send or receipt wait.
    #[error("Bundler error: {0}")]
    Bundler(String),

    /// Wallet not found.
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// No signer available for wallet.
    #[error("No signer for wallet: {0}")]
    NoSigner(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `config` crate failed to build or deserialize settings.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Cross-field validation failed.
    #[error("config validation failed: {0}")]
    Validation(String),
}

impl From<Vec<String>> for ConfigError {
    fn from(errors: Vec<String>) -> Self {
        Self::Validation(errors.join("; "))
    }
}
