//! The fleet controller's error taxonomy.
//!
//! One variant per kind named in the design's error-handling section.
//! `is_fatal()` marks the two boot-time kinds that halt the process;
//! `is_unit_level()` marks the four kinds the execution engine captures into
//! an operation's `result` instead of propagating out of `execute_operation`.

use thiserror::Error;

/// Result type alias for fleet controller operations.
pub type Result<T> = std::result::Result<T, FleetError>;

/// Errors that can occur across the fleet controller core.
#[derive(Debug, Error)]
pub enum FleetError {
    // ─────────────────────────────────────────────────────────────────────
    // Caller-visible errors
    // ─────────────────────────────────────────────────────────────────────
    /// Policy refused the intent; the message names which rule fired.
    #[error("POLICY_REJECT: {0}")]
    PolicyReject(String),

    /// An operation-status transition was attempted out of order.
    #[error("STATE_CONFLICT: {0}")]
    StateConflict(String),

    /// A referenced entity (wallet, cluster, operation) is missing.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// The signal adapter found no candidate meeting the given constraints.
    #[error("NO_SIGNAL: {0}")]
    NoSignal(String),

    // ─────────────────────────────────────────────────────────────────────
    // Unit-level errors (captured into an operation's result, never
    // propagated out of `execute_operation`)
    // ─────────────────────────────────────────────────────────────────────
    /// The quoter call returned no usable amount.
    #[error("QUOTE_FAILED: {0}")]
    QuoteFailed(String),

    /// Send-side failure exhausting every bundler provider allowed.
    #[error("BUNDLER_SEND_FAIL: {0}")]
    BundlerSendFail(String),

    /// Send succeeded but no included receipt arrived within the bound.
    #[error("RECEIPT_TIMEOUT: {0}")]
    ReceiptTimeout(String),

    /// The user operation was included but reverted.
    #[error("USEROP_REVERTED: {0}")]
    UserOpReverted(String),

    // ─────────────────────────────────────────────────────────────────────
    // Fatal errors (halt the process)
    // ─────────────────────────────────────────────────────────────────────
    /// The persisted master wallet does not match its re-derived address.
    #[error("KEY_MISMATCH: {0}")]
    KeyMismatch(String),

    /// Required configuration is missing or malformed.
    #[error("CONFIG_INVALID: {0}")]
    ConfigInvalid(String),

    // ─────────────────────────────────────────────────────────────────────
    // Wrapped
    // ─────────────────────────────────────────────────────────────────────
    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for errors that don't fit the taxonomy above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FleetError {
    /// Whether this error must halt the process (boot-time only).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::KeyMismatch(_) | Self::ConfigInvalid(_))
    }

    /// Whether this error reduces into an operation's `partial`/`failed`
    /// result instead of propagating out of `execute_operation`.
    #[must_use]
    pub const fn is_unit_level(&self) -> bool {
        matches!(
            self,
            Self::QuoteFailed(_)
                | Self::BundlerSendFail(_)
                | Self::ReceiptTimeout(_)
                | Self::UserOpReverted(_)
        )
    }

    /// A concise single-line, taxonomy-keyed message suitable for a trade's
    /// or funding record's `error_message` column.
    #[must_use]
    pub fn taxonomy_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors() {
        assert!(FleetError::KeyMismatch("x".into()).is_fatal());
        assert!(FleetError::ConfigInvalid("x".into()).is_fatal());
        assert!(!FleetError::PolicyReject("x".into()).is_fatal());
        assert!(!FleetError::NotFound("x".into()).is_fatal());
    }

    #[test]
    fn unit_level_errors() {
        assert!(FleetError::QuoteFailed("x".into()).is_unit_level());
        assert!(FleetError::BundlerSendFail("x".into()).is_unit_level());
        assert!(FleetError::ReceiptTimeout("x".into()).is_unit_level());
        assert!(FleetError::UserOpReverted("x".into()).is_unit_level());
        assert!(!FleetError::PolicyReject("x".into()).is_unit_level());
        assert!(!FleetError::StateConflict("x".into()).is_unit_level());
    }

    #[test]
    fn message_carries_taxonomy_prefix() {
        let err = FleetError::PolicyReject("cluster cooldown active (12s elapsed, requires 45s)".into());
        assert_eq!(
            err.taxonomy_message(),
            "POLICY_REJECT: cluster cooldown active (12s elapsed, requires 45s)"
        );
    }
}
