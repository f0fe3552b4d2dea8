//! Classifies a bundler error message into a failover category.
//!
//! Matching is a case-insensitive substring search over the triggers listed
//! in the design; the first category whose triggers match wins, checked in
//! the declared order below.

/// A bundler failure's category, used by [`super::BundlerRouter::send`] to
/// decide whether to try the secondary provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// "429", "rate limit", "too many requests". Failover: yes.
    RateLimit,
    /// "timeout", "timed out", "ECONNRESET", "5xx", "network". Failover: yes.
    Retryable,
    /// "underpriced", "fee too low", "max fee ...". Failover: no.
    Underpriced,
    /// "AA...", "simulateValidation", "invalid signature", "insufficient prefund", "paymaster". Failover: no.
    Validation,
    /// Anything else. Failover: no.
    Fatal,
}

impl ErrorCategory {
    /// Whether a failure in this category should be retried against the
    /// secondary provider, when one is configured.
    #[must_use]
    pub const fn is_failover(self) -> bool {
        matches!(self, Self::RateLimit | Self::Retryable)
    }
}

const RATE_LIMIT_TRIGGERS: &[&str] = &["429", "rate limit", "too many requests"];
const RETRYABLE_TRIGGERS: &[&str] = &["timeout", "timed out", "econnreset", "5xx", "network"];
const UNDERPRICED_TRIGGERS: &[&str] = &["underpriced", "fee too low", "max fee"];
const VALIDATION_TRIGGERS: &[&str] = &[
    "aa1",
    "aa2",
    "aa3",
    "simulatevalidation",
    "invalid signature",
    "insufficient prefund",
    "paymaster",
];

/// Classify a bundler error message.
#[must_use]
pub fn classify(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    if RATE_LIMIT_TRIGGERS.iter().any(|t| lower.contains(t)) {
        ErrorCategory::RateLimit
    } else if RETRYABLE_TRIGGERS.iter().any(|t| lower.contains(t)) {
        ErrorCategory::Retryable
    } else if UNDERPRICED_TRIGGERS.iter().any(|t| lower.contains(t)) {
        ErrorCategory::Underpriced
    } else if VALIDATION_TRIGGERS.iter().any(|t| lower.contains(t)) {
        ErrorCategory::Validation
    } else {
        ErrorCategory::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case("429 Too Many Requests", ErrorCategory::RateLimit)]
    #[case("rate limit exceeded", ErrorCategory::RateLimit)]
    #[case("request timed out", ErrorCategory::Retryable)]
    #[case("ECONNRESET", ErrorCategory::Retryable)]
    #[case("upstream 5xx error", ErrorCategory::Retryable)]
    #[case("replacement transaction underpriced", ErrorCategory::Underpriced)]
    #[case("max fee per gas too low", ErrorCategory::Underpriced)]
    #[case("AA21 didn't pay prefund", ErrorCategory::Validation)]
    #[case("simulateValidation reverted", ErrorCategory::Validation)]
    #[case("invalid signature", ErrorCategory::Validation)]
    #[case("paymaster deposit too low", ErrorCategory::Validation)]
    #[case("something entirely unexpected", ErrorCategory::Fatal)]
    fn classifies_by_trigger_substring(#[case] message: &str, #[case] expected: ErrorCategory) {
        assert_eq!(classify(message), expected);
    }

    #[test]
    fn failover_categories() {
        assert!(ErrorCategory::RateLimit.is_failover());
        assert!(ErrorCategory::Retryable.is_failover());
        assert!(!ErrorCategory::Underpriced.is_failover());
        assert!(!ErrorCategory::Validation.is_failover());
        assert!(!ErrorCategory::Fatal.is_failover());
    }
}
