//! Auto-approver: a second pure decision on an operation already `pending`.
//!
//! Never writes; callers (the autonomy loop, an HTTP caller opting in)
//! apply the decision themselves through `fleet_store::OperationStore`.

use alloy::primitives::U256;
use fleet_core::domain::{OperationPayload, OperationType};

use crate::config::{parse_wei_or_zero, AutoApproveSettings};

/// The auto-approver's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the operation should be auto-approved.
    pub allow: bool,
    /// A human-readable reason, always present for observability.
    pub reason: String,
}

impl Decision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: reason.into(),
        }
    }
}

/// Decide whether `payload`, requested by `requested_by`, should be
/// auto-approved under `config`.
#[must_use]
pub fn decide(payload: &OperationPayload, requested_by: &str, config: &AutoApproveSettings) -> Decision {
    if !config.enabled {
        return Decision::deny("auto-approve disabled");
    }

    if !config.requesters.is_empty() && !config.requesters.iter().any(|r| r == requested_by) {
        return Decision::deny(format!("requester {requested_by:?} is not on the allowed list"));
    }

    let operation_type = payload.operation_type();
    if !config.operation_types.is_empty() && !config.operation_types.iter().any(|t| t == type_tag(operation_type)) {
        return Decision::deny(format!("operation type {operation_type:?} is not eligible"));
    }

    let amount = payload_amount(payload);
    let cap = match operation_type {
        OperationType::FundingRequest => parse_wei_or_zero(&config.max_funding_wei),
        OperationType::SupportCoin | OperationType::ExitCoin => parse_wei_or_zero(&config.max_trade_wei),
    };
    if amount > cap {
        return Decision::deny(format!("amount {amount} exceeds auto-approve cap {cap}"));
    }

    Decision::allow("within auto-approve bounds")
}

const fn type_tag(operation_type: OperationType) -> &'static str {
    match operation_type {
        OperationType::FundingRequest => "FUNDING_REQUEST",
        OperationType::SupportCoin => "SUPPORT_COIN",
        OperationType::ExitCoin => "EXIT_COIN",
    }
}

fn payload_amount(payload: &OperationPayload) -> U256 {
    match *payload {
        OperationPayload::FundingRequest { amount_wei, .. } => amount_wei,
        OperationPayload::SupportCoin { total_amount_wei, .. } | OperationPayload::ExitCoin { total_amount_wei, .. } => {
            total_amount_wei
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use fleet_core::domain::StrategyMode;

    fn enabled_settings() -> AutoApproveSettings {
        AutoApproveSettings {
            enabled: true,
            requesters: vec!["autonomy-worker".into()],
            operation_types: vec!["SUPPORT_COIN".into()],
            max_funding_wei: "0".into(),
            max_trade_wei: "1000".into(),
        }
    }

    fn support_coin(amount: u64) -> OperationPayload {
        OperationPayload::SupportCoin {
            cluster_id: 1,
            coin_address: Address::ZERO,
            total_amount_wei: U256::from(amount),
            slippage_bps: 100,
            strategy_mode: StrategyMode::Sync,
        }
    }

    #[test]
    fn disabled_always_denies() {
        let mut config = enabled_settings();
        config.enabled = false;
        let decision = decide(&support_coin(500), "autonomy-worker", &config);
        assert!(!decision.allow);
    }

    #[test]
    fn unlisted_requester_is_denied() {
        let config = enabled_settings();
        let decision = decide(&support_coin(500), "someone-else", &config);
        assert!(!decision.allow);
    }

    #[test]
    fn unlisted_operation_type_is_denied() {
        let config = enabled_settings();
        let payload = OperationPayload::FundingRequest {
            cluster_id: 1,
            amount_wei: U256::from(1u64),
        };
        let decision = decide(&payload, "autonomy-worker", &config);
        assert!(!decision.allow);
    }

    #[test]
    fn amount_within_cap_is_allowed() {
        let config = enabled_settings();
        let decision = decide(&support_coin(1000), "autonomy-worker", &config);
        assert!(decision.allow);
    }

    #[test]
    fn amount_over_cap_is_denied() {
        let config = enabled_settings();
        let decision = decide(&support_coin(1001), "autonomy-worker", &config);
        assert!(!decision.allow);
    }

    #[test]
    fn empty_requester_and_type_lists_admit_anyone() {
        let config = AutoApproveSettings {
            enabled: true,
            requesters: vec![],
            operation_types: vec![],
            max_funding_wei: "1000".into(),
            max_trade_wei: "1000".into(),
        };
        let decision = decide(&support_coin(500), "anyone", &config);
        assert!(decision.allow);
    }
}
