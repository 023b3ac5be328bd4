//! Ready-made rule sets for common NEAR monitoring jobs.
//!
//! Filters use Intear's filter language: `{"And": [{"path": ..., "operator": {"Equals": ...}}]}`.

use super::{AlertRule, Severity};
use serde_json::{json, Value};

fn equals(path: &str, value: &str) -> Value {
    json!({ "path": path, "operator": { "Equals": value } })
}

fn venear_event(event: &str) -> Value {
    json!({
        "And": [
            equals("account_id", "vote.dao"),
            equals("event_standard", "venear"),
            equals("event_event", event),
        ]
    })
}

/// House of Stake governance: new proposals, approvals and votes on `vote.dao`.
pub fn house_of_stake() -> Vec<AlertRule> {
    vec![
        AlertRule::new("HoS: New Proposal", "log_nep297", venear_event("create_proposal"))
            .with_severity(Severity::Warning)
            .with_summary("House of Stake: New proposal created by {account_id}")
            .with_dedup_key("hos-proposal-{transaction_id}"),
        AlertRule::new(
            "HoS: Proposal Approved",
            "log_nep297",
            venear_event("proposal_approve"),
        )
        .with_severity(Severity::Info)
        .with_summary("House of Stake: Proposal approved")
        .with_dedup_key("hos-approve-{transaction_id}"),
        AlertRule::new("HoS: Vote Cast", "log_nep297", venear_event("add_vote"))
            .with_severity(Severity::Info)
            .with_summary("House of Stake: Vote cast on proposal")
            .with_dedup_key("hos-vote-{transaction_id}"),
    ]
}

/// Every NEP-297 event emitted by `contract_id`, optionally narrowed to one standard.
pub fn custom_contract(contract_id: &str, event_standard: Option<&str>) -> Vec<AlertRule> {
    let mut conditions = vec![equals("account_id", contract_id)];
    if let Some(standard) = event_standard {
        conditions.push(equals("event_standard", standard));
    }

    vec![AlertRule::new(
        format!("Contract Events: {contract_id}"),
        "log_nep297",
        json!({ "And": conditions }),
    )
    .with_severity(Severity::Warning)
    .with_summary(format!("Event on {contract_id}: {{event_event}}"))
    .with_dedup_key(format!("{contract_id}-{{transaction_id}}"))]
}

/// Fungible token transfers of `token_id` (wNEAR is `wrap.near`).
pub fn large_transfer(token_id: &str) -> Vec<AlertRule> {
    vec![AlertRule::new(
        format!("Large Transfer: {token_id}"),
        "ft_transfer",
        json!({ "And": [equals("token_id", token_id)] }),
    )
    .with_severity(Severity::Warning)
    .with_summary(format!("Large {token_id} transfer detected"))
    .with_dedup_key("transfer-{transaction_id}")]
}

/// Transactions sent to `contract_id`.
pub fn function_call(contract_id: &str) -> Vec<AlertRule> {
    vec![AlertRule::new(
        format!("Function Calls: {contract_id}"),
        "tx_transaction",
        json!({ "And": [equals("receiver_id", contract_id)] }),
    )
    .with_severity(Severity::Warning)
    .with_summary(format!("Transaction to {contract_id} from {{signer_id}}"))
    .with_dedup_key(format!("{contract_id}-{{transaction_id}}"))]
}
