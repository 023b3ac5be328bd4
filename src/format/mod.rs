//! Turns an [`Event`] plus its [`AlertRule`] into an [`AlertPayload`].
//!
//! Everything here is pure and total. A template that cannot be resolved
//! degrades to a documented fallback instead of failing the pipeline.

pub mod template;

use crate::event::Event;
use crate::rule::{AlertRule, Severity};
use serde::Serialize;
use serde_json::{json, Value};
use template::TemplateOutcome;
use tracing::debug;

/// PagerDuty caps `payload.summary` at 1024 characters.
pub const MAX_SUMMARY_CHARS: usize = 1024;

/// A link attached to an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
    pub text: String,
}

/// Everything needed to trigger one alert, derived from one event.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPayload {
    pub summary: String,
    pub source: String,
    pub severity: Severity,
    pub dedup_key: Option<String>,
    pub links: Vec<Link>,
    pub custom_details: Value,
}

impl AlertPayload {
    /// Builds a payload, truncating `summary` to [`MAX_SUMMARY_CHARS`].
    pub fn new(
        summary: String,
        source: String,
        severity: Severity,
        dedup_key: Option<String>,
        links: Vec<Link>,
        custom_details: Value,
    ) -> Self {
        Self {
            summary: truncate_summary(summary),
            source,
            severity,
            dedup_key,
            links,
            custom_details,
        }
    }
}

fn truncate_summary(summary: String) -> String {
    if summary.chars().count() <= MAX_SUMMARY_CHARS {
        summary
    } else {
        summary.chars().take(MAX_SUMMARY_CHARS).collect()
    }
}

/// Render `rule.summary_template` against the event.
///
/// Besides the event's own fields, the template may use `alert_name`,
/// `account_id` (default `unknown`), `event_standard` and `event_event`
/// (default empty).
pub fn render_summary(event: &Event, rule: &AlertRule) -> String {
    let outcome = template::render(&rule.summary_template, |name| {
        event.text(name).or_else(|| match name {
            "alert_name" => Some(rule.name.clone()),
            "account_id" => Some("unknown".to_string()),
            "event_standard" | "event_event" => Some(String::new()),
            _ => None,
        })
    });

    match outcome {
        TemplateOutcome::Rendered(summary) => summary,
        other => {
            debug!(rule = %rule.name, outcome = ?other, "summary template fell back to default");
            format!(
                "{}: Event from {}",
                rule.name,
                event.account_id().unwrap_or_else(|| "unknown".to_string())
            )
        }
    }
}

/// Render the dedup key, falling back to `transaction_id` then `receipt_id`.
///
/// Returns `None` when the rule has no dedup template.
pub fn render_dedup_key(event: &Event, rule: &AlertRule) -> Option<String> {
    let template = rule.dedup_key_template.as_deref()?;

    match template::render(template, |name| event.text(name)) {
        TemplateOutcome::Rendered(key) if !key.is_empty() => Some(key),
        other => {
            debug!(rule = %rule.name, outcome = ?other, "dedup key template fell back to event ids");
            event.transaction_id().or_else(|| event.receipt_id())
        }
    }
}

/// Explorer link for the event: the transaction if known, else the account.
pub fn render_link(event: &Event, rule: &AlertRule) -> Option<Link> {
    let base = rule.network.explorer_url();

    if let Some(tx_id) = event.transaction_id() {
        return Some(Link {
            href: format!("{base}/txns/{tx_id}"),
            text: "View Transaction".to_string(),
        });
    }

    event.account_id().map(|account_id| Link {
        href: format!("{base}/address/{account_id}"),
        text: "View Contract".to_string(),
    })
}

/// Source string identifying the emitting account.
pub fn render_source(event: &Event) -> String {
    format!(
        "near:{}",
        event.account_id().unwrap_or_else(|| "unknown".to_string())
    )
}

/// Assemble the full alert for one event.
pub fn build_payload(event: &Event, rule: &AlertRule) -> AlertPayload {
    AlertPayload::new(
        render_summary(event, rule),
        render_source(event),
        rule.severity,
        render_dedup_key(event, rule),
        render_link(event, rule).into_iter().collect(),
        json!({
            "alert_name": rule.name,
            "event_type": rule.event_type,
            "raw_event": event.to_value(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Network;

    fn event(v: Value) -> Event {
        serde_json::from_value(v).unwrap()
    }

    fn vote_rule() -> AlertRule {
        AlertRule::new("HoS: Vote Cast", "log_nep297", json!({}))
            .with_severity(Severity::Info)
            .with_summary("House of Stake: Vote cast on proposal")
            .with_dedup_key("hos-vote-{transaction_id}")
    }

    #[test]
    fn test_vote_cast_payload() {
        let ev = event(json!({
            "account_id": "vote.dao",
            "transaction_id": "abc123",
            "event_standard": "venear",
            "event_event": "add_vote",
        }));

        let payload = build_payload(&ev, &vote_rule());
        assert_eq!(payload.summary, "House of Stake: Vote cast on proposal");
        assert_eq!(payload.source, "near:vote.dao");
        assert_eq!(payload.severity, Severity::Info);
        assert_eq!(payload.dedup_key.as_deref(), Some("hos-vote-abc123"));
        assert_eq!(payload.links.len(), 1);
        assert_eq!(payload.links[0].href, "https://nearblocks.io/txns/abc123");
        assert_eq!(payload.custom_details["alert_name"], "HoS: Vote Cast");
        assert_eq!(payload.custom_details["event_type"], "log_nep297");
        assert_eq!(payload.custom_details["raw_event"]["event_event"], "add_vote");
    }

    #[test]
    fn test_dedup_falls_back_to_receipt_id() {
        let ev = event(json!({ "account_id": "vote.dao", "receipt_id": "r1" }));
        assert_eq!(render_dedup_key(&ev, &vote_rule()).as_deref(), Some("r1"));
    }

    #[test]
    fn test_empty_rendered_dedup_key_falls_back() {
        let rule = vote_rule().with_dedup_key("{transaction_id}");

        let ev = event(json!({ "transaction_id": "", "receipt_id": "r1" }));
        assert_eq!(render_dedup_key(&ev, &rule).as_deref(), Some("r1"));

        let ev = event(json!({ "transaction_id": "" }));
        assert_eq!(render_dedup_key(&ev, &rule), None);
        assert_eq!(build_payload(&ev, &rule).dedup_key, None);
    }

    #[test]
    fn test_dedup_fallback_order() {
        let rule = vote_rule().with_dedup_key("hos-{proposal_id}");

        let ev = event(json!({ "transaction_id": "tx1", "receipt_id": "r1" }));
        assert_eq!(render_dedup_key(&ev, &rule).as_deref(), Some("tx1"));

        let ev = event(json!({ "receipt_id": "r1" }));
        assert_eq!(render_dedup_key(&ev, &rule).as_deref(), Some("r1"));

        let ev = event(json!({ "account_id": "vote.dao" }));
        assert_eq!(render_dedup_key(&ev, &rule), None);
    }

    #[test]
    fn test_no_dedup_template_means_no_key() {
        let rule = AlertRule::new("plain", "log_nep297", json!({}));
        let ev = event(json!({ "transaction_id": "tx1" }));
        assert_eq!(render_dedup_key(&ev, &rule), None);
    }

    #[test]
    fn test_summary_uses_synthesized_fields() {
        let rule = AlertRule::new("Watcher", "log_nep297", json!({}))
            .with_summary("{alert_name}: {event_standard}/{event_event} from {account_id}");

        let ev = event(json!({ "account_id": "vote.dao", "event_event": "add_vote" }));
        assert_eq!(render_summary(&ev, &rule), "Watcher: /add_vote from vote.dao");

        let ev = event(json!({}));
        assert_eq!(render_summary(&ev, &rule), "Watcher: / from unknown");
    }

    #[test]
    fn test_summary_falls_back_on_missing_field() {
        let rule = AlertRule::new("Function Calls: app.near", "tx_transaction", json!({}))
            .with_summary("Transaction to app.near from {signer_id}");

        let ev = event(json!({ "account_id": "app.near" }));
        assert_eq!(
            render_summary(&ev, &rule),
            "Function Calls: app.near: Event from app.near"
        );

        let ev = event(json!({}));
        assert_eq!(
            render_summary(&ev, &rule),
            "Function Calls: app.near: Event from unknown"
        );
    }

    #[test]
    fn test_summary_fallback_treats_empty_account_as_unknown() {
        let rule = AlertRule::new("Watch", "log_nep297", json!({})).with_summary("{missing}");
        let ev = event(json!({ "account_id": "" }));
        assert_eq!(render_summary(&ev, &rule), "Watch: Event from unknown");
        assert_eq!(render_source(&ev), "near:unknown");
    }

    #[test]
    fn test_summary_falls_back_on_malformed_template() {
        let rule = AlertRule::new("Broken", "log_nep297", json!({})).with_summary("oops {");
        let ev = event(json!({ "account_id": "a.near" }));
        assert_eq!(render_summary(&ev, &rule), "Broken: Event from a.near");
    }

    #[test]
    fn test_link_prefers_transaction() {
        let rule = vote_rule();
        let ev = event(json!({ "account_id": "vote.dao", "transaction_id": "abc" }));
        let link = render_link(&ev, &rule).unwrap();
        assert_eq!(link.href, "https://nearblocks.io/txns/abc");
        assert_eq!(link.text, "View Transaction");

        let ev = event(json!({ "account_id": "vote.dao" }));
        let link = render_link(&ev, &rule).unwrap();
        assert_eq!(link.href, "https://nearblocks.io/address/vote.dao");
        assert_eq!(link.text, "View Contract");

        let ev = event(json!({ "receipt_id": "r1" }));
        assert!(render_link(&ev, &rule).is_none());
    }

    #[test]
    fn test_link_uses_network_host() {
        let rule = vote_rule().with_network(Network::Testnet);
        let ev = event(json!({ "transaction_id": "abc" }));
        assert_eq!(
            render_link(&ev, &rule).unwrap().href,
            "https://testnet.nearblocks.io/txns/abc"
        );
    }

    #[test]
    fn test_source_without_account() {
        let payload = build_payload(&event(json!({})), &vote_rule());
        assert_eq!(payload.source, "near:unknown");
        assert!(payload.links.is_empty());
    }

    #[test]
    fn test_summary_truncated_to_limit() {
        let long = "x".repeat(MAX_SUMMARY_CHARS + 500);
        let rule = vote_rule().with_summary(long);
        let payload = build_payload(&event(json!({})), &rule);
        assert_eq!(payload.summary.chars().count(), MAX_SUMMARY_CHARS);

        // multi-byte characters are counted, not bytes
        let wide = "é".repeat(MAX_SUMMARY_CHARS + 1);
        let payload = AlertPayload::new(wide, String::new(), Severity::Info, None, vec![], json!({}));
        assert_eq!(payload.summary.chars().count(), MAX_SUMMARY_CHARS);
    }
}
