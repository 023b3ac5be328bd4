//! Alert rules: what to watch on the NEAR event feed and how to render it.
//!
//! A rule is built once at startup (from `near-alerts.toml` or one of the
//! [`presets`]) and never changes afterwards. Each rule gets its own
//! subscription and supervisor.

pub mod presets;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const MAINNET_EXPLORER: &str = "https://nearblocks.io";
const TESTNET_EXPLORER: &str = "https://testnet.nearblocks.io";

/// PagerDuty severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    #[default]
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which NEAR network a rule watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Base URL of the block explorer used for alert links.
    pub fn explorer_url(&self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_EXPLORER,
            Network::Testnet => TESTNET_EXPLORER,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => f.write_str("mainnet"),
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

/// One thing to watch for, and how to turn it into an alert.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertRule {
    /// Human-readable name, used in logs and in the fallback summary.
    pub name: String,
    /// Upstream stream to subscribe to, e.g. `log_nep297`, `ft_transfer`.
    pub event_type: String,
    /// Intear filter object, sent upstream verbatim.
    pub filter: Value,
    #[serde(default)]
    pub severity: Severity,
    /// Template for the PagerDuty dedup key. `None` sends no key.
    #[serde(default)]
    pub dedup_key_template: Option<String>,
    #[serde(default = "default_summary_template")]
    pub summary_template: String,
    #[serde(default)]
    pub network: Network,
}

fn default_summary_template() -> String {
    "NEAR Event: {event_type}".to_string()
}

impl AlertRule {
    pub fn new(name: impl Into<String>, event_type: impl Into<String>, filter: Value) -> Self {
        Self {
            name: name.into(),
            event_type: event_type.into(),
            filter,
            severity: Severity::default(),
            dedup_key_template: None,
            summary_template: default_summary_template(),
            network: Network::default(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_summary(mut self, template: impl Into<String>) -> Self {
        self.summary_template = template.into();
        self
    }

    pub fn with_dedup_key(mut self, template: impl Into<String>) -> Self {
        self.dedup_key_template = Some(template.into());
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }
}
