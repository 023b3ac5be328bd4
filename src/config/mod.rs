use crate::rule::{presets, AlertRule, Network};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required env var: {0}")]
    MissingEnv(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pagerduty: PagerDutyConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rules: Vec<AlertRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PagerDutyConfig {
    /// Integration routing key - loaded from env PAGERDUTY_ROUTING_KEY
    #[serde(default)]
    pub routing_key: String,
    /// Events API v2 enqueue URL
    #[serde(default = "default_events_url")]
    pub events_url: String,
    /// Shown as the alert's originating client
    #[serde(default = "default_client")]
    pub client: String,
    #[serde(default = "default_client_url")]
    pub client_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Intear events base URL; the event type is appended as a path segment.
    #[serde(default = "default_mainnet_url")]
    pub mainnet_url: String,
    #[serde(default = "default_testnet_url")]
    pub testnet_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Fixed delay between a disconnect and the next connect attempt.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthConfig {
    /// Bind address for the health server; disabled when unset.
    #[serde(default)]
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_events_url() -> String {
    "https://events.pagerduty.com/v2/enqueue".to_string()
}
fn default_client() -> String {
    "NEAR Blockchain Monitor".to_string()
}
fn default_client_url() -> String {
    "https://explorer.near.org".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_mainnet_url() -> String {
    "wss://ws-events-v3.intear.tech/events".to_string()
}
fn default_testnet_url() -> String {
    "wss://ws-events-v3-testnet.intear.tech/events".to_string()
}
fn default_reconnect_delay() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PagerDutyConfig {
    fn default() -> Self {
        Self {
            routing_key: String::new(),
            events_url: default_events_url(),
            client: default_client(),
            client_url: default_client_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mainnet_url: default_mainnet_url(),
            testnet_url: default_testnet_url(),
        }
    }
}

impl FeedConfig {
    pub fn base_url(&self, network: Network) -> &str {
        match network {
            Network::Mainnet => &self.mainnet_url,
            Network::Testnet => &self.testnet_url,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

impl MonitorConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse TOML text and overlay environment secrets.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(contents)?;

        // Override secrets from environment variables (never store in config file)
        if let Ok(key) = std::env::var("PAGERDUTY_ROUTING_KEY") {
            config.pagerduty.routing_key = key;
        }

        Ok(config)
    }

    /// House of Stake monitoring with env-only settings (no file needed).
    pub fn from_env() -> Self {
        Config {
            pagerduty: PagerDutyConfig {
                routing_key: std::env::var("PAGERDUTY_ROUTING_KEY").unwrap_or_default(),
                events_url: std::env::var("PAGERDUTY_EVENTS_URL")
                    .unwrap_or_else(|_| default_events_url()),
                ..PagerDutyConfig::default()
            },
            feed: FeedConfig {
                mainnet_url: std::env::var("INTEAR_WS_URL")
                    .unwrap_or_else(|_| default_mainnet_url()),
                testnet_url: std::env::var("INTEAR_WS_TESTNET_URL")
                    .unwrap_or_else(|_| default_testnet_url()),
            },
            monitor: MonitorConfig {
                reconnect_delay_secs: std::env::var("RECONNECT_DELAY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_reconnect_delay),
            },
            health: HealthConfig {
                bind: std::env::var("HEALTH_BIND").ok(),
            },
            logging: LoggingConfig::default(),
            rules: presets::house_of_stake(),
        }
    }

    /// Reject configurations the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pagerduty.routing_key.trim().is_empty() {
            return Err(ConfigError::MissingEnv("PAGERDUTY_ROUTING_KEY".to_string()));
        }
        if self.rules.is_empty() {
            return Err(ConfigError::Invalid("no alert rules configured".to_string()));
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("rule #{} has an empty name", i + 1)));
            }
            if rule.event_type.trim().is_empty() || rule.event_type.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "rule '{}' has an invalid event_type '{}'",
                    rule.name, rule.event_type
                )));
            }
        }
        if self.monitor.reconnect_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitor.reconnect_delay_secs must be at least 1".to_string(),
            ));
        }
        for url in [
            &self.pagerduty.events_url,
            &self.feed.mainnet_url,
            &self.feed.testnet_url,
        ] {
            url::Url::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("bad URL '{url}': {e}")))?;
        }
        Ok(())
    }
}
