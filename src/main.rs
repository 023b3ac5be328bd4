use anyhow::Context;
use near_alert_bridge::config::{Config, ConfigError, LoggingConfig};
use near_alert_bridge::health::{self, HealthState};
use near_alert_bridge::monitor::Monitor;
use near_alert_bridge::shutdown::wait_for_shutdown_signal;
use near_alert_bridge::sink::PagerDutySink;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "near-alerts.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage.
    // tokio-tungstenite's wss:// connections need this.
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    // Load .env if present
    let _ = dotenvy::dotenv();

    let (config, origin) = load_config()?;
    init_logging(&config.logging);

    info!("near-alert-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    info!(source = %origin, "configuration loaded");

    config.validate().context("invalid configuration")?;

    for rule in &config.rules {
        info!(
            rule = %rule.name,
            event_type = %rule.event_type,
            network = %rule.network,
            severity = %rule.severity,
            "monitoring"
        );
    }

    let sink = Arc::new(PagerDutySink::new(&config.pagerduty)?);
    let cancel = CancellationToken::new();

    // --- Health server ---
    if let Some(bind) = config.health.bind.clone() {
        let state = HealthState::new(&config.rules);
        let token = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = health::serve(state, &bind, token).await {
                error!(error = %e, "health server failed");
            }
        });
    }

    // --- Stream supervisors ---
    let monitor = Monitor::from_config(&config, sink);
    let mut monitor_task = tokio::spawn(monitor.run(cancel.clone()));

    tokio::select! {
        signal = wait_for_shutdown_signal() => {
            match signal {
                Ok(name) => info!(signal = name, "shutdown signal received"),
                Err(e) => error!(error = %e, "failed to listen for shutdown signals"),
            }
        }
        finished = &mut monitor_task => {
            finished.context("monitor task failed")??;
            warn!("monitor exited without a shutdown signal");
            return Ok(());
        }
    }

    cancel.cancel();
    monitor_task.await.context("monitor task failed")??;
    info!("shutdown complete");
    Ok(())
}

/// `NEAR_ALERTS_CONFIG` names a required file; otherwise `near-alerts.toml`
/// is used when present, falling back to env-only House of Stake monitoring.
fn load_config() -> Result<(Config, String), ConfigError> {
    if let Ok(path) = std::env::var("NEAR_ALERTS_CONFIG") {
        let path = PathBuf::from(path);
        let config = Config::load(&path)?;
        return Ok((config, path.display().to_string()));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if path.exists() {
        Ok((Config::load(&path)?, DEFAULT_CONFIG_PATH.to_string()))
    } else {
        Ok((Config::from_env(), "environment".to_string()))
    }
}

fn init_logging(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }
}
