//! Liveness endpoint for the hosting platform.
//!
//!   GET /health   → `OK`
//!   GET /rules    → JSON list of the rules being monitored

use crate::rule::{AlertRule, Network, Severity};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub name: String,
    pub event_type: String,
    pub network: Network,
    pub severity: Severity,
}

#[derive(Clone)]
pub struct HealthState {
    rules: Arc<Vec<RuleSummary>>,
}

impl HealthState {
    pub fn new(rules: &[AlertRule]) -> Self {
        let rules = rules
            .iter()
            .map(|r| RuleSummary {
                name: r.name.clone(),
                event_type: r.event_type.clone(),
                network: r.network,
                severity: r.severity,
            })
            .collect();
        Self {
            rules: Arc::new(rules),
        }
    }
}

pub fn build_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rules", get(rules))
        .with_state(state)
}

/// Serve until `cancel` fires.
pub async fn serve(
    state: HealthState,
    bind_addr: &str,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "health server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn rules(State(state): State<HealthState>) -> impl IntoResponse {
    Json(state.rules.as_ref().clone())
}
