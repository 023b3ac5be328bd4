//! PagerDuty Events API v2 delivery.
//!
//! [`AlertSink`] is the seam the supervisors dispatch through;
//! [`PagerDutySink`] is the production implementation. One sink (and one
//! pooled `reqwest::Client`) is shared by every supervisor. Calls keep no
//! state between them, so no locking is needed.

use crate::config::PagerDutyConfig;
use crate::format::{AlertPayload, Link};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("PagerDuty rejected event {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("unreadable PagerDuty response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Body returned by PagerDuty on an accepted event.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub dedup_key: Option<String>,
}

/// Destination for rendered alerts.
#[async_trait]
pub trait AlertSink: Send + Sync + 'static {
    async fn trigger(&self, payload: &AlertPayload) -> Result<TriggerResponse, DeliveryError>;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum EventAction {
    Trigger,
    Acknowledge,
    Resolve,
}

impl EventAction {
    fn as_str(&self) -> &'static str {
        match self {
            EventAction::Trigger => "trigger",
            EventAction::Acknowledge => "acknowledge",
            EventAction::Resolve => "resolve",
        }
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct PagerDutyEvent<'a> {
    routing_key: &'a str,
    event_action: EventAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    dedup_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<PagerDutyPayload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<&'a [Link]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PagerDutyPayload<'a> {
    summary: &'a str,
    source: &'a str,
    severity: &'a str,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_details: Option<&'a Value>,
}

/// HTTP client for the PagerDuty Events API.
pub struct PagerDutySink {
    client: reqwest::Client,
    events_url: String,
    routing_key: String,
    client_name: String,
    client_url: String,
}

impl PagerDutySink {
    pub fn new(config: &PagerDutyConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            events_url: config.events_url.clone(),
            routing_key: config.routing_key.clone(),
            client_name: config.client.clone(),
            client_url: config.client_url.clone(),
        })
    }

    /// Acknowledge an open incident by its dedup key.
    pub async fn acknowledge(&self, dedup_key: &str) -> Result<TriggerResponse, DeliveryError> {
        self.send_action(EventAction::Acknowledge, dedup_key).await
    }

    /// Resolve an open incident by its dedup key.
    pub async fn resolve(&self, dedup_key: &str) -> Result<TriggerResponse, DeliveryError> {
        self.send_action(EventAction::Resolve, dedup_key).await
    }

    fn trigger_event<'a>(&'a self, payload: &'a AlertPayload) -> PagerDutyEvent<'a> {
        PagerDutyEvent {
            routing_key: &self.routing_key,
            event_action: EventAction::Trigger,
            dedup_key: payload.dedup_key.as_deref(),
            payload: Some(PagerDutyPayload {
                summary: &payload.summary,
                source: &payload.source,
                severity: payload.severity.as_str(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
                custom_details: Some(&payload.custom_details),
            }),
            links: (!payload.links.is_empty()).then_some(payload.links.as_slice()),
            client: Some(&self.client_name),
            client_url: Some(&self.client_url),
        }
    }

    async fn send_action(
        &self,
        action: EventAction,
        dedup_key: &str,
    ) -> Result<TriggerResponse, DeliveryError> {
        let event = PagerDutyEvent {
            routing_key: &self.routing_key,
            event_action: action,
            dedup_key: Some(dedup_key),
            payload: None,
            links: None,
            client: None,
            client_url: None,
        };
        self.post(action, &event).await
    }

    async fn post(
        &self,
        action: EventAction,
        event: &PagerDutyEvent<'_>,
    ) -> Result<TriggerResponse, DeliveryError> {
        let resp = self.client.post(&self.events_url).json(event).send().await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if status != StatusCode::ACCEPTED {
            error!(
                action = action.as_str(),
                status = status.as_u16(),
                body = %body,
                "PagerDuty error"
            );
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let result: TriggerResponse = serde_json::from_str(&body)?;
        info!(
            action = action.as_str(),
            status = %result.status,
            dedup_key = result.dedup_key.as_deref().unwrap_or("unknown"),
            "PagerDuty event accepted"
        );
        Ok(result)
    }
}

#[async_trait]
impl AlertSink for PagerDutySink {
    async fn trigger(&self, payload: &AlertPayload) -> Result<TriggerResponse, DeliveryError> {
        let event = self.trigger_event(payload);
        self.post(EventAction::Trigger, &event).await
    }
}
