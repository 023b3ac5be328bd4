//! Keeps one rule's subscription alive and feeds its events to the sink.
//!
//! ```text
//!   Disconnected ──► Connecting ──ok──► Streaming
//!        ▲               │                 │
//!        │             error        connection error
//!        └── sleep(reconnect_delay) ◄──────┘
//! ```
//!
//! Only connection errors leave `Streaming`. A malformed batch or a failed
//! delivery is logged and the next batch is read from the same connection.
//! The loop ends only when the cancellation token fires.

use crate::event::Event;
use crate::format::build_payload;
use crate::rule::AlertRule;
use crate::sink::AlertSink;
use crate::ws::EventSource;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Disconnected,
    Connecting,
    Streaming,
}

/// Reconnect loop around a single [`EventSource`].
pub struct StreamSupervisor<S, K> {
    rule: AlertRule,
    source: S,
    sink: Arc<K>,
    reconnect_delay: Duration,
    state: SupervisorState,
    reconnects: u64,
}

impl<S: EventSource, K: AlertSink> StreamSupervisor<S, K> {
    pub fn new(rule: AlertRule, source: S, sink: Arc<K>, reconnect_delay: Duration) -> Self {
        Self {
            rule,
            source,
            sink,
            reconnect_delay,
            state: SupervisorState::Disconnected,
            reconnects: 0,
        }
    }

    pub fn rule(&self) -> &AlertRule {
        &self.rule
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Run until `cancel` fires. Never returns early on errors.
    pub async fn run(&mut self, cancel: CancellationToken) {
        loop {
            self.state = SupervisorState::Connecting;
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                res = self.source.connect() => res,
            };

            match connected {
                Ok(()) => {
                    self.state = SupervisorState::Streaming;
                    info!(
                        rule = %self.rule.name,
                        event_type = %self.rule.event_type,
                        attempt = self.reconnects,
                        "stream connected"
                    );
                    if self.stream(&cancel).await.is_break() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        rule = %self.rule.name,
                        event_type = %self.rule.event_type,
                        error = %e,
                        attempt = self.reconnects,
                        "connect failed"
                    );
                }
            }

            self.source.close().await;
            self.state = SupervisorState::Disconnected;
            self.reconnects += 1;

            info!(
                rule = %self.rule.name,
                delay = ?self.reconnect_delay,
                attempt = self.reconnects,
                "reconnecting"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.source.close().await;
        self.state = SupervisorState::Disconnected;
        info!(rule = %self.rule.name, "supervisor stopped");
    }

    /// Receive and dispatch batches until the connection drops or `cancel` fires.
    async fn stream(&mut self, cancel: &CancellationToken) -> ControlFlow<()> {
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ControlFlow::Break(()),
                res = self.source.receive() => res,
            };

            match received {
                Ok(batch) => {
                    if self.dispatch(&batch, cancel).await.is_break() {
                        return ControlFlow::Break(());
                    }
                }
                Err(e) if e.is_connection() => {
                    warn!(
                        rule = %self.rule.name,
                        event_type = %self.rule.event_type,
                        error = %e,
                        "connection lost"
                    );
                    return ControlFlow::Continue(());
                }
                Err(e) => {
                    warn!(
                        rule = %self.rule.name,
                        event_type = %self.rule.event_type,
                        error = %e,
                        "skipping undecodable batch"
                    );
                }
            }
        }
    }

    /// Deliver a batch in receipt order. Delivery failures are logged and dropped.
    async fn dispatch(&mut self, batch: &[Event], cancel: &CancellationToken) -> ControlFlow<()> {
        for event in batch {
            if cancel.is_cancelled() {
                return ControlFlow::Break(());
            }

            info!(
                rule = %self.rule.name,
                account_id = event.account_id().as_deref().unwrap_or("unknown"),
                "event received"
            );

            let payload = build_payload(event, &self.rule);
            match self.sink.trigger(&payload).await {
                Ok(resp) => {
                    debug!(
                        rule = %self.rule.name,
                        dedup_key = resp.dedup_key.as_deref().unwrap_or("unknown"),
                        "alert delivered"
                    );
                }
                Err(e) => {
                    error!(
                        rule = %self.rule.name,
                        event_type = %self.rule.event_type,
                        error = %e,
                        "failed to deliver alert"
                    );
                }
            }
        }
        ControlFlow::Continue(())
    }
}
