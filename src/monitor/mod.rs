//! Fans the configured rules out into independent supervisor tasks.

use crate::config::{Config, FeedConfig};
use crate::rule::AlertRule;
use crate::sink::AlertSink;
use crate::supervisor::StreamSupervisor;
use crate::ws::{EventSource, EventSubscription, WsError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Monitor<K> {
    rules: Vec<AlertRule>,
    sink: Arc<K>,
    feed: FeedConfig,
    reconnect_delay: Duration,
}

impl<K: AlertSink> Monitor<K> {
    pub fn new(
        rules: Vec<AlertRule>,
        sink: Arc<K>,
        feed: FeedConfig,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            rules,
            sink,
            feed,
            reconnect_delay,
        }
    }

    pub fn from_config(config: &Config, sink: Arc<K>) -> Self {
        Self::new(
            config.rules.clone(),
            sink,
            config.feed.clone(),
            config.monitor.reconnect_delay(),
        )
    }

    /// Supervise one Intear subscription per rule until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), WsError> {
        let feed = self.feed.clone();
        self.run_with(cancel, |rule| EventSubscription::new(rule, &feed)).await
    }

    /// Like [`Monitor::run`] with a caller-supplied source per rule.
    ///
    /// Every source is built before any task starts, so a rule that cannot
    /// produce a source fails the whole call up front.
    pub async fn run_with<S, F>(
        self,
        cancel: CancellationToken,
        make_source: F,
    ) -> Result<(), WsError>
    where
        S: EventSource,
        F: Fn(&AlertRule) -> Result<S, WsError>,
    {
        let mut supervisors = Vec::with_capacity(self.rules.len());
        for rule in self.rules {
            let source = make_source(&rule)?;
            supervisors.push(StreamSupervisor::new(
                rule,
                source,
                self.sink.clone(),
                self.reconnect_delay,
            ));
        }

        info!(streams = supervisors.len(), "starting stream supervisors");

        let mut tasks = JoinSet::new();
        for mut supervisor in supervisors {
            let token = cancel.child_token();
            tasks.spawn(async move {
                supervisor.run(token).await;
                supervisor.rule().name.clone()
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(name) => info!(rule = %name, "stream finished"),
                Err(e) if e.is_panic() => error!(error = %e, "stream supervisor panicked"),
                Err(e) => warn!(error = %e, "stream supervisor aborted"),
            }
        }

        info!("all stream supervisors stopped");
        Ok(())
    }
}
