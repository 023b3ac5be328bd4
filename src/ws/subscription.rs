//! One subscription to one Intear event stream.
//!
//! Connects to `<base>/<event_type>`, sends the rule's filter as the first
//! text frame, then yields one batch per text frame. The server groups
//! events per block and sends each group as a JSON array.

use crate::config::FeedConfig;
use crate::event::Event;
use crate::rule::AlertRule;
use crate::ws::WsError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A reconnectable source of event batches.
#[async_trait]
pub trait EventSource: Send + 'static {
    /// Open a fresh session, closing any previous one first.
    async fn connect(&mut self) -> Result<(), WsError>;

    /// Next batch of events. Control frames yield an empty batch.
    async fn receive(&mut self) -> Result<Vec<Event>, WsError>;

    /// Best-effort teardown. Safe to call repeatedly.
    async fn close(&mut self);
}

/// WebSocket subscription to the Intear events API.
pub struct EventSubscription {
    url: String,
    filter: String,
    ws: Option<WsStream>,
}

impl EventSubscription {
    pub fn new(rule: &AlertRule, feed: &FeedConfig) -> Result<Self, WsError> {
        let url = stream_url(feed.base_url(rule.network), &rule.event_type)?;
        let filter = serde_json::to_string(&rule.filter)?;
        Ok(Self {
            url,
            filter,
            ws: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }
}

fn stream_url(base: &str, event_type: &str) -> Result<String, WsError> {
    let url = format!("{}/{}", base.trim_end_matches('/'), event_type);
    url::Url::parse(&url)?;
    Ok(url)
}

#[async_trait]
impl EventSource for EventSubscription {
    async fn connect(&mut self) -> Result<(), WsError> {
        self.close().await;

        let (mut ws, _response) = connect_async(self.url.as_str()).await?;
        ws.send(Message::Text(self.filter.clone())).await?;

        info!(url = %self.url, filter = %self.filter, "connected and filter sent");
        self.ws = Some(ws);
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<Event>, WsError> {
        let ws = self.ws.as_mut().ok_or(WsError::NotConnected)?;

        match ws.next().await {
            Some(Ok(Message::Text(text))) => Ok(serde_json::from_str(&text)?),
            Some(Ok(Message::Close(frame))) => {
                info!(url = %self.url, frame = ?frame, "received close frame");
                Err(WsError::Closed)
            }
            // tungstenite queues the pong for pings itself
            Some(Ok(_)) => Ok(Vec::new()),
            Some(Err(e)) => Err(e.into()),
            None => Err(WsError::Closed),
        }
    }

    async fn close(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await {
                Ok(Ok(())) => debug!(url = %self.url, "websocket closed"),
                Ok(Err(e)) => debug!(url = %self.url, error = %e, "websocket close failed"),
                Err(_) => debug!(url = %self.url, "websocket close timed out"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Network;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    fn rule() -> AlertRule {
        AlertRule::new(
            "HoS: Vote Cast",
            "log_nep297",
            json!({ "And": [{ "path": "account_id", "operator": { "Equals": "vote.dao" } }] }),
        )
    }

    fn feed(base: &str) -> FeedConfig {
        FeedConfig {
            mainnet_url: base.to_string(),
            testnet_url: "wss://testnet.example/events/".to_string(),
        }
    }

    #[test]
    fn test_stream_url_per_network() {
        let sub = EventSubscription::new(&rule(), &feed("wss://main.example/events")).unwrap();
        assert_eq!(sub.url(), "wss://main.example/events/log_nep297");

        let testnet = rule().with_network(Network::Testnet);
        let sub = EventSubscription::new(&testnet, &feed("wss://main.example/events")).unwrap();
        assert_eq!(sub.url(), "wss://testnet.example/events/log_nep297");
        assert!(!sub.is_connected());
    }

    #[test]
    fn test_stream_url_rejects_garbage() {
        assert!(matches!(
            EventSubscription::new(&rule(), &feed("no scheme here")),
            Err(WsError::Url(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_before_connect() {
        let mut sub = EventSubscription::new(&rule(), &feed("ws://127.0.0.1:9/events")).unwrap();
        assert!(matches!(sub.receive().await, Err(WsError::NotConnected)));
        sub.close().await;
        sub.close().await;
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut sub =
            EventSubscription::new(&rule(), &feed(&format!("ws://{addr}/events"))).unwrap();
        let err = sub.connect().await.unwrap_err();
        assert!(err.is_connection());
        assert!(!sub.is_connected());
    }

    #[tokio::test]
    async fn test_session_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (path_tx, path_rx) = oneshot::channel::<String>();
        let (filter_tx, filter_rx) = oneshot::channel::<String>();
        let (pongs_tx, pongs_rx) = oneshot::channel::<usize>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                let _ = path_tx.send(req.uri().path().to_string());
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            if let Some(Ok(Message::Text(filter))) = ws.next().await {
                let _ = filter_tx.send(filter);
            }

            ws.send(Message::Ping(b"hb".to_vec())).await.unwrap();
            let mut pongs = 0;
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Pong(data) = msg {
                    assert_eq!(data, b"hb");
                    pongs += 1;
                    break;
                }
            }

            ws.send(Message::Text(
                r#"[{"account_id":"vote.dao","transaction_id":"abc123"},{"account_id":"x.near"}]"#
                    .to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Text("not json".to_string())).await.unwrap();
            ws.close(None).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if matches!(msg, Message::Pong(_)) {
                    pongs += 1;
                }
            }
            let _ = pongs_tx.send(pongs);
        });

        let mut sub =
            EventSubscription::new(&rule(), &feed(&format!("ws://{addr}/events"))).unwrap();
        sub.connect().await.unwrap();
        assert!(sub.is_connected());

        assert_eq!(path_rx.await.unwrap(), "/events/log_nep297");
        let sent: serde_json::Value = serde_json::from_str(&filter_rx.await.unwrap()).unwrap();
        assert_eq!(sent, rule().filter);

        // ping is answered and surfaces as an empty batch
        assert!(sub.receive().await.unwrap().is_empty());

        let batch = sub.receive().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].transaction_id().as_deref(), Some("abc123"));
        assert_eq!(batch[1].account_id().as_deref(), Some("x.near"));

        let err = sub.receive().await.unwrap_err();
        assert!(!err.is_connection());

        let err = sub.receive().await.unwrap_err();
        assert!(err.is_connection());

        sub.close().await;
        sub.close().await;
        assert!(!sub.is_connected());

        // exactly one pong per ping
        assert_eq!(pongs_rx.await.unwrap(), 1);
    }
}
