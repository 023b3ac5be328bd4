pub mod subscription;

pub use subscription::{EventSource, EventSubscription};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsError {
    #[error("websocket connection failed: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed unexpectedly")]
    Closed,
    #[error("not connected")]
    NotConnected,
}

impl WsError {
    /// Whether the session is unusable and the supervisor must reconnect.
    ///
    /// A malformed batch is not: the socket is still healthy.
    pub fn is_connection(&self) -> bool {
        !matches!(self, WsError::Json(_))
    }
}
