//! WebSocket transport to the stove.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Device transport errors. Any of them ends the session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection to {url} timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("No pong received within {0:?}")]
    PingTimeout(Duration),
}

/// Something received from the stove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A text frame.
    Frame(String),
    /// Answer to our keepalive ping.
    Pong,
    /// The stove closed the connection.
    Closed,
    /// Control or binary traffic with no meaning to the bridge.
    Other,
}

/// One open WebSocket connection to the stove.
pub struct DeviceSession {
    url: String,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl DeviceSession {
    /// Open the WebSocket, giving up after `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, SessionError> {
        let (ws, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| SessionError::ConnectTimeout {
                url: url.to_string(),
                timeout,
            })??;

        Ok(Self {
            url: url.to_string(),
            ws,
        })
    }

    /// Send a text frame.
    pub async fn send(&mut self, frame: &str) -> Result<(), SessionError> {
        self.ws.send(Message::text(frame)).await?;
        Ok(())
    }

    /// Send a keepalive ping.
    pub async fn ping(&mut self) -> Result<(), SessionError> {
        self.ws.send(Message::Ping(Default::default())).await?;
        Ok(())
    }

    /// Wait for the next message. Cancel safe.
    pub async fn recv(&mut self) -> Result<Incoming, SessionError> {
        match self.ws.next().await {
            Some(Ok(Message::Text(text))) => Ok(Incoming::Frame(text.as_str().to_string())),
            Some(Ok(Message::Pong(_))) => Ok(Incoming::Pong),
            Some(Ok(Message::Close(frame))) => {
                if let Some(ref cf) = frame {
                    tracing::debug!(code = %cf.code, reason = %cf.reason, "Close frame received");
                }
                Ok(Incoming::Closed)
            }
            Some(Ok(_)) => Ok(Incoming::Other),
            Some(Err(e)) => Err(e.into()),
            None => Ok(Incoming::Closed),
        }
    }

    /// Close the connection, ignoring transport errors.
    pub async fn close(mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(url = %self.url, error = %e, "Error closing WebSocket");
        }
    }
}
