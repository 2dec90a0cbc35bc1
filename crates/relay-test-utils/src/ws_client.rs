//! WebSocket client for end-to-end tests.

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use signal_relay::signaling::{Message, MessageType};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A browser-like client connected to a `TestRelayServer`.
pub struct WsTestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTestClient {
    /// Connect to a `ws://` URL.
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket connect to {} failed: {}", url, e))?;
        Ok(Self { stream })
    }

    pub async fn send_json(&mut self, value: &Value) -> Result<(), anyhow::Error> {
        self.stream
            .send(WsMessage::Text(value.to_string()))
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket send failed: {}", e))
    }

    /// Next signaling message, skipping control frames.
    pub async fn recv_message(&mut self) -> Result<Message, anyhow::Error> {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for message"))?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))?
                .map_err(|e| anyhow::anyhow!("WebSocket receive failed: {}", e))?;

            match frame {
                WsMessage::Text(text) => {
                    return Message::decode(&text)
                        .map_err(|e| anyhow::anyhow!("undecodable message: {}", e))
                }
                WsMessage::Close(_) => return Err(anyhow::anyhow!("connection closed")),
                _ => continue,
            }
        }
    }

    /// Next message, failing if its type is not `kind`.
    pub async fn expect_type(&mut self, kind: MessageType) -> Result<Message, anyhow::Error> {
        let message = self.recv_message().await?;
        if message.message_type() != kind {
            anyhow::bail!("expected {}, got {:?}", kind, message);
        }
        Ok(message)
    }

    /// Send a close frame and drop the connection.
    pub async fn close(mut self) -> Result<(), anyhow::Error> {
        self.stream
            .close(None)
            .await
            .map_err(|e| anyhow::anyhow!("WebSocket close failed: {}", e))
    }
}
