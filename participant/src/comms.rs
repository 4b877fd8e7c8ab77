//! Thin websocket transport to the coordinator: connect, send a
//! `ClientMessage`, and yield a stream of parsed `ServerMessage`s. Protocol
//! logic lives in [`crate::engine`]; this module only owns the socket.

use dcnet_common::types::{ClientMessage, ServerMessage};
use dcnet_common::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub struct Connection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection {
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| Error::Transport(format!("failed to connect to {url}: {e}")))?;
        Ok(Self { socket })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    /// Waits for the next server message, transparently skipping non-text
    /// frames (pings, pongs, close handshakes). Returns `None` once the
    /// connection is closed.
    pub async fn recv(&mut self) -> Option<Result<ServerMessage>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(&text).map_err(Error::from))
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(Error::Transport(e.to_string()))),
            }
        }
    }
}
