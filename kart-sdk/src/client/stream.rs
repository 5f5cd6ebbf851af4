//! Live snapshot stream over WebSocket.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::ClientError;
use crate::objects::StateSnapshot;
use crate::objects::ws::WsServerMessage;

/// A viewer connection to `GET /ws`.
///
/// The first call to [`next`](SnapshotStream::next) returns the snapshot the
/// server pushes on connect.
pub struct SnapshotStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl SnapshotStream {
    /// Connect to the stream endpoint. `ws_url` is the full URL, e.g.
    /// `ws://localhost:8080/ws`.
    pub async fn connect(ws_url: &Url) -> Result<Self, ClientError> {
        let (socket, _response) = connect_async(ws_url.as_str()).await?;
        Ok(Self { socket })
    }

    /// Wait for the next snapshot. Returns `Ok(None)` once the server closes
    /// the connection.
    pub async fn next(&mut self) -> Result<Option<StateSnapshot>, ClientError> {
        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => {
                    let WsServerMessage::Snapshot { snapshot } = serde_json::from_str(&text)?;
                    return Ok(Some(snapshot));
                }
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Send a close frame and wait for the server to finish the handshake.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.send(Message::Close(None)).await?;
        while self.socket.next().await.is_some() {}
        Ok(())
    }
}
