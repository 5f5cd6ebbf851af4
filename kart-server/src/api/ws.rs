use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use kart_core::broadcast::channel_sink;
use kart_sdk::StateSnapshot;
use kart_sdk::objects::ws::{WsCloseCode, WsServerMessage};
use thiserror::Error;

use crate::state::AppState;

/// A frame may take this many broadcast intervals to reach the socket.
const WRITE_TIMEOUT_INTERVALS: u32 = 4;
const MIN_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
enum WriteError {
    #[error("frame could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("socket closed")]
    Closed,
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),
}

/// `GET /ws`: live state stream.
///
/// Upgrades the HTTP connection to a WebSocket and pushes
/// [`WsServerMessage::Snapshot`] frames at the broadcast cadence. The first
/// frame is sent as soon as the viewer is registered.
pub async fn state_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer(socket, state))
}

fn write_timeout(broadcast_interval: Duration) -> Duration {
    broadcast_interval
        .saturating_mul(WRITE_TIMEOUT_INTERVALS)
        .max(MIN_WRITE_TIMEOUT)
}

/// Drives a single viewer connection.
///
/// The hub owns the sending half of the viewer's channel. When the hub
/// drops it (viewer too slow, or server shutting down) the channel ends and
/// the socket is closed with `GOING_AWAY`. A socket write that does not
/// finish within the write timeout ends the connection too. Client frames
/// are read only to notice a disconnect.
async fn handle_viewer(socket: WebSocket, state: AppState) {
    let (buffer, limit) = {
        let server = state.config.server.read().await;
        (server.subscriber_buffer, write_timeout(server.broadcast_interval))
    };
    let (sink, mut snapshots) = channel_sink(buffer);

    let id = match state.hub.register(Arc::new(sink)).await {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(error = %e, "WS: viewer could not be registered");
            return;
        }
    };
    tracing::debug!(subscriber = %id, "WS: viewer connected");

    let (mut writer, mut reader) = socket.split();

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => match snapshot {
                Some(snapshot) => {
                    if let Err(e) = send_snapshot(&mut writer, &snapshot, limit).await {
                        tracing::debug!(subscriber = %id, error = %e, "WS: dropping viewer");
                        break;
                    }
                }
                None => {
                    let close = Message::Close(Some(CloseFrame {
                        code: WsCloseCode::GOING_AWAY,
                        reason: "stream ended".into(),
                    }));
                    let _ = send_frame(&mut writer, close, limit).await;
                    break;
                }
            },

            msg = reader.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.unregister(id).await;
    tracing::debug!(subscriber = %id, "WS: viewer disconnected");
}

/// Serialize a snapshot frame and send it as a text message.
async fn send_snapshot<S>(
    writer: &mut S,
    snapshot: &StateSnapshot,
    limit: Duration,
) -> Result<(), WriteError>
where
    S: Sink<Message> + Unpin,
{
    let msg = WsServerMessage::Snapshot {
        snapshot: snapshot.clone(),
    };
    let json = serde_json::to_string(&msg)?;
    send_frame(writer, Message::Text(json.into()), limit).await
}

async fn send_frame<S>(writer: &mut S, msg: Message, limit: Duration) -> Result<(), WriteError>
where
    S: Sink<Message> + Unpin,
{
    match tokio::time::timeout(limit, writer.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(WriteError::Closed),
        Err(_) => Err(WriteError::TimedOut(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kart_sdk::RacePhase;
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// A peer that never drains its receive window.
    struct StalledSink;

    impl Sink<Message> for StalledSink {
        type Error = Infallible;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Pending
        }
    }

    #[derive(Default)]
    struct RecordingSink(Vec<Message>);

    impl Sink<Message> for RecordingSink {
        type Error = Infallible;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
            self.0.push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn test_write_timeout_scales_with_interval() {
        assert_eq!(write_timeout(Duration::from_millis(500)), Duration::from_secs(2));
        assert_eq!(write_timeout(Duration::from_millis(10)), MIN_WRITE_TIMEOUT);
        assert_eq!(write_timeout(Duration::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn test_snapshot_is_sent_as_json_text() {
        let mut sink = RecordingSink::default();
        send_snapshot(&mut sink, &StateSnapshot::empty(4), Duration::from_secs(1))
            .await
            .unwrap();

        let frames = &sink.0;
        let Some(Message::Text(text)) = frames.first() else {
            panic!("expected a text frame, got {frames:?}");
        };
        let WsServerMessage::Snapshot { snapshot } = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(snapshot.phase, RacePhase::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_socket_write_gives_up() {
        let limit = write_timeout(Duration::from_millis(500));
        let started = tokio::time::Instant::now();

        let err = send_snapshot(&mut StalledSink, &StateSnapshot::empty(4), limit)
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::TimedOut(d) if d == limit));
        assert!(started.elapsed() >= limit);
    }
}
