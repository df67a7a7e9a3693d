use axum::extract::ws::Message;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

/// Identifier assigned to each accepted WebSocket connection.
pub type ConnectionId = Uuid;

/// The writer side of the connection is gone.
#[derive(Debug, Clone, Copy, Error)]
#[error("connection closed")]
pub struct ConnectionClosed;

#[derive(Clone, Debug)]
/// Handle used to push frames to a connected client through its writer task.
pub struct ConnectionHandle {
    pub id: ConnectionId,
    tx: mpsc::UnboundedSender<Message>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    /// Serialize a payload and queue it as a text frame.
    ///
    /// Serialization failures are logged and swallowed (nothing to retry); a
    /// closed writer is reported so the caller can tell a dead peer apart.
    pub fn send_json<T>(&self, value: &T) -> Result<(), ConnectionClosed>
    where
        T: ?Sized + Serialize + std::fmt::Debug,
    {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize message `{value:?}`");
                return Ok(());
            }
        };

        self.tx
            .send(Message::Text(payload.into()))
            .map_err(|_| ConnectionClosed)
    }

    /// Queue a raw frame (pong, close).
    pub fn send(&self, message: Message) -> Result<(), ConnectionClosed> {
        self.tx.send(message).map_err(|_| ConnectionClosed)
    }
}
