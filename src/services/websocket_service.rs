use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::ClientMessage,
    services::{
        duel_service::{self, MatchReport},
        outcome::SideFlags,
    },
    state::{SharedState, connection::ConnectionHandle},
};

/// Handle the full lifecycle of one duel client connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let connection = ConnectionHandle::new(outbound_tx);
    // Name this connection is currently queued or playing under.
    let mut seat: Option<String> = None;
    info!(connection_id = %connection.id, "duel client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection_id = %connection.id, payload = %text.as_str(), "received duel message");

                match ClientMessage::from_json_str(text.as_str()) {
                    Ok(message) => dispatch(&state, &connection, &mut seat, message).await,
                    Err(err) => {
                        warn!(connection_id = %connection.id, error = %err, "dropping duel message");
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = connection.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection_id = %connection.id, "duel client closed");
                let _ = connection.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %connection.id, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Some(name) = seat.take() {
        duel_service::release(&state, &name, connection.id).await;
    }
    info!(connection_id = %connection.id, "duel client disconnected");

    finalize(writer_task, connection).await;
}

/// Route one decoded message to the duel flow.
async fn dispatch(
    state: &SharedState,
    connection: &ConnectionHandle,
    seat: &mut Option<String>,
    message: ClientMessage,
) {
    let action = message.action();
    match message {
        ClientMessage::Connect {
            display_name,
            trophies,
        } => {
            if let Some(previous) = seat.take().filter(|previous| *previous != display_name) {
                duel_service::release(state, &previous, connection.id).await;
            }
            let outcome =
                duel_service::join(state, connection, display_name.clone(), trophies).await;
            info!(
                connection_id = %connection.id,
                name = %display_name,
                room_id = %outcome.room_id,
                matched = outcome.matched,
                "queued for a duel"
            );
            *seat = Some(display_name);
        }
        ClientMessage::Disconnect { display_name } => {
            duel_service::leave(state, &display_name).await;
            if seat.as_deref() == Some(display_name.as_str()) {
                *seat = None;
            }
        }
        ClientMessage::PlayerCompleted {
            room_id,
            display_name,
            scores,
        } => {
            duel_service::relay_round(state, &room_id, &display_name, scores).await;
        }
        ClientMessage::MatchCompleted {
            room_id,
            display_name,
            scores,
            opponent_name,
            opponent_scores,
            is_perfect_score,
            is_fast_reflex,
        } => {
            let Some(reporter) = display_name.or_else(|| seat.clone()) else {
                warn!(connection_id = %connection.id, room_id = %room_id, "match completion from an anonymous connection");
                return;
            };
            let report = MatchReport {
                room_id,
                reporter,
                scores,
                opponent_name,
                opponent_scores,
                flags: SideFlags {
                    perfect_score: is_perfect_score,
                    fast_reflex: is_fast_reflex,
                },
            };
            duel_service::complete_match(state, report).await;
        }
        ClientMessage::Unknown => {
            warn!(connection_id = %connection.id, action, "ignoring unknown action");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, connection: ConnectionHandle) {
    let _ = connection.send(Message::Close(None));
    drop(connection);
    let _ = writer_task.await;
}
