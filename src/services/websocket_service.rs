use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::WireMessage,
    services::history_service,
    state::{ClientConnection, SharedState, relay::RelayAction},
};

/// Handle the full lifecycle for one scoreboard WebSocket connection.
///
/// Clients need no identification step: any socket is a full peer the moment
/// it connects and immediately receives the authoritative greeting (current
/// scores plus cached countdown state). Malformed frames are logged and
/// skipped; they never terminate the connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing even while we
    // await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let client_id = Uuid::new_v4();
    state.clients().insert(
        client_id,
        ClientConnection {
            id: client_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(id = %client_id, "scoreboard client connected");

    for frame in state.greeting().await {
        if !send_frame(&outbound_tx, &frame) {
            info!(id = %client_id, "connection closed during greeting; terminating");
            state.clients().remove(&client_id);
            finalize(writer_task, outbound_tx).await;
            return;
        }
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<WireMessage>(&text) {
                Ok(frame) => {
                    let actions = state.apply_relay(frame).await;
                    route_actions(&state, actions, &outbound_tx).await;
                }
                Err(err) => {
                    warn!(id = %client_id, error = %err, "skipping malformed client frame");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(id = %client_id, "scoreboard client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(id = %client_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.clients().remove(&client_id);
    info!(id = %client_id, "scoreboard client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Execute the follow-up actions the relay core requested for one frame.
async fn route_actions(
    state: &SharedState,
    actions: Vec<RelayAction>,
    own_tx: &mpsc::UnboundedSender<Message>,
) {
    for action in actions {
        match action {
            RelayAction::Broadcast(frame) => broadcast_frame(state, &frame),
            RelayAction::Reply(frame) => {
                let _ = send_frame(own_tx, &frame);
            }
            RelayAction::Persist(result) => {
                history_service::record_match_result(state, result).await;
            }
        }
    }
}

/// Fan a frame out to every connected client, pruning dead sockets.
pub fn broadcast_frame(state: &SharedState, frame: &WireMessage) {
    let payload = match serde_json::to_string(frame) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize broadcast frame `{frame:?}`");
            return;
        }
    };

    let mut dead = Vec::new();
    for entry in state.clients().iter() {
        if entry.tx.send(Message::Text(payload.clone().into())).is_err() {
            dead.push(entry.id);
        }
    }
    for id in dead {
        state.clients().remove(&id);
        warn!(id = %id, "removed unreachable client from registry");
    }
}

/// Serialize a frame and push it onto the provided writer channel.
///
/// Returns false only when the writer is gone (the caller should clean up);
/// serialization failures are permanent errors, logged and swallowed.
fn send_frame(tx: &mpsc::UnboundedSender<Message>, frame: &WireMessage) -> bool {
    let payload = match serde_json::to_string(frame) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize frame `{frame:?}` (not retrying)");
            return true;
        }
    };
    tx.send(Message::Text(payload.into())).is_ok()
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
