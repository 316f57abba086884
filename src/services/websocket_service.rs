use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::events::{ClientMessage, ServerMessage},
    services::broadcast::state_payload,
    state::{ClientKind, SharedState},
};

const VIEWER_IN_USE: &str = "Karaoke display already in use";

/// Handle a karaoke display socket. Only one display may be connected at a time.
pub async fn handle_karaoke_socket(state: SharedState, socket: WebSocket) {
    if !state.karaoke().acquire_viewer().await {
        warn!("rejecting second karaoke display");
        reject(socket, VIEWER_IN_USE).await;
        return;
    }

    serve(&state, socket, ClientKind::Karaoke).await;

    state.karaoke().release_viewer().await;
    info!("karaoke display released");
}

/// Handle a remote control socket.
pub async fn handle_remote_socket(state: SharedState, socket: WebSocket) {
    serve(&state, socket, ClientKind::Remote).await;
}

async fn reject(mut socket: WebSocket, reason: &'static str) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static(reason),
    };
    if let Err(err) = socket.send(Message::Close(Some(frame))).await {
        debug!(error = %err, "failed to send close frame");
    }
}

/// Register the socket, send the current state, then answer heartbeats until it closes.
async fn serve(state: &SharedState, socket: WebSocket, kind: ClientKind) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps broadcasts flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sender.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    let client_id = state.clients().register(kind, outbound_tx.clone());
    info!(client_id = %client_id, ?kind, "client connected");

    let initial = ServerMessage::State(state_payload(state, None));
    if send_message_to_websocket(&outbound_tx, &initial).is_err() {
        state.clients().unregister(&client_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::Ping) => {
                    if send_message_to_websocket(&outbound_tx, &ServerMessage::Pong).is_err() {
                        break;
                    }
                }
                Ok(ClientMessage::Unknown) => {
                    debug!(client_id = %client_id, payload = %text.as_str(), "ignoring socket message");
                }
                Err(err) => {
                    warn!(client_id = %client_id, error = %err, "failed to parse socket message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(client_id = %client_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.clients().unregister(&client_id);
    info!(client_id = %client_id, ?kind, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Serialize a payload and push it onto the provided socket writer.
///
/// Serialization failures are logged and treated as sent; only a closed
/// writer is reported as an error.
pub(crate) fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), mpsc::error::SendError<Message>>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
