use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "display",
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into the karaoke display WebSocket session.
pub async fn karaoke_ws_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_karaoke_socket(state, socket))
}

/// Upgrade the HTTP connection into a remote control WebSocket session.
///
/// Same path as the display socket on another port, so it is left out of the API document.
pub async fn remote_ws_handler(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_remote_socket(state, socket))
}

/// WebSocket endpoint of the karaoke display server.
pub fn karaoke_router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(karaoke_ws_handler))
}

/// WebSocket endpoint of the remote control server.
pub fn remote_router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(remote_ws_handler))
}
