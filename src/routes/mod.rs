use axum::Router;

use crate::state::SharedState;

/// `/action`, `/sig`, `/state`, `/rescan` and `/shutdown`.
pub mod api;
/// Swagger UI.
pub mod docs;
/// `/healthcheck`.
pub mod health;
/// `/settings`.
pub mod settings;
/// Karaoke display and remote control sockets.
pub mod websocket;

/// Local REST API: actions, settings, health and documentation.
pub fn api_router(state: SharedState) -> Router<()> {
    health::router()
        .merge(api::router())
        .merge(settings::router())
        .merge(docs::router())
        .with_state(state)
}

/// Server the karaoke display connects to.
pub fn karaoke_router(state: SharedState) -> Router<()> {
    websocket::karaoke_router()
        .merge(health::router())
        .with_state(state)
}

/// Server the remote controls connect to.
pub fn remote_router(state: SharedState) -> Router<()> {
    websocket::remote_router()
        .merge(health::router())
        .with_state(state)
}
