use std::time::Duration;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use tracing::info;

use crate::{
    dto::{
        action::{AckResponse, ActionRequest, ActionResponse},
        session::{RescanResponse, SessionResponse},
    },
    error::AppError,
    services::{playback_service, settings_service},
    state::SharedState,
};

/// Delay between answering `/shutdown` and stopping the servers.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

/// Routes of the local REST API used by the remote page and the display.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/action", post(post_action))
        .route("/sig", get(signature))
        .route("/state", get(session))
        .route("/rescan", post(rescan))
        .route("/shutdown", post(shutdown))
}

/// Run one remote control or display action.
#[utoipa::path(
    post,
    path = "/action",
    tag = "karaoke",
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Action applied", body = ActionResponse),
        (status = 400, description = "Unknown action or invalid payload")
    )
)]
pub async fn post_action(
    State(state): State<SharedState>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<ActionResponse, AppError> {
    let Json(request) = payload.map_err(|err| AppError::BadRequest(err.body_text()))?;
    info!(action = ?request, "action received");
    Ok(playback_service::handle_action(&state, request).await?)
}

/// Pairing signature of this instance, embedded in the remote QR code.
#[utoipa::path(
    get,
    path = "/sig",
    tag = "karaoke",
    responses((status = 200, description = "Instance signature", body = String, content_type = "text/plain"))
)]
pub async fn signature(State(state): State<SharedState>) -> String {
    state.karaoke().signature().to_owned()
}

/// Read-only view of the karaoke session.
#[utoipa::path(
    get,
    path = "/state",
    tag = "karaoke",
    responses((status = 200, description = "Current session", body = SessionResponse))
)]
pub async fn session(State(state): State<SharedState>) -> Json<SessionResponse> {
    let karaoke = state.karaoke();
    Json(SessionResponse::new(karaoke.instance_id(), &karaoke.snapshot()))
}

/// Rebuild the song library from the configured folders.
#[utoipa::path(
    post,
    path = "/rescan",
    tag = "library",
    responses((status = 200, description = "Library rebuilt", body = RescanResponse))
)]
pub async fn rescan(State(state): State<SharedState>) -> Json<RescanResponse> {
    let songs = settings_service::rescan(&state).await;
    Json(RescanResponse { songs })
}

/// Stop the host after answering.
#[utoipa::path(
    post,
    path = "/shutdown",
    tag = "karaoke",
    responses((status = 200, description = "Shutdown scheduled", body = AckResponse))
)]
pub async fn shutdown(State(state): State<SharedState>) -> Json<AckResponse> {
    info!("shutdown requested over the API");
    tokio::spawn(async move {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        state.request_shutdown();
    });
    Json(AckResponse::ok())
}
