use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};

use crate::{
    config::{Settings, SettingsUpdate},
    error::AppError,
    services::settings_service,
    state::SharedState,
};

/// Routes reading and updating the persisted settings.
pub fn router() -> Router<SharedState> {
    Router::new().route("/settings", get(get_settings).post(update_settings))
}

/// Return the settings currently in effect.
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    responses((status = 200, description = "Current settings", body = Settings))
)]
pub async fn get_settings(State(state): State<SharedState>) -> Json<Settings> {
    Json(settings_service::current(&state).await)
}

/// Merge the provided fields into the settings and apply them.
#[utoipa::path(
    post,
    path = "/settings",
    tag = "settings",
    request_body = SettingsUpdate,
    responses(
        (status = 200, description = "Settings saved", body = Settings),
        (status = 400, description = "Invalid settings")
    )
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    payload: Result<Json<SettingsUpdate>, JsonRejection>,
) -> Result<Json<Settings>, AppError> {
    let Json(update) = payload.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let settings = settings_service::update(&state, update).await?;
    Ok(Json(settings))
}
