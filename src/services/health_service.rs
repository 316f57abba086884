use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the host has songs to play, logging when it does not.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let viewer_active = state.karaoke().viewer_lock_held();
    let songs = state.library().len();

    if songs == 0 {
        warn!("song library is empty");
        HealthResponse::degraded(viewer_active)
    } else {
        HealthResponse::ok(songs, viewer_active)
    }
}
