use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of songs in the library.
    pub songs: usize,
    /// Whether a karaoke display is connected.
    pub viewer_active: bool,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(songs: usize, viewer_active: bool) -> Self {
        Self {
            status: "ok".to_string(),
            songs,
            viewer_active,
        }
    }

    /// Create a health response for a host with nothing to play.
    pub fn degraded(viewer_active: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            songs: 0,
            viewer_active,
        }
    }
}
