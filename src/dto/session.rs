use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::events::{HistoryEntrySummary, SongSummary},
    state::{
        karaoke::{IdleMode, KaraokeSession, ViewMode, WindowSize},
        state_machine::PlaybackState,
    },
};

/// Read-only view of the whole session returned by `GET /state`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub instance_id: String,
    pub current_code: String,
    pub code_queue: Vec<String>,
    pub queue_history: Vec<HistoryEntrySummary>,
    pub state: PlaybackState,
    pub current_song: Option<SongSummary>,
    pub viewer_active: bool,
    pub idle_mode: IdleMode,
    pub view_mode: ViewMode,
    pub window_size: WindowSize,
    pub karaoke_port: u16,
    pub remote_port: u16,
    pub search_path: String,
    pub announce_keys: bool,
}

impl SessionResponse {
    pub fn new(instance_id: &str, session: &KaraokeSession) -> Self {
        Self {
            instance_id: instance_id.to_owned(),
            current_code: session.current_code.clone(),
            code_queue: session.queue.to_vec(),
            queue_history: session
                .history
                .to_vec()
                .into_iter()
                .map(Into::into)
                .collect(),
            state: session.playback.state(),
            current_song: session.playback.current_song().cloned().map(Into::into),
            viewer_active: session.viewer_lock_held,
            idle_mode: session.idle.mode,
            view_mode: session.presentation.view_mode,
            window_size: session.presentation.window_size,
            karaoke_port: session.network.karaoke_port,
            remote_port: session.network.remote_port,
            search_path: session.network.search_path.clone(),
            announce_keys: session.idle.announce_keys,
        }
    }
}

/// Result of a library rescan.
#[derive(Debug, Serialize, ToSchema)]
pub struct RescanResponse {
    /// Number of songs now indexed.
    pub songs: usize,
}
